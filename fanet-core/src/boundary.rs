//! Boundary tracker (C3): classifies each admitted address as Visible,
//! Fading or Outside relative to one or more configured tracking centers.
//! Per-address state lives behind a single `Mutex`, the same shape the
//! Validator uses for its own per-address map.

use std::collections::HashMap;
use std::sync::Mutex;

use fanet_proto::geo::distance_m;
use fanet_proto::model::{Address, Position};

use crate::config::BoundaryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BoundaryStatus {
    Outside,
    Fading,
    Visible,
}

#[derive(Debug, Clone, Copy)]
pub struct Center {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

struct AddressState {
    status: BoundaryStatus,
    last_visible_at: Option<f64>,
    last_position: Option<Position>,
    last_movement_at: Option<f64>,
}

impl AddressState {
    fn new() -> Self {
        AddressState {
            status: BoundaryStatus::Outside,
            last_visible_at: None,
            last_position: None,
            last_movement_at: None,
        }
    }
}

pub struct BoundaryTracker {
    centers: Vec<Center>,
    tracking_radius_percent: f64,
    grace_period_s: f64,
    min_movement_m: f64,
    states: Mutex<HashMap<Address, AddressState>>,
}

impl BoundaryTracker {
    pub fn new(centers: Vec<Center>, tracking_radius_percent: f64, grace_period_s: u64, min_movement_m: f64) -> Self {
        BoundaryTracker {
            centers,
            tracking_radius_percent,
            grace_period_s: grace_period_s as f64,
            min_movement_m,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &BoundaryConfig) -> Self {
        BoundaryTracker::new(
            vec![Center {
                latitude: config.center_lat,
                longitude: config.center_lon,
                radius_km: config.radius_km,
            }],
            config.tracking_radius_percent,
            config.grace_period_s,
            config.min_movement_m,
        )
    }

    /// Per-center classification ignoring any grace period, used as the
    /// input to the union-of-centers rule in `classify`.
    fn classify_center(&self, center: &Center, distance_km: f64) -> BoundaryStatus {
        let inner = center.radius_km * self.tracking_radius_percent;
        if distance_km <= inner {
            BoundaryStatus::Visible
        } else if distance_km <= center.radius_km {
            BoundaryStatus::Fading
        } else {
            BoundaryStatus::Outside
        }
    }

    /// Classifies `position` against every configured center and updates
    /// the address's movement-tracking state. The most favorable per-center
    /// result wins; an address just outside every radius still counts as
    /// Fading if it was last seen Visible or Fading within the grace period.
    pub fn classify(&self, address: Address, position: Position, now: f64) -> BoundaryStatus {
        let mut best = BoundaryStatus::Outside;
        for center in &self.centers {
            let d_km = distance_m(
                &Position { latitude: center.latitude, longitude: center.longitude, altitude: 0.0 },
                &position,
            ) / 1000.0;
            let status = self.classify_center(center, d_km);
            if status > best {
                best = status;
            }
        }

        let mut states = self.states.lock().unwrap();
        let state = states.entry(address).or_insert_with(AddressState::new);

        if best == BoundaryStatus::Outside {
            if let Some(last_visible_at) = state.last_visible_at {
                if now - last_visible_at <= self.grace_period_s {
                    best = BoundaryStatus::Fading;
                }
            }
        }

        if best != BoundaryStatus::Outside {
            state.last_visible_at = Some(now);
        }

        match state.last_position {
            Some(prior) if distance_m(&prior, &position) >= self.min_movement_m => {
                state.last_position = Some(position);
                state.last_movement_at = Some(now);
            }
            None => {
                state.last_position = Some(position);
            }
            _ => {}
        }

        state.status = best;
        best
    }

    pub fn last_movement_at(&self, address: Address) -> Option<f64> {
        self.states.lock().unwrap().get(&address).and_then(|s| s.last_movement_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(lat: f64, lon: f64) -> Position {
        Position { latitude: lat, longitude: lon, altitude: 1000.0 }
    }

    fn tracker() -> BoundaryTracker {
        BoundaryTracker::new(
            vec![Center { latitude: 46.5, longitude: 8.5, radius_km: 100.0 }],
            0.9,
            300,
            100.0,
        )
    }

    #[test]
    fn well_within_inner_radius_is_visible() {
        let t = tracker();
        let status = t.classify(Address::new(1), pos(46.5, 8.5), 0.0);
        assert_eq!(status, BoundaryStatus::Visible);
    }

    #[test]
    fn between_inner_and_outer_radius_is_fading() {
        let t = tracker();
        // ~95km north: inner radius is 90km, outer is 100km.
        let status = t.classify(Address::new(1), pos(47.35, 8.5), 0.0);
        assert_eq!(status, BoundaryStatus::Fading);
    }

    #[test]
    fn far_outside_is_outside() {
        let t = tracker();
        let status = t.classify(Address::new(1), pos(0.0, 0.0), 0.0);
        assert_eq!(status, BoundaryStatus::Outside);
    }

    #[test]
    fn outside_within_grace_period_of_last_visible_is_fading() {
        let t = tracker();
        let addr = Address::new(1);
        assert_eq!(t.classify(addr, pos(46.5, 8.5), 0.0), BoundaryStatus::Visible);
        // jumps far outside, 100s later, still inside the 300s grace period
        let status = t.classify(addr, pos(0.0, 0.0), 100.0);
        assert_eq!(status, BoundaryStatus::Fading);
    }

    #[test]
    fn outside_past_grace_period_is_outside() {
        let t = tracker();
        let addr = Address::new(1);
        assert_eq!(t.classify(addr, pos(46.5, 8.5), 0.0), BoundaryStatus::Visible);
        let status = t.classify(addr, pos(0.0, 0.0), 1000.0);
        assert_eq!(status, BoundaryStatus::Outside);
    }

    #[test]
    fn movement_below_threshold_does_not_update_last_movement() {
        let t = tracker();
        let addr = Address::new(1);
        t.classify(addr, pos(46.5, 8.5), 0.0);
        assert_eq!(t.last_movement_at(addr), None);
        // ~10m away, well under the 100m threshold
        t.classify(addr, pos(46.5001, 8.5), 10.0);
        assert_eq!(t.last_movement_at(addr), None);
    }

    #[test]
    fn movement_above_threshold_updates_last_movement() {
        let t = tracker();
        let addr = Address::new(1);
        t.classify(addr, pos(46.5, 8.5), 0.0);
        // ~150m away
        t.classify(addr, pos(46.5014, 8.5), 10.0);
        assert_eq!(t.last_movement_at(addr), Some(10.0));
    }

    #[test]
    fn multiple_centers_union_most_favorable_wins() {
        let t = BoundaryTracker::new(
            vec![
                Center { latitude: 46.5, longitude: 8.5, radius_km: 50.0 },
                Center { latitude: 0.0, longitude: 0.0, radius_km: 50.0 },
            ],
            0.9,
            300,
            100.0,
        );
        // Visible relative to the first center even though far outside the second.
        let status = t.classify(Address::new(1), pos(46.5, 8.5), 0.0);
        assert_eq!(status, BoundaryStatus::Visible);
    }
}
