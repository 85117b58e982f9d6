//! Validator (C2): per-address plausibility scoring that protects the
//! HotStore from ghost or spoofed devices. Single-writer per address via
//! a `Mutex`-guarded map, mirroring the `Mutex<HashMap<..>>` shape
//! `jet1090::channel::ChannelControl` uses for its own per-key state.

use std::collections::HashMap;
use std::sync::Mutex;

use fanet_proto::model::{AircraftClass, Position};
use fanet_proto::geo::distance_m;

use fanet_proto::model::Address;

pub const ADMISSION_THRESHOLD: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Below `observations == 1` (no prior baseline to compare against).
    FirstSighting,
    /// Score is below the admission threshold; do not forward.
    Suppressed,
    /// Score has crossed (or stayed above) the admission threshold.
    Admit,
    /// Score was above the admission threshold and has now dropped below
    /// it: the caller must emit a REMOVE to HotStore/Broadcaster.
    Revoke,
}

#[derive(Debug, Clone)]
struct ValidationState {
    score: i32,
    observations: u64,
    last_accepted_pos: Option<Position>,
    last_accepted_at: Option<f64>,
    last_class: Option<AircraftClass>,
    last_seen: f64,
    admitted: bool,
}

impl ValidationState {
    fn new(now: f64) -> Self {
        ValidationState {
            score: 0,
            observations: 0,
            last_accepted_pos: None,
            last_accepted_at: None,
            last_class: None,
            last_seen: now,
            admitted: false,
        }
    }
}

pub struct Validator {
    states: Mutex<HashMap<Address, ValidationState>>,
    admission_threshold: i32,
}

impl Validator {
    pub fn new() -> Self {
        Validator::with_threshold(ADMISSION_THRESHOLD)
    }

    pub fn with_threshold(admission_threshold: i32) -> Self {
        Validator {
            states: Mutex::new(HashMap::new()),
            admission_threshold,
        }
    }

    /// Step 1-6 of §4.2, applied to a single decoded observation.
    ///
    /// `ground_speed_kmh`/`vertical_speed_ms` are only present for
    /// AirObject records; they extend step 1's range check with the §3
    /// speed/climb invariants (`AirObject::invariants_hold`'s domain).
    pub fn evaluate(
        &self,
        address: Address,
        position: Position,
        class: Option<AircraftClass>,
        speed_ceiling_kmh: f64,
        ground_speed_kmh: Option<f64>,
        vertical_speed_ms: Option<f64>,
        now: f64,
    ) -> ValidationOutcome {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(address).or_insert_with(|| ValidationState::new(now));
        state.last_seen = now;

        let invariants_hold = position.in_geographic_range()
            && ground_speed_kmh.map_or(true, |v| v.abs() <= 400.0)
            && vertical_speed_ms.map_or(true, |v| v.abs() <= 20.0);
        if !invariants_hold {
            return apply_delta(state, -20, self.admission_threshold);
        }

        if state.observations == 0 {
            state.observations = 1;
            state.last_accepted_pos = Some(position);
            state.last_accepted_at = Some(now);
            state.last_class = class;
            return ValidationOutcome::FirstSighting;
        }
        state.observations += 1;

        let last_pos = state.last_accepted_pos.expect("baseline set on first sighting");
        let last_at = state.last_accepted_at.expect("baseline set on first sighting");
        let elapsed_s = now - last_at;

        let plausible = if elapsed_s <= 0.0 {
            false
        } else {
            let d_m = distance_m(&last_pos, &position);
            let implied_kmh = (d_m / elapsed_s) * 3.6;
            implied_kmh <= speed_ceiling_kmh * 1.2
        };

        let mut delta = if plausible { 10 } else { -15 };
        if plausible {
            state.last_accepted_pos = Some(position);
            state.last_accepted_at = Some(now);
        }

        if let Some(prior_class) = state.last_class {
            if Some(prior_class) != class {
                delta -= 5;
            }
        }
        state.last_class = class;

        apply_delta(state, delta, self.admission_threshold)
    }

    /// §4.2: every hour, drop ValidationState entries idle for 2h+.
    pub fn cleanup_idle(&self, now: f64, idle_seconds: u64) {
        let mut states = self.states.lock().unwrap();
        states.retain(|_, state| now - state.last_seen <= idle_seconds as f64);
    }

    pub fn score(&self, address: Address) -> Option<i32> {
        self.states.lock().unwrap().get(&address).map(|s| s.score)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Validator::new()
    }
}

fn apply_delta(state: &mut ValidationState, delta: i32, threshold: i32) -> ValidationOutcome {
    let was_admitted = state.admitted;
    state.score = (state.score + delta).clamp(0, 100);
    state.admitted = state.score >= threshold;

    match (was_admitted, state.admitted) {
        (false, true) => ValidationOutcome::Admit,
        (true, true) => ValidationOutcome::Admit,
        (true, false) => ValidationOutcome::Revoke,
        (false, false) => ValidationOutcome::Suppressed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(lat: f64, lon: f64) -> Position {
        Position {
            latitude: lat,
            longitude: lon,
            altitude: 1000.0,
        }
    }

    const PARAGLIDER_CEILING: f64 = 80.0;

    #[test]
    fn e2_three_plausible_observations_reach_admission() {
        let v = Validator::new();
        let addr = Address::new(0x200A07);

        let outcome = v.evaluate(addr, pos(46.5, 8.5), Some(AircraftClass::Paraglider), PARAGLIDER_CEILING, None, None, 0.0);
        assert_eq!(outcome, ValidationOutcome::FirstSighting);
        assert_eq!(v.score(addr), Some(0));

        // ~100m north of the baseline, 10s later -> ~36 km/h implied speed
        let outcome = v.evaluate(
            addr,
            pos(46.5009, 8.5),
            Some(AircraftClass::Paraglider),
            PARAGLIDER_CEILING,
            None,
            None,
            10.0,
        );
        assert_eq!(outcome, ValidationOutcome::Suppressed);
        assert_eq!(v.score(addr), Some(10));

        let outcome = v.evaluate(
            addr,
            pos(46.5018, 8.5),
            Some(AircraftClass::Paraglider),
            PARAGLIDER_CEILING,
            None,
            None,
            20.0,
        );
        assert_eq!(outcome, ValidationOutcome::Suppressed);
        assert_eq!(v.score(addr), Some(20));

        let outcome = v.evaluate(
            addr,
            pos(46.5023, 8.5),
            Some(AircraftClass::Paraglider),
            PARAGLIDER_CEILING,
            None,
            None,
            30.0,
        );
        assert_eq!(outcome, ValidationOutcome::Admit);
        assert_eq!(v.score(addr), Some(30));
    }

    #[test]
    fn e3_implausible_jump_is_rejected_and_never_admitted() {
        let v = Validator::new();
        let addr = Address::new(0x200A08);

        v.evaluate(addr, pos(46.5, 8.5), Some(AircraftClass::Paraglider), PARAGLIDER_CEILING, None, None, 0.0);

        // ~10km away, 1s later -> 36000 km/h implied speed
        let outcome = v.evaluate(
            addr,
            pos(46.59, 8.5),
            Some(AircraftClass::Paraglider),
            PARAGLIDER_CEILING,
            None,
            None,
            1.0,
        );
        assert_eq!(outcome, ValidationOutcome::Suppressed);
        assert_eq!(v.score(addr), Some(0));
    }

    #[test]
    fn out_of_range_position_is_penalized() {
        let v = Validator::new();
        let addr = Address::new(1);
        let bad = Position {
            latitude: 400.0,
            longitude: 0.0,
            altitude: 0.0,
        };
        let outcome = v.evaluate(addr, bad, None, 100.0, None, None, 0.0);
        assert_eq!(outcome, ValidationOutcome::Suppressed);
    }

    #[test]
    fn out_of_range_speed_is_penalized_even_with_a_valid_position() {
        let v = Validator::new();
        let addr = Address::new(1);
        let outcome = v.evaluate(addr, pos(46.5, 8.5), Some(AircraftClass::Powered), 400.0, Some(500.0), Some(0.0), 0.0);
        assert_eq!(outcome, ValidationOutcome::Suppressed);
        assert_eq!(v.score(addr), Some(0));
    }

    #[test]
    fn out_of_range_climb_is_penalized_even_with_a_valid_position() {
        let v = Validator::new();
        let addr = Address::new(1);
        let outcome = v.evaluate(addr, pos(46.5, 8.5), Some(AircraftClass::Glider), 300.0, Some(50.0), Some(25.0), 0.0);
        assert_eq!(outcome, ValidationOutcome::Suppressed);
        assert_eq!(v.score(addr), Some(0));
    }

    #[test]
    fn revoked_after_admission_drops_below_threshold() {
        let v = Validator::with_threshold(5);
        let addr = Address::new(1);
        v.evaluate(addr, pos(0.0, 0.0), Some(AircraftClass::Glider), 300.0, Some(0.0), Some(0.0), 0.0);
        let outcome = v.evaluate(addr, pos(0.001, 0.0), Some(AircraftClass::Glider), 300.0, Some(36.0), Some(0.0), 10.0);
        assert_eq!(outcome, ValidationOutcome::Admit);

        // an implausible jump drives the score back down and revokes admission
        let outcome = v.evaluate(addr, pos(10.0, 10.0), Some(AircraftClass::Glider), 300.0, Some(36.0), Some(0.0), 11.0);
        assert_eq!(outcome, ValidationOutcome::Revoke);
    }

    #[test]
    fn cleanup_drops_idle_entries() {
        let v = Validator::new();
        let addr = Address::new(1);
        v.evaluate(addr, pos(0.0, 0.0), None, 100.0, None, None, 0.0);
        v.cleanup_idle(3.0 * 3600.0, 2 * 3600);
        assert_eq!(v.score(addr), None);
    }
}
