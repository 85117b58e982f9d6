//! Query-result cache for the spatial index (§4.5): radius/bounds queries
//! are rounded to a coarse grid so nearby repeat queries hit the same
//! slot, each entry expires after 30s, and any write flushes the whole
//! cache rather than tracking per-entry invalidation.

use std::collections::HashMap;

use fanet_proto::geo::Bounds;
use fanet_proto::model::{Address, Position};

const TTL_S: f64 = 30.0;
/// Rounds center/radius/bounds to one hundredth of a degree (~1.1km) so
/// queries that differ only in the noise still share a cache slot.
const GRID: f64 = 100.0;

fn round(value: f64) -> i64 {
    (value * GRID).round() as i64
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum QueryKey {
    Radius { lat: i64, lon: i64, radius_km: i64 },
    Bounds { sw_lat: i64, sw_lon: i64, ne_lat: i64, ne_lon: i64 },
}

struct CacheEntry {
    addresses: Vec<Address>,
    expires_at: f64,
}

#[derive(Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, CacheEntry>,
}

impl QueryCache {
    pub fn new() -> Self {
        QueryCache::default()
    }

    pub fn get_radius(&self, center: Position, radius_km: f64, now: f64) -> Option<Vec<Address>> {
        let key = QueryKey::Radius {
            lat: round(center.latitude),
            lon: round(center.longitude),
            radius_km: round(radius_km),
        };
        self.lookup(&key, now)
    }

    pub fn put_radius(&mut self, center: Position, radius_km: f64, addresses: Vec<Address>, now: f64) {
        let key = QueryKey::Radius {
            lat: round(center.latitude),
            lon: round(center.longitude),
            radius_km: round(radius_km),
        };
        self.entries.insert(key, CacheEntry { addresses, expires_at: now + TTL_S });
    }

    pub fn get_bounds(&self, bounds: Bounds, now: f64) -> Option<Vec<Address>> {
        let key = QueryKey::Bounds {
            sw_lat: round(bounds.sw_lat),
            sw_lon: round(bounds.sw_lon),
            ne_lat: round(bounds.ne_lat),
            ne_lon: round(bounds.ne_lon),
        };
        self.lookup(&key, now)
    }

    pub fn put_bounds(&mut self, bounds: Bounds, addresses: Vec<Address>, now: f64) {
        let key = QueryKey::Bounds {
            sw_lat: round(bounds.sw_lat),
            sw_lon: round(bounds.sw_lon),
            ne_lat: round(bounds.ne_lat),
            ne_lon: round(bounds.ne_lon),
        };
        self.entries.insert(key, CacheEntry { addresses, expires_at: now + TTL_S });
    }

    fn lookup(&self, key: &QueryKey, now: f64) -> Option<Vec<Address>> {
        self.entries.get(key).filter(|e| e.expires_at > now).map(|e| e.addresses.clone())
    }

    /// Any HotStore/SpatialIndex write invalidates every cached query.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }
}
