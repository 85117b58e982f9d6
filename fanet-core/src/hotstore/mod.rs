//! HotStore (C4): the authoritative in-memory table of admitted records.
//! Sharded by address so Upsert/Get/Remove never contend across unrelated
//! devices, with a background sweeper for TTL expiry (§3, §4.4).

mod shard;

use fanet_proto::geo::{distance_m, Bounds};
use fanet_proto::model::{Address, Position, Record, RecordKey};
use shard::Shard;

const SHARD_COUNT: usize = 16;
const MAX_QUERY_RADIUS_KM: f64 = 200.0;

pub struct HotStore {
    shards: Vec<Shard>,
}

fn shard_index(address: Address) -> usize {
    // A cheap multiplicative hash; good enough to spread 24-bit addresses
    // evenly across shards without pulling in a hashing crate.
    ((address.0 as u64).wrapping_mul(2654435761) as usize) % SHARD_COUNT
}

impl HotStore {
    pub fn new() -> Self {
        let mut shards = Vec::with_capacity(SHARD_COUNT);
        for _ in 0..SHARD_COUNT {
            shards.push(Shard::default());
        }
        HotStore { shards }
    }

    fn shard_for(&self, address: Address) -> &Shard {
        &self.shards[shard_index(address)]
    }

    pub fn upsert(&self, record: Record, now: f64) {
        self.shard_for(record.key().address()).upsert(record, now);
    }

    pub fn remove(&self, key: &RecordKey) -> Option<Record> {
        self.shard_for(key.address()).remove(key)
    }

    pub fn get(&self, key: &RecordKey, now: f64) -> Option<Record> {
        self.shard_for(key.address()).get(key, now)
    }

    pub fn update_name(&self, address: Address, name: String, now: f64) -> bool {
        self.shard_for(address).update_name(&RecordKey::AirObject(address), name, now)
    }

    /// §4.4: radius clamped to 200km, age-filtered, ascending distance order.
    pub fn query_radius(&self, center: Position, radius_km: f64, max_age_s: f64, now: f64) -> Vec<Record> {
        let radius_km = radius_km.min(MAX_QUERY_RADIUS_KM);
        let mut hits: Vec<(f64, Record)> = Vec::new();
        for shard in &self.shards {
            shard.for_each_live(now, |record| {
                if now - record.last_update() > max_age_s {
                    return;
                }
                let d_m = distance_m(&center, &record.position());
                if d_m <= radius_km * 1000.0 {
                    hits.push((d_m, record.clone()));
                }
            });
        }
        hits.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        hits.into_iter().map(|(_, r)| r).collect()
    }

    pub fn query_bounds(&self, bounds: Bounds, now: f64) -> Vec<Record> {
        let mut hits = Vec::new();
        for shard in &self.shards {
            shard.for_each_live(now, |record| {
                let pos = record.position();
                if bounds.contains(pos.latitude, pos.longitude) {
                    hits.push(record.clone());
                }
            });
        }
        hits
    }

    /// Runs the background TTL sweep (§4.4: every 60s). Returns the number
    /// of entries dropped, for logging by the caller.
    pub fn sweep(&self, now: f64) -> usize {
        self.shards.iter().map(|s| s.sweep(now)).sum()
    }

    pub fn len(&self, now: f64) -> usize {
        self.shards.iter().map(|s| s.len(now)).sum()
    }
}

impl Default for HotStore {
    fn default() -> Self {
        HotStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanet_proto::model::{AircraftClass, AirObject, SignalQuality};

    fn air_object(addr: u32, lat: f64, lon: f64, last_update: f64) -> Record {
        Record::AirObject(AirObject {
            address: Address::new(addr),
            position: Position { latitude: lat, longitude: lon, altitude: 1000.0 },
            last_update,
            signal: SignalQuality { rssi_dbm: -70, snr_db: 8 },
            sequence: 0,
            class: AircraftClass::Paraglider,
            ground_speed_kmh: 30.0,
            vertical_speed_ms: 0.0,
            heading_deg: 0.0,
            online_tracking: true,
            name: None,
        })
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let store = HotStore::new();
        let record = air_object(1, 46.5, 8.5, 0.0);
        let key = record.key();
        store.upsert(record.clone(), 0.0);
        assert_eq!(store.get(&key, 0.0), Some(record));
    }

    #[test]
    fn expired_entries_are_hidden_before_sweep() {
        let store = HotStore::new();
        let record = air_object(1, 46.5, 8.5, 0.0);
        let key = record.key();
        store.upsert(record, 0.0);
        let ttl = fanet_proto::model::ttl_seconds(fanet_proto::model::Kind::AirObject) as f64;
        assert!(store.get(&key, ttl + 1.0).is_none());
        assert_eq!(store.len(ttl + 1.0), 0);
    }

    #[test]
    fn sweep_removes_expired_entries() {
        let store = HotStore::new();
        store.upsert(air_object(1, 46.5, 8.5, 0.0), 0.0);
        let ttl = fanet_proto::model::ttl_seconds(fanet_proto::model::Kind::AirObject) as f64;
        let dropped = store.sweep(ttl + 1.0);
        assert_eq!(dropped, 1);
        assert_eq!(store.len(ttl + 1.0), 0);
    }

    #[test]
    fn query_radius_orders_by_ascending_distance() {
        let store = HotStore::new();
        store.upsert(air_object(1, 46.6, 8.5, 0.0), 0.0);
        store.upsert(air_object(2, 46.51, 8.5, 0.0), 0.0);
        let center = Position { latitude: 46.5, longitude: 8.5, altitude: 0.0 };
        let hits = store.query_radius(center, 50.0, 3600.0, 0.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key(), RecordKey::AirObject(Address::new(2)));
        assert_eq!(hits[1].key(), RecordKey::AirObject(Address::new(1)));
    }

    #[test]
    fn query_radius_respects_max_age() {
        let store = HotStore::new();
        store.upsert(air_object(1, 46.5, 8.5, 0.0), 0.0);
        let center = Position { latitude: 46.5, longitude: 8.5, altitude: 0.0 };
        let hits = store.query_radius(center, 50.0, 10.0, 100.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn query_radius_is_capped_at_200km() {
        let store = HotStore::new();
        store.upsert(air_object(1, 46.5, 8.5, 0.0), 0.0);
        let far = Position { latitude: 0.0, longitude: 0.0, altitude: 0.0 };
        let hits = store.query_radius(far, 100_000.0, 3600.0, 0.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn update_name_merges_into_existing_record() {
        let store = HotStore::new();
        store.upsert(air_object(1, 46.5, 8.5, 0.0), 0.0);
        assert!(store.update_name(Address::new(1), "Glider 1".to_string(), 0.0));
        let key = RecordKey::AirObject(Address::new(1));
        match store.get(&key, 0.0).unwrap() {
            Record::AirObject(obj) => assert_eq!(obj.name.as_deref(), Some("Glider 1")),
            _ => panic!("expected AirObject"),
        }
    }

    #[test]
    fn update_name_for_unknown_address_is_a_no_op() {
        let store = HotStore::new();
        assert!(!store.update_name(Address::new(99), "Ghost".to_string(), 0.0));
    }
}
