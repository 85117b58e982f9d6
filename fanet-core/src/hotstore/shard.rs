//! A single shard of the HotStore: a plain `RwLock`-guarded map. Splitting
//! the keyspace across shards keeps concurrent Upserts from serializing on
//! one lock, the same tradeoff `jet1090::channel::ChannelControl` makes by
//! keying its per-connection state off a `HashMap` guarded by a single lock
//! per channel rather than one giant table.

use std::collections::HashMap;
use std::sync::RwLock;

use fanet_proto::model::{ttl_seconds, Record, RecordKey};

pub(crate) struct Entry {
    pub record: Record,
    pub expires_at: f64,
}

#[derive(Default)]
pub(crate) struct Shard {
    entries: RwLock<HashMap<RecordKey, Entry>>,
}

impl Shard {
    pub fn upsert(&self, record: Record, now: f64) {
        let key = record.key();
        let expires_at = now + ttl_seconds(key.kind()) as f64;
        self.entries.write().unwrap().insert(key, Entry { record, expires_at });
    }

    pub fn remove(&self, key: &RecordKey) -> Option<Record> {
        self.entries.write().unwrap().remove(key).map(|e| e.record)
    }

    pub fn get(&self, key: &RecordKey, now: f64) -> Option<Record> {
        let entries = self.entries.read().unwrap();
        entries.get(key).filter(|e| e.expires_at > now).map(|e| e.record.clone())
    }

    pub fn for_each_live<F: FnMut(&Record)>(&self, now: f64, mut f: F) {
        let entries = self.entries.read().unwrap();
        for entry in entries.values() {
            if entry.expires_at > now {
                f(&entry.record);
            }
        }
    }

    pub fn update_name(&self, key: &RecordKey, name: String, now: f64) -> bool {
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                if let Record::AirObject(obj) = &mut entry.record {
                    obj.name = Some(name);
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    pub fn sweep(&self, now: f64) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self, now: f64) -> usize {
        self.entries.read().unwrap().values().filter(|e| e.expires_at > now).count()
    }
}
