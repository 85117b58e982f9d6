//! Broadcaster (C7): fans out admitted records to subscribed WebSocket
//! clients, routed by geohash cover so a client only receives updates
//! inside its own subscription radius. Grounded on the registration and
//! per-connection forwarding shape of `jet1090::channel::ChannelControl`
//! and `jet1090::websocket::agent_rx_to_conn`, adapted from Phoenix-channel
//! topic subscriptions to geohash-cell routing.

pub mod protocol;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use fanet_proto::geo::distance_m;
use fanet_proto::geohash;
use fanet_proto::model::{Position, Record};

pub use protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};

const OUTBOUND_QUEUE_CAPACITY: usize = 256;
const BATCH_CAP: usize = 100;
const MAX_CONSECUTIVE_DROPS: u32 = 3;
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Subscribed,
    Closing,
    Closed,
}

struct Subscription {
    center: Position,
    radius_km: f64,
    geohashes: HashSet<String>,
}

struct ClientHandle {
    tx: mpsc::Sender<ServerMessage>,
    subscription: Mutex<Option<Subscription>>,
    consecutive_drops: AtomicU32,
    state: Mutex<ConnectionState>,
    /// Non-critical updates queued for the next adaptive flush (§4.7).
    pending: Mutex<Vec<ServerMessage>>,
    /// Count of updates queued since the last flush, driving the next
    /// flush's interval.
    activity: AtomicU32,
    last_flush_at: Mutex<f64>,
}

pub struct Broadcaster {
    clients: RwLock<HashMap<Uuid, ClientHandle>>,
    routing: RwLock<HashMap<String, HashSet<Uuid>>>,
    sequence: AtomicU64,
    geohash_precision: usize,
}

/// §4.7: flush interval is adaptive in [100ms, 30s], shorter the busier a
/// client's cells have been since its last flush.
fn adaptive_interval(activity: u32) -> Duration {
    let scaled_ms = MAX_FLUSH_INTERVAL.as_millis() as u64 / (activity as u64 + 1);
    Duration::from_millis(scaled_ms.clamp(MIN_FLUSH_INTERVAL.as_millis() as u64, MAX_FLUSH_INTERVAL.as_millis() as u64))
}

fn send_message(handle: &ClientHandle, client_id: Uuid, message: ServerMessage) {
    match handle.tx.try_send(message) {
        Ok(()) => {
            handle.consecutive_drops.store(0, Ordering::Relaxed);
        }
        Err(_) => {
            let drops = handle.consecutive_drops.fetch_add(1, Ordering::Relaxed) + 1;
            if drops >= MAX_CONSECUTIVE_DROPS {
                warn!(%client_id, drops, "client outbound queue saturated, closing");
                *handle.state.lock().unwrap() = ConnectionState::Closing;
            }
        }
    }
}

/// Drains `handle`'s pending buffer, chunking at `BATCH_CAP` and wrapping
/// multi-update chunks in `ServerMessage::Batch` (§4.7).
fn send_batch(handle: &ClientHandle, client_id: Uuid) {
    let pending = std::mem::take(&mut *handle.pending.lock().unwrap());
    if pending.is_empty() {
        return;
    }
    for chunk in pending.chunks(BATCH_CAP) {
        let message = if chunk.len() == 1 {
            chunk[0].clone()
        } else {
            ServerMessage::Batch { updates: chunk.to_vec() }
        };
        send_message(handle, client_id, message);
    }
}

impl Broadcaster {
    pub fn new(geohash_precision: usize) -> Self {
        Broadcaster {
            clients: RwLock::new(HashMap::new()),
            routing: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            geohash_precision,
        }
    }

    /// Registers a new connection in the CONNECTING->READY transition and
    /// returns its id, receiver and Welcome payload (§4.7).
    pub fn register(&self, now: f64) -> (Uuid, mpsc::Receiver<ServerMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let handle = ClientHandle {
            tx: tx.clone(),
            subscription: Mutex::new(None),
            consecutive_drops: AtomicU32::new(0),
            state: Mutex::new(ConnectionState::Ready),
            pending: Mutex::new(Vec::new()),
            activity: AtomicU32::new(0),
            last_flush_at: Mutex::new(now),
        };
        self.clients.write().unwrap().insert(id, handle);

        let sequence = self.sequence.load(Ordering::SeqCst);
        let _ = tx.try_send(ServerMessage::Welcome {
            server_time: now,
            sequence,
            version: PROTOCOL_VERSION.to_string(),
        });
        (id, rx)
    }

    pub fn subscribe(&self, client_id: Uuid, lat: f64, lon: f64, radius_km: f64) -> bool {
        let clients = self.clients.read().unwrap();
        let Some(handle) = clients.get(&client_id) else {
            return false;
        };

        let geohashes: HashSet<String> =
            geohash::cover(lat, lon, radius_km, self.geohash_precision).into_iter().collect();

        {
            let mut routing = self.routing.write().unwrap();
            if let Some(previous) = handle.subscription.lock().unwrap().as_ref() {
                for cell in &previous.geohashes {
                    if let Some(set) = routing.get_mut(cell) {
                        set.remove(&client_id);
                    }
                }
            }
            for cell in &geohashes {
                routing.entry(cell.clone()).or_default().insert(client_id);
            }
        }

        *handle.subscription.lock().unwrap() = Some(Subscription {
            center: Position { latitude: lat, longitude: lon, altitude: 0.0 },
            radius_km,
            geohashes: geohashes.clone(),
        });
        *handle.state.lock().unwrap() = ConnectionState::Subscribed;

        let _ = handle.tx.try_send(ServerMessage::SubscribeResponse {
            success: true,
            geohashes: geohashes.into_iter().collect(),
        });
        true
    }

    pub fn unregister(&self, client_id: Uuid) {
        if let Some(handle) = self.clients.write().unwrap().remove(&client_id) {
            if let Some(sub) = handle.subscription.lock().unwrap().as_ref() {
                let mut routing = self.routing.write().unwrap();
                for cell in &sub.geohashes {
                    if let Some(set) = routing.get_mut(cell) {
                        set.remove(&client_id);
                    }
                }
            }
        }
    }

    /// Routes an Upsert for `record` to every subscriber whose circle
    /// actually contains its position (the geohash cover is a superset
    /// cull, §4.5/§4.7). Distress GroundObjects are critical and bypass
    /// batching entirely; everything else is queued for the client's next
    /// adaptive flush.
    pub fn publish_update(&self, record: &Record) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.dispatch(record.position(), ServerMessage::Update { sequence, record: record.clone() }, record.is_critical());
    }

    pub fn publish_remove(&self, record: &Record) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.dispatch(record.position(), ServerMessage::Remove { sequence, key: record.key() }, record.is_critical());
    }

    fn dispatch(&self, position: Position, message: ServerMessage, critical: bool) {
        let cell = geohash::encode(position.latitude, position.longitude, self.geohash_precision);
        let candidates: HashSet<Uuid> = {
            let routing = self.routing.read().unwrap();
            let mut set = HashSet::new();
            for neighbor in std::iter::once(cell.clone()).chain(geohash::neighbors(&cell)) {
                if let Some(ids) = routing.get(&neighbor) {
                    set.extend(ids.iter().copied());
                }
            }
            set
        };

        let clients = self.clients.read().unwrap();
        for client_id in candidates {
            let Some(handle) = clients.get(&client_id) else { continue };
            let within_radius = match handle.subscription.lock().unwrap().as_ref() {
                Some(sub) => distance_m(&sub.center, &position) <= sub.radius_km * 1000.0,
                None => false,
            };
            if !within_radius {
                continue;
            }
            if critical {
                send_message(handle, client_id, message.clone());
            } else {
                handle.pending.lock().unwrap().push(message.clone());
                handle.activity.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Flushes every client whose adaptive interval has elapsed since its
    /// last flush. Driven by a periodic sweeper the way HotStore's TTL
    /// sweep and Validator's idle cleanup are.
    pub fn sweep_flush(&self, now: f64) {
        let clients = self.clients.read().unwrap();
        for (client_id, handle) in clients.iter() {
            let mut last_flush_at = handle.last_flush_at.lock().unwrap();
            let activity = handle.activity.load(Ordering::Relaxed);
            if now - *last_flush_at >= adaptive_interval(activity).as_secs_f64() {
                send_batch(handle, *client_id);
                handle.activity.store(0, Ordering::Relaxed);
                *last_flush_at = now;
            }
        }
    }

    /// Forces an immediate flush of `client_id`'s pending buffer,
    /// regardless of its adaptive interval. Used by tests and by
    /// `unregister` callers that want a final drain before closing.
    pub fn flush_now(&self, client_id: Uuid) {
        let clients = self.clients.read().unwrap();
        if let Some(handle) = clients.get(&client_id) {
            send_batch(handle, client_id);
            handle.activity.store(0, Ordering::Relaxed);
        }
    }

    /// Sends an application-level Ping (§4.7: every 30s). Returns `false`
    /// if the client is already gone so the caller can stop its own timer.
    pub fn ping(&self, client_id: Uuid) -> bool {
        let clients = self.clients.read().unwrap();
        match clients.get(&client_id) {
            Some(handle) => handle.tx.try_send(ServerMessage::Ping).is_ok(),
            None => false,
        }
    }

    pub fn state_of(&self, client_id: Uuid) -> Option<ConnectionState> {
        self.clients.read().unwrap().get(&client_id).map(|h| *h.state.lock().unwrap())
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().unwrap().len()
    }
}
