//! Ingress (C8): subscribes to the MQTT broker, decodes and validates each
//! message, and fans the admitted result out to HotStore, SpatialIndex,
//! DurableWriter and Broadcaster. Reconnects with exponential backoff the
//! way `jet1090::source::Source::receiver` retries a dropped TCP/UDP feed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use fanet_proto::codec::{self, DecodedFrame};
use fanet_proto::model::{Address, Record};

use crate::boundary::{BoundaryStatus, BoundaryTracker};
use crate::broadcast::Broadcaster;
use crate::durable::DurableWriter;
use crate::hotstore::HotStore;
use crate::spatial::SpatialIndex;
use crate::validator::{ValidationOutcome, Validator};

const MAX_BACKOFF_S: u64 = 30;

pub struct IngressServices {
    pub validator: Arc<Validator>,
    pub hot_store: Arc<HotStore>,
    pub spatial: Arc<SpatialIndex>,
    pub durable: Option<Arc<DurableWriter>>,
    pub broadcaster: Arc<Broadcaster>,
    pub boundary: Arc<BoundaryTracker>,
}

struct WorkItem {
    address: Address,
    frame: DecodedFrame,
    now: f64,
}

/// Spawns the MQTT event loop plus `worker_count` per-address-hashed
/// worker tasks. Message order for a single device is preserved because
/// every frame for that address always lands on the same worker channel
/// (§5).
pub fn spawn(
    mut mqtt_options: MqttOptions,
    topic_prefix: String,
    worker_count: usize,
    services: Arc<IngressServices>,
) {
    mqtt_options.set_keep_alive(Duration::from_secs(30));

    let mut worker_txs = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let (tx, rx) = mpsc::channel::<WorkItem>(1024);
        worker_txs.push(tx);
        let services = services.clone();
        tokio::spawn(run_worker(rx, services));
    }
    let worker_txs = Arc::new(worker_txs);

    tokio::spawn(run_event_loop(mqtt_options, topic_prefix, worker_txs));
}

async fn run_event_loop(mqtt_options: MqttOptions, topic_prefix: String, worker_txs: Arc<Vec<mpsc::Sender<WorkItem>>>) {
    let mut backoff = Duration::from_secs(1);
    let sequence = AtomicU64::new(0);
    let filter = format!("{}/+/f/#", topic_prefix.trim_end_matches('/'));

    loop {
        let (client, mut eventloop) = AsyncClient::new(mqtt_options.clone(), 100);
        if let Err(e) = client.subscribe(&filter, QoS::AtLeastOnce).await {
            warn!(error = %e, "mqtt subscribe failed, retrying");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(Duration::from_secs(MAX_BACKOFF_S));
            continue;
        }
        info!(topic = %filter, "mqtt ingress subscribed");
        backoff = Duration::from_secs(1);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    handle_publish(&publish.payload, &sequence, &worker_txs).await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "mqtt connection dropped, reconnecting");
                    break;
                }
            }
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(Duration::from_secs(MAX_BACKOFF_S));
    }
}

async fn handle_publish(payload: &[u8], sequence: &AtomicU64, worker_txs: &[mpsc::Sender<WorkItem>]) {
    if payload.len() < 8 {
        debug!(len = payload.len(), "mqtt payload too short for a wrapper");
        return;
    }
    let (wrapper_bytes, frame) = payload.split_at(8);
    let seq = sequence.fetch_add(1, Ordering::Relaxed);
    let now = wall_clock_seconds();

    match codec::decode(wrapper_bytes, frame, now, seq) {
        Ok(decoded) => {
            let Some(address) = address_of(&decoded) else { return };
            let worker = &worker_txs[(address.0 as usize) % worker_txs.len()];
            if worker.try_send(WorkItem { address, frame: decoded, now }).is_err() {
                warn!(%address, "ingress worker queue full, dropping frame");
            }
        }
        Err(e) => {
            debug!(error = %e, "dropping undecodable frame");
        }
    }
}

fn address_of(frame: &DecodedFrame) -> Option<Address> {
    match frame {
        DecodedFrame::Record(record) => Some(record.key().address()),
        DecodedFrame::Name(address, _) => Some(*address),
        DecodedFrame::Unmodeled(_) => None,
    }
}

async fn run_worker(mut rx: mpsc::Receiver<WorkItem>, services: Arc<IngressServices>) {
    while let Some(item) = rx.recv().await {
        match item.frame {
            DecodedFrame::Record(record) => process_record(&services, item.address, record, item.now),
            DecodedFrame::Name(address, name) => process_name(&services, address, name, item.now),
            DecodedFrame::Unmodeled(_) => {}
        }
    }
}

fn process_record(services: &IngressServices, address: Address, record: Record, now: f64) {
    let position = record.position();
    let speed_ceiling_kmh = match &record {
        Record::AirObject(obj) => obj.class.speed_ceiling_kmh(),
        _ => 400.0,
    };
    let class = match &record {
        Record::AirObject(obj) => Some(obj.class),
        _ => None,
    };
    let (ground_speed_kmh, vertical_speed_ms) = match &record {
        Record::AirObject(obj) => (Some(obj.ground_speed_kmh), Some(obj.vertical_speed_ms)),
        _ => (None, None),
    };

    let outcome = services.validator.evaluate(
        address,
        position,
        class,
        speed_ceiling_kmh,
        ground_speed_kmh,
        vertical_speed_ms,
        now,
    );
    // §4.3: Outside objects are not broadcast, but storage is unaffected
    // ("still stored if within any other configured center").
    let broadcastable = services.boundary.classify(address, position, now) != BoundaryStatus::Outside;

    match outcome {
        ValidationOutcome::Admit => {
            services.hot_store.upsert(record.clone(), now);
            services.spatial.insert(address, position, now);
            if let Some(durable) = &services.durable {
                enqueue_durable(durable, &record);
            }
            if broadcastable {
                services.broadcaster.publish_update(&record);
            }
        }
        ValidationOutcome::Revoke => {
            let key = record.key();
            services.hot_store.remove(&key);
            services.spatial.remove(address);
            if broadcastable {
                services.broadcaster.publish_remove(&record);
            }
        }
        ValidationOutcome::FirstSighting | ValidationOutcome::Suppressed => {}
    }
}

fn enqueue_durable(durable: &DurableWriter, record: &Record) {
    let result = match record {
        Record::AirObject(obj) => durable.enqueue_pilot(obj.clone()).err(),
        Record::Thermal(t) => durable.enqueue_thermal(t.clone()).err(),
        Record::WeatherStation(s) => durable.enqueue_station(s.clone()).err(),
        Record::GroundObject(_) => None,
    };
    if let Some(e) = result {
        warn!(error = %e, "durable writer queue full, history entry dropped");
    }
}

fn process_name(services: &IngressServices, address: Address, name: String, now: f64) {
    if services.hot_store.update_name(address, name.clone(), now) {
        if let Some(durable) = &services.durable {
            durable.update_name(address, name);
        }
    }
}

/// Placeholder for a real wall clock; kept as a single call site so tests
/// and production code share one seam.
fn wall_clock_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
