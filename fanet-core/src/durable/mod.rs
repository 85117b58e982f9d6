//! DurableWriter (C6): asynchronous batched writer to the external history
//! store. Three bounded queues (pilots, thermals, stations), each drained
//! by a worker that flushes on whichever comes first: `batchSize` records
//! or `flushInterval` elapsed. Never blocks ingress: `enqueue_*` returns
//! `QueueError::QueueFull` immediately instead of waiting for room (§4.6).

pub mod backend;
pub mod memory;
pub mod postgres;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, warn};

use fanet_proto::model::{Address, AirObject, Thermal, WeatherStation};

pub use backend::{BackendError, HistoryBackend};

use crate::error::QueueError;

const QUEUE_CAPACITY: usize = 10_000;
const RETRY_ATTEMPTS: u32 = 3;

pub struct DurableWriter {
    pilots_tx: mpsc::Sender<AirObject>,
    thermals_tx: mpsc::Sender<Thermal>,
    stations_tx: mpsc::Sender<WeatherStation>,
    backend: Arc<dyn HistoryBackend>,
    pilot_errors: Arc<AtomicU64>,
    thermal_errors: Arc<AtomicU64>,
    station_errors: Arc<AtomicU64>,
}

impl DurableWriter {
    pub fn spawn(backend: Arc<dyn HistoryBackend>, batch_size: usize, flush_interval: Duration) -> Arc<DurableWriter> {
        let (pilots_tx, pilots_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (thermals_tx, thermals_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (stations_tx, stations_rx) = mpsc::channel(QUEUE_CAPACITY);

        let pilot_errors = Arc::new(AtomicU64::new(0));
        let thermal_errors = Arc::new(AtomicU64::new(0));
        let station_errors = Arc::new(AtomicU64::new(0));

        spawn_worker(pilots_rx, batch_size, flush_interval, "pilots", pilot_errors.clone(), {
            let backend = backend.clone();
            move |batch: Vec<AirObject>| {
                let backend = backend.clone();
                async move { backend.save_pilots_batch(&batch).await }
            }
        });
        spawn_worker(thermals_rx, batch_size, flush_interval, "thermals", thermal_errors.clone(), {
            let backend = backend.clone();
            move |batch: Vec<Thermal>| {
                let backend = backend.clone();
                async move { backend.save_thermals_batch(&batch).await }
            }
        });
        spawn_worker(stations_rx, batch_size, flush_interval, "stations", station_errors.clone(), {
            let backend = backend.clone();
            move |batch: Vec<WeatherStation>| {
                let backend = backend.clone();
                async move { backend.save_stations_batch(&batch).await }
            }
        });

        Arc::new(DurableWriter {
            pilots_tx,
            thermals_tx,
            stations_tx,
            backend,
            pilot_errors,
            thermal_errors,
            station_errors,
        })
    }

    pub fn enqueue_pilot(&self, record: AirObject) -> Result<(), QueueError> {
        self.pilots_tx.try_send(record).map_err(|_| QueueError::QueueFull)
    }

    pub fn enqueue_thermal(&self, record: Thermal) -> Result<(), QueueError> {
        self.thermals_tx.try_send(record).map_err(|_| QueueError::QueueFull)
    }

    pub fn enqueue_station(&self, record: WeatherStation) -> Result<(), QueueError> {
        self.stations_tx.try_send(record).map_err(|_| QueueError::QueueFull)
    }

    /// §6: name updates are upserted directly rather than batched, since
    /// they merge into whichever pilot row is already there.
    pub fn update_name(&self, address: Address, name: String) {
        let backend = self.backend.clone();
        tokio::spawn(async move {
            for attempt in 1..=RETRY_ATTEMPTS {
                match backend.update_name(address, &name).await {
                    Ok(()) => return,
                    Err(e) if attempt < RETRY_ATTEMPTS => {
                        warn!(%address, attempt, error = %e, "name upsert failed, retrying");
                        tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                    }
                    Err(e) => {
                        error!(%address, error = %e, "name upsert failed permanently");
                    }
                }
            }
        });
    }

    pub fn pilot_error_count(&self) -> u64 {
        self.pilot_errors.load(Ordering::Relaxed)
    }

    pub fn thermal_error_count(&self) -> u64 {
        self.thermal_errors.load(Ordering::Relaxed)
    }

    pub fn station_error_count(&self) -> u64 {
        self.station_errors.load(Ordering::Relaxed)
    }
}

fn spawn_worker<T, F, Fut>(
    mut rx: mpsc::Receiver<T>,
    batch_size: usize,
    flush_interval: Duration,
    kind: &'static str,
    error_count: Arc<AtomicU64>,
    save: F,
) where
    T: Send + Clone + 'static,
    F: Fn(Vec<T>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), BackendError>> + Send,
{
    tokio::spawn(async move {
        let mut batch: Vec<T> = Vec::with_capacity(batch_size);
        loop {
            let deadline = tokio::time::sleep(flush_interval);
            tokio::pin!(deadline);
            let mut channel_closed = false;
            loop {
                tokio::select! {
                    item = rx.recv() => {
                        match item {
                            Some(record) => {
                                batch.push(record);
                                if batch.len() >= batch_size {
                                    break;
                                }
                            }
                            None => {
                                channel_closed = true;
                                break;
                            }
                        }
                    }
                    _ = &mut deadline => break,
                }
            }

            if !batch.is_empty() {
                let to_flush = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                flush_with_retry(&save, to_flush, kind, &error_count).await;
            }

            if channel_closed {
                return;
            }
        }
    });
}

async fn flush_with_retry<T, F, Fut>(save: &F, batch: Vec<T>, kind: &'static str, error_count: &AtomicU64)
where
    T: Clone,
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<(), BackendError>>,
{
    let len = batch.len();
    for attempt in 1..=RETRY_ATTEMPTS {
        // `save` takes ownership of the batch; on retry we pay a clone, which
        // is cheap next to the network round-trip it is about to make.
        match save(batch.clone()).await {
            Ok(()) => return,
            Err(e) if attempt < RETRY_ATTEMPTS => {
                warn!(kind, attempt, len, error = %e, "batch flush failed, retrying");
                tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
            }
            Err(e) => {
                error!(kind, len, error = %e, "batch flush failed permanently, dropping batch");
                error_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::MemoryBackend;
    use fanet_proto::model::{AircraftClass, Position, SignalQuality};

    fn pilot(addr: u32) -> AirObject {
        AirObject {
            address: Address::new(addr),
            position: Position { latitude: 46.5, longitude: 8.5, altitude: 1000.0 },
            last_update: 0.0,
            signal: SignalQuality { rssi_dbm: -70, snr_db: 8 },
            sequence: 0,
            class: AircraftClass::Paraglider,
            ground_speed_kmh: 30.0,
            vertical_speed_ms: 0.0,
            heading_deg: 0.0,
            online_tracking: true,
            name: None,
        }
    }

    #[tokio::test]
    async fn batch_flushes_at_batch_size() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = DurableWriter::spawn(backend.clone(), 4, Duration::from_secs(60));
        for i in 0..4 {
            writer.enqueue_pilot(pilot(i)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.pilot_count(), 4);
    }

    #[tokio::test]
    async fn partial_batch_flushes_on_timer() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = DurableWriter::spawn(backend.clone(), 1000, Duration::from_millis(100));
        for i in 0..3 {
            writer.enqueue_pilot(pilot(i)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(backend.pilot_count(), 3);
    }

    #[tokio::test]
    async fn e6_2500_records_over_two_seconds_produce_two_full_batches_and_a_timer_flush() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = DurableWriter::spawn(backend.clone(), 1000, Duration::from_secs(5));
        for i in 0..2500u32 {
            writer.enqueue_pilot(pilot(i)).unwrap();
            if i % 250 == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
        // two full 1000-record batches flush as soon as they fill
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.pilot_count(), 2000);
        // the remaining 500 flush once the 5s timer elapses
        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert_eq!(backend.pilot_count(), 2500);
    }

    #[tokio::test]
    async fn enqueue_returns_queue_full_when_backlog_saturates_capacity() {
        // A backend that never returns keeps the worker from draining the
        // queue, so enough enqueues eventually saturate its bounded capacity.
        struct StuckBackend;
        #[async_trait::async_trait]
        impl HistoryBackend for StuckBackend {
            async fn save_pilots_batch(&self, _: &[AirObject]) -> Result<(), BackendError> {
                std::future::pending::<()>().await;
                Ok(())
            }
            async fn save_thermals_batch(&self, _: &[Thermal]) -> Result<(), BackendError> {
                Ok(())
            }
            async fn save_stations_batch(&self, _: &[WeatherStation]) -> Result<(), BackendError> {
                Ok(())
            }
            async fn update_name(&self, _: Address, _: &str) -> Result<(), BackendError> {
                Ok(())
            }
            async fn load_initial_pilots(&self) -> Result<Vec<AirObject>, BackendError> {
                Ok(Vec::new())
            }
            async fn load_initial_thermals(&self) -> Result<Vec<Thermal>, BackendError> {
                Ok(Vec::new())
            }
            async fn load_initial_stations(&self) -> Result<Vec<WeatherStation>, BackendError> {
                Ok(Vec::new())
            }
        }

        let writer = DurableWriter::spawn(Arc::new(StuckBackend), 1, Duration::from_millis(10));
        let mut saw_full = false;
        for i in 0..(QUEUE_CAPACITY as u32 + 10) {
            if writer.enqueue_pilot(pilot(i)).is_err() {
                saw_full = true;
                break;
            }
        }
        assert!(saw_full);
    }
}
