//! The `HistoryBackend` capability (§9's dynamic-dispatch design note):
//! `{SavePilotsBatch, SaveThermalsBatch, SaveStationsBatch, UpdateName,
//! LoadInitial*}`. Boxed as `Arc<dyn HistoryBackend>` so the DurableWriter
//! doesn't need to know whether it's talking to Postgres or a test fake.

use async_trait::async_trait;
use thiserror::Error;

use fanet_proto::model::{Address, AirObject, Thermal, WeatherStation};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("history backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait HistoryBackend: Send + Sync {
    async fn save_pilots_batch(&self, batch: &[AirObject]) -> Result<(), BackendError>;
    async fn save_thermals_batch(&self, batch: &[Thermal]) -> Result<(), BackendError>;
    async fn save_stations_batch(&self, batch: &[WeatherStation]) -> Result<(), BackendError>;
    async fn update_name(&self, address: Address, name: &str) -> Result<(), BackendError>;
    async fn load_initial_pilots(&self) -> Result<Vec<AirObject>, BackendError>;
    async fn load_initial_thermals(&self) -> Result<Vec<Thermal>, BackendError>;
    async fn load_initial_stations(&self) -> Result<Vec<WeatherStation>, BackendError>;
}
