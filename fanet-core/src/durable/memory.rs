//! In-memory `HistoryBackend` fake (§9), used by the DurableWriter's own
//! tests and by anything downstream that wants a history store without a
//! real Postgres instance.

use std::sync::Mutex;

use async_trait::async_trait;

use fanet_proto::model::{Address, AirObject, Thermal, WeatherStation};

use super::backend::{BackendError, HistoryBackend};

#[derive(Default)]
pub struct MemoryBackend {
    pilots: Mutex<Vec<AirObject>>,
    thermals: Mutex<Vec<Thermal>>,
    stations: Mutex<Vec<WeatherStation>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    pub fn pilot_count(&self) -> usize {
        self.pilots.lock().unwrap().len()
    }

    pub fn thermal_count(&self) -> usize {
        self.thermals.lock().unwrap().len()
    }

    pub fn station_count(&self) -> usize {
        self.stations.lock().unwrap().len()
    }
}

#[async_trait]
impl HistoryBackend for MemoryBackend {
    async fn save_pilots_batch(&self, batch: &[AirObject]) -> Result<(), BackendError> {
        self.pilots.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }

    async fn save_thermals_batch(&self, batch: &[Thermal]) -> Result<(), BackendError> {
        self.thermals.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }

    async fn save_stations_batch(&self, batch: &[WeatherStation]) -> Result<(), BackendError> {
        self.stations.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }

    async fn update_name(&self, address: Address, name: &str) -> Result<(), BackendError> {
        let mut pilots = self.pilots.lock().unwrap();
        if let Some(pilot) = pilots.iter_mut().rfind(|p| p.address == address) {
            pilot.name = Some(name.to_string());
        }
        Ok(())
    }

    async fn load_initial_pilots(&self) -> Result<Vec<AirObject>, BackendError> {
        Ok(self.pilots.lock().unwrap().clone())
    }

    async fn load_initial_thermals(&self) -> Result<Vec<Thermal>, BackendError> {
        Ok(self.thermals.lock().unwrap().clone())
    }

    async fn load_initial_stations(&self) -> Result<Vec<WeatherStation>, BackendError> {
        Ok(self.stations.lock().unwrap().clone())
    }
}
