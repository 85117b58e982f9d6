//! Postgres-backed `HistoryBackend` (§6), reached over a DSN the way the
//! Regatta Race Suite's `sqlx::PgPool` is: a single pool shared across
//! workers, multi-row inserts built with `QueryBuilder` and run inside a
//! transaction so each flushed batch lands atomically.

use async_trait::async_trait;
use sqlx::{PgPool, QueryBuilder};

use fanet_proto::model::{Address, AirObject, Thermal, WeatherStation};

use super::backend::{BackendError, HistoryBackend};

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self, BackendError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(dsn)
            .await
            .map_err(|e| BackendError::Backend(e.to_string()))?;
        Ok(PostgresBackend { pool })
    }
}

#[async_trait]
impl HistoryBackend for PostgresBackend {
    async fn save_pilots_batch(&self, batch: &[AirObject]) -> Result<(), BackendError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let mut builder = QueryBuilder::new(
            "INSERT INTO ufo_track (addr, ufo_type, latitude, longitude, altitude_gps, speed, climb, course, track_online, datestamp) ",
        );
        builder.push_values(batch, |mut row, pilot| {
            row.push_bind(pilot.address.as_key())
                .push_bind(format!("{:?}", pilot.class))
                .push_bind(pilot.position.latitude)
                .push_bind(pilot.position.longitude)
                .push_bind(pilot.position.altitude)
                .push_bind(pilot.ground_speed_kmh)
                .push_bind(pilot.vertical_speed_ms)
                .push_bind(pilot.heading_deg)
                .push_bind(pilot.online_tracking)
                .push_bind(pilot.last_update);
        });
        builder.build().execute(&mut *tx).await.map_err(backend_err)?;
        tx.commit().await.map_err(backend_err)
    }

    async fn save_thermals_batch(&self, batch: &[Thermal]) -> Result<(), BackendError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let mut builder = QueryBuilder::new(
            "INSERT INTO thermal (addr, latitude, longitude, altitude, quality, climb, wind_speed, wind_heading, datestamp) ",
        );
        builder.push_values(batch, |mut row, thermal| {
            row.push_bind(thermal.address.as_key())
                .push_bind(thermal.position.latitude)
                .push_bind(thermal.position.longitude)
                .push_bind(thermal.position.altitude)
                .push_bind(thermal.quality as i16)
                .push_bind(thermal.average_climb_ms)
                .push_bind(thermal.wind_speed_ms)
                .push_bind(thermal.wind_direction_deg)
                .push_bind(thermal.last_update);
        });
        builder.build().execute(&mut *tx).await.map_err(backend_err)?;
        tx.commit().await.map_err(backend_err)
    }

    async fn save_stations_batch(&self, batch: &[WeatherStation]) -> Result<(), BackendError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let mut builder = QueryBuilder::new(
            "INSERT INTO station (addr, latitude, longitude, temperature, wind_direction, wind_speed, wind_gusts, humidity, pressure, battery, datestamp) ",
        );
        builder.push_values(batch, |mut row, station| {
            row.push_bind(station.address.as_key())
                .push_bind(station.position.latitude)
                .push_bind(station.position.longitude)
                .push_bind(station.temperature_c)
                .push_bind(station.wind_direction_deg)
                .push_bind(station.wind_speed_ms)
                .push_bind(station.wind_gusts_ms)
                .push_bind(station.humidity_pct)
                .push_bind(station.pressure_hpa)
                .push_bind(station.battery_pct)
                .push_bind(station.last_update);
        });
        builder.build().execute(&mut *tx).await.map_err(backend_err)?;
        tx.commit().await.map_err(backend_err)
    }

    async fn update_name(&self, address: Address, name: &str) -> Result<(), BackendError> {
        sqlx::query("INSERT INTO name (addr, name) VALUES ($1, $2) ON CONFLICT (addr) DO UPDATE SET name = EXCLUDED.name")
            .bind(address.as_key())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn load_initial_pilots(&self) -> Result<Vec<AirObject>, BackendError> {
        // The history store's track endpoint is best-effort; initial hot
        // state is always rebuilt from live traffic, not replayed here.
        Ok(Vec::new())
    }

    async fn load_initial_thermals(&self) -> Result<Vec<Thermal>, BackendError> {
        Ok(Vec::new())
    }

    async fn load_initial_stations(&self) -> Result<Vec<WeatherStation>, BackendError> {
        Ok(Vec::new())
    }
}

fn backend_err(e: sqlx::Error) -> BackendError {
    BackendError::Backend(e.to_string())
}
