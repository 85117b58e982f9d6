//! Configuration surface (§6): a TOML file parsed with `serde`/`toml`,
//! following the shape `jet1090::filters::Filters` uses for its own TOML
//! blocks, with defaults for every field so a minimal file is valid.

use serde::Deserialize;

fn default_server_port() -> u16 {
    8090
}
fn default_timeout_s() -> u64 {
    30
}
fn default_pool_size() -> u32 {
    100
}
fn default_min_idle() -> u32 {
    10
}
fn default_clean_session() -> bool {
    false
}
fn default_topic_prefix() -> String {
    "fb/b".to_string()
}
fn default_auth_cache_ttl_s() -> u64 {
    300
}
fn default_worker_pool_size() -> usize {
    100
}
fn default_broadcast_batch_size() -> usize {
    100
}
fn default_writer_batch_size() -> usize {
    1000
}
fn default_batch_timeout_s() -> u64 {
    5
}
fn default_ping_s() -> u64 {
    30
}
fn default_pong_timeout_s() -> u64 {
    60
}
fn default_radius_km() -> f64 {
    200.0
}
fn default_geohash_precision() -> usize {
    5
}
fn default_tracking_radius_percent() -> f64 {
    0.9
}
fn default_grace_period_s() -> u64 {
    300
}
fn default_min_movement_m() -> f64 {
    100.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub read_timeout_s: u64,
    pub write_timeout_s: u64,
    pub idle_timeout_s: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_server_port(),
            read_timeout_s: default_timeout_s(),
            write_timeout_s: default_timeout_s(),
            idle_timeout_s: default_timeout_s(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HotStoreConfig {
    pub backend_url: Option<String>,
    pub pool_size: u32,
    pub min_idle: u32,
}

impl Default for HotStoreConfig {
    fn default() -> Self {
        HotStoreConfig {
            backend_url: None,
            pool_size: default_pool_size(),
            min_idle: default_min_idle(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_url: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub clean_session: bool,
    pub topic_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        MqttConfig {
            broker_url: "mqtt://localhost:1883".to_string(),
            client_id: "fanet-core".to_string(),
            username: None,
            password: None,
            clean_session: default_clean_session(),
            topic_prefix: default_topic_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Empty disables the DurableWriter entirely.
    pub dsn: String,
    pub max_idle_connections: u32,
    pub max_open_connections: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            dsn: String::new(),
            max_idle_connections: default_min_idle(),
            max_open_connections: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub endpoint: Option<String>,
    pub cache_ttl_s: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            endpoint: None,
            cache_ttl_s: default_auth_cache_ttl_s(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub default_radius_km: f64,
    pub max_radius_km: f64,
    pub geohash_precision: usize,
}

impl Default for GeoConfig {
    fn default() -> Self {
        GeoConfig {
            default_radius_km: default_radius_km(),
            max_radius_km: default_radius_km(),
            geohash_precision: default_geohash_precision(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_km: f64,
    pub tracking_radius_percent: f64,
    pub grace_period_s: u64,
    pub min_movement_m: f64,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        BoundaryConfig {
            center_lat: 0.0,
            center_lon: 0.0,
            radius_km: default_radius_km(),
            tracking_radius_percent: default_tracking_radius_percent(),
            grace_period_s: default_grace_period_s(),
            min_movement_m: default_min_movement_m(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub hot_store: HotStoreConfig,
    pub mqtt: MqttConfig,
    pub history: HistoryConfig,
    pub auth: AuthConfig,
    pub cors_allow: Vec<String>,
    pub log_level: String,
    pub log_format: String,
    pub worker_pool_size: usize,
    pub broadcast_batch_size: usize,
    pub writer_batch_size: usize,
    pub batch_timeout_s: u64,
    pub ws_ping_s: u64,
    pub ws_pong_timeout_s: u64,
    pub geo: GeoConfig,
    pub boundary: BoundaryConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerConfig::default(),
            hot_store: HotStoreConfig::default(),
            mqtt: MqttConfig::default(),
            history: HistoryConfig::default(),
            auth: AuthConfig::default(),
            cors_allow: vec!["*".to_string()],
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            worker_pool_size: default_worker_pool_size(),
            broadcast_batch_size: default_broadcast_batch_size(),
            writer_batch_size: default_writer_batch_size(),
            batch_timeout_s: default_batch_timeout_s(),
            ws_ping_s: default_ping_s(),
            ws_pong_timeout_s: default_pong_timeout_s(),
            geo: GeoConfig::default(),
            boundary: BoundaryConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Settings, crate::error::ConfigError> {
        toml::from_str(text).map_err(crate::error::ConfigError::Parse)
    }

    pub fn load(path: Option<&std::path::Path>) -> Result<Settings, crate::error::ConfigError> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| crate::error::ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Settings::from_toml_str(&text)
    }

    pub fn history_enabled(&self) -> bool {
        !self.history.dsn.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8090);
        assert_eq!(settings.geo.geohash_precision, 5);
        assert!(!settings.history_enabled());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let toml = r#"
            log_level = "debug"

            [server]
            port = 9000
        "#;
        let settings = Settings::from_toml_str(toml).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.read_timeout_s, 30);
        assert_eq!(settings.worker_pool_size, 100);
    }

    #[test]
    fn history_dsn_enables_durable_writer() {
        let toml = r#"
            [history]
            dsn = "postgres://localhost/fanet"
        "#;
        let settings = Settings::from_toml_str(toml).unwrap();
        assert!(settings.history_enabled());
    }
}
