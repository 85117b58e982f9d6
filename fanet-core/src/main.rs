//! Process entry point, wired the way `jet1090::main` assembles its shared
//! state, spawns background tasks and serves HTTP/WebSocket behind a
//! single `#[tokio::main]`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rumqttc::MqttOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warp::Filter;

use fanet_core::auth::AuthClient;
use fanet_core::boundary::BoundaryTracker;
use fanet_core::broadcast::Broadcaster;
use fanet_core::cli::Options;
use fanet_core::config::Settings;
use fanet_core::durable::memory::MemoryBackend;
use fanet_core::durable::postgres::PostgresBackend;
use fanet_core::durable::{DurableWriter, HistoryBackend};
use fanet_core::hotstore::HotStore;
use fanet_core::http::{self, AppState};
use fanet_core::ingress::{self, IngressServices};
use fanet_core::spatial::SpatialIndex;
use fanet_core::validator::Validator;
use fanet_core::websocket::{self, WsState};

fn wall_clock_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let options = Options::parse();

    let mut settings = Settings::load(options.config.as_deref())?;
    if let Some(log_level) = &options.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(port) = options.serve_port {
        settings.server.port = port;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(port = settings.server.port, "starting fanet-core");

    let validator = Arc::new(Validator::new());
    let hot_store = Arc::new(HotStore::new());
    let spatial = Arc::new(SpatialIndex::new());
    let boundary = Arc::new(BoundaryTracker::from_config(&settings.boundary));
    let broadcaster = Arc::new(Broadcaster::new(settings.geo.geohash_precision));

    let backend: Arc<dyn HistoryBackend> = if settings.history_enabled() {
        match PostgresBackend::connect(&settings.history.dsn, settings.history.max_open_connections).await {
            Ok(backend) => Arc::new(backend),
            Err(e) => {
                warn!(error = %e, "failed to connect to history store, falling back to an in-memory backend");
                Arc::new(MemoryBackend::new())
            }
        }
    } else {
        Arc::new(MemoryBackend::new())
    };

    let durable = if settings.history_enabled() {
        Some(DurableWriter::spawn(
            backend,
            settings.writer_batch_size,
            Duration::from_secs(settings.batch_timeout_s),
        ))
    } else {
        None
    };

    let auth = settings.auth.endpoint.clone().map(|endpoint| Arc::new(AuthClient::new(endpoint, settings.auth.cache_ttl_s)));

    spawn_sweepers(hot_store.clone(), validator.clone(), broadcaster.clone());

    let mut mqtt_options = MqttOptions::new(settings.mqtt.client_id.clone(), broker_host(&settings.mqtt.broker_url), broker_port(&settings.mqtt.broker_url));
    if let (Some(user), Some(pass)) = (&settings.mqtt.username, &settings.mqtt.password) {
        mqtt_options.set_credentials(user.clone(), pass.clone());
    }
    mqtt_options.set_clean_session(settings.mqtt.clean_session);

    let ingress_services = Arc::new(IngressServices {
        validator: validator.clone(),
        hot_store: hot_store.clone(),
        spatial: spatial.clone(),
        durable: durable.clone(),
        broadcaster: broadcaster.clone(),
        boundary: boundary.clone(),
    });
    ingress::spawn(mqtt_options, settings.mqtt.topic_prefix.clone(), settings.worker_pool_size, ingress_services);

    let app_state = Arc::new(AppState { hot_store: hot_store.clone(), auth, now: wall_clock_seconds });
    let ws_state = Arc::new(WsState {
        broadcaster: broadcaster.clone(),
        ping_interval: Duration::from_secs(settings.ws_ping_s),
        pong_timeout: Duration::from_secs(settings.ws_pong_timeout_s),
        now: wall_clock_seconds,
    });

    let cors_builder = warp::cors().allow_methods(["GET", "POST"]).allow_headers(["content-type", "authorization", "accept"]);
    let cors = if settings.cors_allow.iter().any(|o| o == "*") {
        cors_builder.allow_any_origin().build()
    } else {
        cors_builder.allow_origins(settings.cors_allow.iter().map(String::as_str)).build()
    };

    let routes = http::routes(app_state).or(websocket::route(ws_state)).with(cors);

    warp::serve(routes).run(([0, 0, 0, 0], settings.server.port)).await;

    Ok(())
}

fn spawn_sweepers(hot_store: Arc<HotStore>, validator: Arc<Validator>, broadcaster: Arc<Broadcaster>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let dropped = hot_store.sweep(wall_clock_seconds());
            if dropped > 0 {
                info!(dropped, "hot store TTL sweep");
            }
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            validator.cleanup_idle(wall_clock_seconds(), 2 * 3600);
        }
    });

    // §4.7: the shortest adaptive flush interval is 100ms, so the sweep
    // driving it ticks at that granularity.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            interval.tick().await;
            broadcaster.sweep_flush(wall_clock_seconds());
        }
    });
}

fn broker_host(url: &str) -> String {
    let without_scheme = url.split("://").last().unwrap_or(url);
    without_scheme.split(':').next().unwrap_or("localhost").to_string()
}

fn broker_port(url: &str) -> u16 {
    let without_scheme = url.split("://").last().unwrap_or(url);
    without_scheme.split(':').nth(1).and_then(|p| p.parse().ok()).unwrap_or(1883)
}
