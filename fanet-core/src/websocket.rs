//! WebSocket endpoint (§6/§4.7): `/ws/v1/updates?lat=&lon=&radius=&token=`.
//! Grounded on `jet1090::websocket::on_connected`'s shape — split the
//! socket, spawn an outbound forwarding task reading the Broadcaster's
//! per-client channel, and drive the inbound loop on the task that owns
//! the warp upgrade.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;
use warp::ws::{Message, WebSocket};
use warp::{Filter, Rejection, Reply};

use crate::broadcast::{Broadcaster, ClientMessage};

pub struct WsState {
    pub broadcaster: Arc<Broadcaster>,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub now: fn() -> f64,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    lat: f64,
    lon: f64,
    radius: f64,
    #[serde(default)]
    #[allow(dead_code)]
    token: Option<String>,
}

pub fn route(state: Arc<WsState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let with_state = warp::any().map(move || state.clone());
    warp::path!("ws" / "v1" / "updates")
        .and(warp::ws())
        .and(warp::query::<WsQuery>())
        .and(with_state)
        .map(|ws: warp::ws::Ws, query: WsQuery, state: Arc<WsState>| {
            ws.on_upgrade(move |socket| handle_connection(socket, query, state))
        })
}

async fn handle_connection(socket: WebSocket, query: WsQuery, state: Arc<WsState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let now = (state.now)();
    let (client_id, mut updates) = state.broadcaster.register(now);
    state.broadcaster.subscribe(client_id, query.lat, query.lon, query.radius.clamp(1.0, 200.0));

    let last_pong = Arc::new(Mutex::new(Instant::now()));

    let send_task = tokio::spawn(async move {
        while let Some(message) = updates.recv().await {
            let Ok(text) = serde_json::to_string(&message) else { continue };
            if ws_tx.send(Message::text(text)).await.is_err() {
                break;
            }
        }
    });

    let ping_broadcaster = state.broadcaster.clone();
    let ping_last_pong = last_pong.clone();
    let ping_interval = state.ping_interval;
    let pong_timeout = state.pong_timeout;
    let ping_task = tokio::spawn(async move {
        loop {
            tokio::time::sleep(ping_interval).await;
            if ping_last_pong.lock().unwrap().elapsed() > pong_timeout {
                debug!(%client_id, "pong timeout, closing connection");
                ping_broadcaster.unregister(client_id);
                return;
            }
            if !ping_broadcaster.ping(client_id) {
                return;
            }
        }
    });

    while let Some(Ok(message)) = ws_rx.next().await {
        if message.is_close() {
            break;
        }
        let Ok(text) = message.to_str() else { continue };
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Pong) => {
                *last_pong.lock().unwrap() = Instant::now();
            }
            Ok(ClientMessage::Subscribe { lat, lon, radius_km }) => {
                state.broadcaster.subscribe(client_id, lat, lon, radius_km.clamp(1.0, 200.0));
            }
            Err(e) => warn!(%client_id, error = %e, "unrecognized client message"),
        }
    }

    state.broadcaster.unregister(client_id);
    send_task.abort();
    ping_task.abort();
}
