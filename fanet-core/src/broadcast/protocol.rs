//! Wire protocol for the Broadcaster's WebSocket clients (§4.7). Plain
//! tagged JSON rather than jet1090's Phoenix-channel tuple framing: this
//! protocol pushes differential geohash-routed updates, not arbitrary
//! evalexpr-filtered pub/sub, so there is no channel-join handshake to
//! preserve.

use serde::{Deserialize, Serialize};

use fanet_proto::model::{Record, RecordKey};

pub const PROTOCOL_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { lat: f64, lon: f64, radius_km: f64 },
    Pong,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { server_time: f64, sequence: u64, version: String },
    SubscribeResponse { success: bool, geohashes: Vec<String> },
    Update { sequence: u64, record: Record },
    Remove { sequence: u64, key: RecordKey },
    Batch { updates: Vec<ServerMessage> },
    Ping,
}
