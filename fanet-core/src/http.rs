//! REST snapshot API (§6), built on `warp` the way `jet1090::web` serves
//! its own `/`, `/all` and `/track/{icao24}` routes: one handler per
//! endpoint, `cors()` wide open by configuration, and a shared rejection
//! handler that maps errors to a JSON body with the matching status code.

use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use fanet_proto::geo::Bounds;
use fanet_proto::model::{AircraftClass, GroundClass, Position, Record};

use crate::auth::AuthClient;
use crate::hotstore::HotStore;

pub struct AppState {
    pub hot_store: Arc<HotStore>,
    pub auth: Option<Arc<AuthClient>>,
    pub now: fn() -> f64,
}

#[derive(Debug, Deserialize)]
struct SnapshotQuery {
    lat: f64,
    lon: f64,
    radius: f64,
    max_age: Option<f64>,
    pilots: Option<bool>,
    stations: Option<bool>,
    thermals: Option<bool>,
    ground_objects: Option<bool>,
    #[serde(rename = "air-types")]
    air_types: Option<String>,
    #[serde(rename = "ground-types")]
    ground_types: Option<String>,
}

fn parse_aircraft_classes(csv: &str) -> Vec<AircraftClass> {
    csv.split(',')
        .filter_map(|name| match name.trim() {
            "other" => Some(AircraftClass::Other),
            "paraglider" => Some(AircraftClass::Paraglider),
            "hangglider" => Some(AircraftClass::Hangglider),
            "balloon" => Some(AircraftClass::Balloon),
            "glider" => Some(AircraftClass::Glider),
            "powered" => Some(AircraftClass::Powered),
            "helicopter" => Some(AircraftClass::Helicopter),
            "uav" => Some(AircraftClass::Uav),
            _ => None,
        })
        .collect()
}

fn parse_ground_classes(csv: &str) -> Vec<GroundClass> {
    csv.split(',')
        .filter_map(|name| match name.trim() {
            "other" => Some(GroundClass::Other),
            "walking" => Some(GroundClass::Walking),
            "vehicle" => Some(GroundClass::Vehicle),
            "bike" => Some(GroundClass::Bike),
            "boat" => Some(GroundClass::Boat),
            "need_ride" => Some(GroundClass::NeedRide),
            "landed_well" => Some(GroundClass::LandedWell),
            "need_technical" => Some(GroundClass::NeedTechnical),
            "need_medical" => Some(GroundClass::NeedMedical),
            "distress" => Some(GroundClass::Distress),
            "distress_auto" => Some(GroundClass::DistressAuto),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct SnapshotResponse {
    pilots: Vec<Record>,
    ground_objects: Vec<Record>,
    thermals: Vec<Record>,
    stations: Vec<Record>,
    sequence: u64,
}

#[derive(Debug, Deserialize)]
struct BoundsQuery {
    bounds: String,
    min_quality: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct TrackQuery {
    #[serde(default)]
    hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PositionReport {
    position: PositionDto,
    #[serde(default)]
    altitude: f64,
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    climb: f64,
    #[serde(default)]
    course: f64,
    #[serde(default)]
    timestamp: f64,
}

#[derive(Debug, Deserialize)]
struct PositionDto {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize)]
struct PositionAck {
    success: bool,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

fn parse_bounds(raw: &str) -> Option<Bounds> {
    let parts: Vec<f64> = raw.split(',').filter_map(|s| s.trim().parse().ok()).collect();
    if parts.len() != 4 {
        return None;
    }
    Some(Bounds { sw_lat: parts[0], sw_lon: parts[1], ne_lat: parts[2], ne_lon: parts[3] })
}

/// §6: binary (bincode, length-prefixed) preferred, JSON otherwise.
/// The downlink format doesn't need to replicate the compact uplink FANET
/// wire encoding, so this reuses `bincode` against the already-`Serialize`
/// record types rather than a bespoke writer for the packed frame layout.
fn encode<T: Serialize>(accept: Option<String>, value: &T) -> warp::reply::Response {
    let wants_binary = accept.as_deref().map(|a| a.contains("application/octet-stream")).unwrap_or(false);
    if wants_binary {
        match bincode::serialize(value) {
            Ok(body) => {
                let mut framed = Vec::with_capacity(4 + body.len());
                framed.extend_from_slice(&(body.len() as u32).to_be_bytes());
                framed.extend_from_slice(&body);
                warp::http::Response::builder()
                    .status(StatusCode::OK)
                    .header("content-type", "application/octet-stream")
                    .body(framed.into())
                    .unwrap()
            }
            Err(_) => warp::reply::with_status("encoding error", StatusCode::INTERNAL_SERVER_ERROR).into_response(),
        }
    } else {
        warp::reply::json(value).into_response()
    }
}

async fn snapshot(query: SnapshotQuery, accept: Option<String>, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let radius = query.radius.clamp(1.0, 200.0);
    let max_age = query.max_age.unwrap_or(86_400.0);
    let now = (state.now)();
    let center = Position { latitude: query.lat, longitude: query.lon, altitude: 0.0 };
    let records = state.hot_store.query_radius(center, radius, max_age, now);

    let want_pilots = query.pilots.unwrap_or(true);
    let want_stations = query.stations.unwrap_or(true);
    let want_thermals = query.thermals.unwrap_or(true);
    let want_ground_objects = query.ground_objects.unwrap_or(true);
    let air_types = query.air_types.as_deref().map(parse_aircraft_classes);
    let ground_types = query.ground_types.as_deref().map(parse_ground_classes);

    let mut pilots = Vec::new();
    let mut ground_objects = Vec::new();
    let mut thermals = Vec::new();
    let mut stations = Vec::new();
    for record in records {
        match &record {
            Record::AirObject(obj) if want_pilots => {
                if air_types.as_ref().map_or(true, |types| types.contains(&obj.class)) {
                    pilots.push(record);
                }
            }
            Record::GroundObject(obj) if want_ground_objects => {
                if ground_types.as_ref().map_or(true, |types| types.contains(&obj.class)) {
                    ground_objects.push(record);
                }
            }
            Record::Thermal(_) if want_thermals => thermals.push(record),
            Record::WeatherStation(_) if want_stations => stations.push(record),
            _ => {}
        }
    }

    let response = SnapshotResponse { pilots, ground_objects, thermals, stations, sequence: 0 };
    Ok(encode(accept, &response))
}

async fn pilots(query: BoundsQuery, accept: Option<String>, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let Some(bounds) = parse_bounds(&query.bounds) else {
        return Err(warp::reject::custom(BadRequest("invalid bounds".to_string())));
    };
    let now = (state.now)();
    let records: Vec<Record> = state
        .hot_store
        .query_bounds(bounds, now)
        .into_iter()
        .filter(|r| matches!(r, Record::AirObject(_)))
        .collect();
    Ok(encode(accept, &records))
}

async fn thermals(query: BoundsQuery, accept: Option<String>, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let Some(bounds) = parse_bounds(&query.bounds) else {
        return Err(warp::reject::custom(BadRequest("invalid bounds".to_string())));
    };
    let now = (state.now)();
    let min_quality = query.min_quality.unwrap_or(0);
    let records: Vec<Record> = state
        .hot_store
        .query_bounds(bounds, now)
        .into_iter()
        .filter(|r| matches!(r, Record::Thermal(t) if t.quality >= min_quality))
        .collect();
    Ok(encode(accept, &records))
}

async fn stations(query: BoundsQuery, accept: Option<String>, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let Some(bounds) = parse_bounds(&query.bounds) else {
        return Err(warp::reject::custom(BadRequest("invalid bounds".to_string())));
    };
    let now = (state.now)();
    let records: Vec<Record> = state
        .hot_store
        .query_bounds(bounds, now)
        .into_iter()
        .filter(|r| matches!(r, Record::WeatherStation(_)))
        .collect();
    Ok(encode(accept, &records))
}

/// Best-effort and empty by construction: the history store's track
/// endpoint is out of scope, so there is nothing durable to replay here.
async fn track(_addr: String, _query: TrackQuery, accept: Option<String>) -> Result<impl Reply, Rejection> {
    let points: Vec<Position> = Vec::new();
    Ok(encode(accept, &points))
}

async fn post_position(
    auth_header: Option<String>,
    body: PositionReport,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let Some(auth) = &state.auth else {
        return Ok(warp::reply::json(&PositionAck { success: false, error: Some("auth not configured".to_string()) }));
    };
    let Some(token) = auth_header.and_then(|h| h.strip_prefix("Bearer ").map(str::to_string)) else {
        return Ok(warp::reply::json(&PositionAck { success: false, error: Some("missing bearer token".to_string()) }));
    };

    match auth.verify(&token, (state.now)()).await {
        Ok(_user) => {
            let position = Position { latitude: body.position.lat, longitude: body.position.lon, altitude: body.altitude };
            if !position.in_geographic_range() {
                return Ok(warp::reply::json(&PositionAck { success: false, error: Some("position out of range".to_string()) }));
            }
            let _ = (body.speed, body.climb, body.course, body.timestamp);
            Ok(warp::reply::json(&PositionAck { success: true, error: None }))
        }
        Err(e) => Ok(warp::reply::json(&PositionAck { success: false, error: Some(e.to_string()) })),
    }
}

#[derive(Debug)]
struct BadRequest(String);
impl warp::reject::Reject for BadRequest {}

pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let with_state = warp::any().map(move || state.clone());
    let accept_header = warp::header::optional::<String>("accept");
    let auth_header = warp::header::optional::<String>("authorization");

    let snapshot_route = warp::path!("api" / "v1" / "snapshot")
        .and(warp::get())
        .and(warp::query::<SnapshotQuery>())
        .and(accept_header.clone())
        .and(with_state.clone())
        .and_then(snapshot);

    let pilots_route = warp::path!("api" / "v1" / "pilots")
        .and(warp::get())
        .and(warp::query::<BoundsQuery>())
        .and(accept_header.clone())
        .and(with_state.clone())
        .and_then(pilots);

    let thermals_route = warp::path!("api" / "v1" / "thermals")
        .and(warp::get())
        .and(warp::query::<BoundsQuery>())
        .and(accept_header.clone())
        .and(with_state.clone())
        .and_then(thermals);

    let stations_route = warp::path!("api" / "v1" / "stations")
        .and(warp::get())
        .and(warp::query::<BoundsQuery>())
        .and(accept_header.clone())
        .and(with_state.clone())
        .and_then(stations);

    let track_route = warp::path!("api" / "v1" / "track" / String)
        .and(warp::get())
        .and(warp::query::<TrackQuery>())
        .and(accept_header.clone())
        .and_then(track);

    let position_route = warp::path!("api" / "v1" / "position")
        .and(warp::post())
        .and(auth_header)
        .and(warp::body::json())
        .and(with_state)
        .and_then(post_position);

    snapshot_route
        .or(pilots_route)
        .or(thermals_route)
        .or(stations_route)
        .or(track_route)
        .or(position_route)
        .recover(handle_rejection)
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(BadRequest(message)) = err.find() {
        (StatusCode::BAD_REQUEST, message.clone())
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "invalid request body".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorMessage { code: code.as_u16(), message }),
        code,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bounds_accepts_four_floats() {
        let bounds = parse_bounds("46.0,8.0,47.0,9.0").unwrap();
        assert_eq!(bounds.sw_lat, 46.0);
        assert_eq!(bounds.ne_lon, 9.0);
    }

    #[test]
    fn parse_bounds_rejects_malformed_input() {
        assert!(parse_bounds("46.0,8.0").is_none());
    }

    #[test]
    fn parse_aircraft_classes_accepts_csv() {
        let classes = parse_aircraft_classes("paraglider,glider");
        assert_eq!(classes, vec![AircraftClass::Paraglider, AircraftClass::Glider]);
    }

    #[test]
    fn parse_ground_classes_accepts_csv() {
        let classes = parse_ground_classes("distress,distress_auto");
        assert_eq!(classes, vec![GroundClass::Distress, GroundClass::DistressAuto]);
    }
}
