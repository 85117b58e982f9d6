use crate::model::{Address, Position, SignalQuality, Thermal};

use super::error::CodecError;
use super::decode_coordinate;

const PACKET_TYPE: u8 = 9;
const PAYLOAD_LEN: usize = 15;

/// Type 9 (Thermal). Unlike Air/Ground Tracking, altitude and the wind
/// fields here are plain unscaled little-endian integers, not packed
/// bitfields.
pub(super) fn decode(
    address: Address,
    payload: &[u8],
    signal: SignalQuality,
    now: f64,
    sequence: u64,
) -> Result<Thermal, CodecError> {
    if payload.len() < PAYLOAD_LEN {
        return Err(CodecError::TruncatedPayload {
            packet_type: PACKET_TYPE,
            len: payload.len(),
            expected: PAYLOAD_LEN,
        });
    }

    let latitude = decode_coordinate(&payload[0..3], 93206.0);
    let longitude = decode_coordinate(&payload[3..6], 46603.0);
    let altitude = (payload[6] as u16 | (payload[7] as u16) << 8) as f64;
    let quality = payload[8];
    let avg_climb_raw = (payload[9] as u16 | (payload[10] as u16) << 8) as i16;
    let average_climb_ms = avg_climb_raw as f64 * 0.01;
    let wind_speed_raw = payload[11] as u16 | (payload[12] as u16) << 8;
    let wind_speed_ms = wind_speed_raw as f64 * 0.01;
    let wind_heading_raw = payload[13] as u16 | (payload[14] as u16) << 8;
    let wind_direction_deg = wind_heading_raw as f64 / 182.0;

    Ok(Thermal {
        address,
        discovered_at: now,
        position: Position {
            latitude,
            longitude,
            altitude,
        },
        last_update: now,
        signal,
        sequence,
        quality,
        average_climb_ms,
        wind_speed_ms,
        wind_direction_deg,
    })
}
