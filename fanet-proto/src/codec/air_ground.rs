use crate::model::{
    Address, AirObject, AircraftClass, GroundClass, GroundObject, Position, SignalQuality,
};

use super::error::CodecError;
use super::{decode_coordinate, sign_extend_7};

const PAYLOAD_LEN: usize = 11;

struct Common {
    position: Position,
    class_bits: u8,
    online: bool,
    ground_speed_kmh: f64,
    vertical_speed_ms: f64,
    heading_deg: f64,
}

fn decode_common(payload: &[u8]) -> Result<Common, CodecError> {
    if payload.len() < PAYLOAD_LEN {
        return Err(CodecError::TruncatedPayload {
            packet_type: 1,
            len: payload.len(),
            expected: PAYLOAD_LEN,
        });
    }

    let latitude = decode_coordinate(&payload[0..3], 93206.0);
    let longitude = decode_coordinate(&payload[3..6], 46603.0);

    // alt_status is assembled little-endian, consistent with every other
    // multi-byte field on the wire.
    let alt_status = payload[6] as u16 | (payload[7] as u16) << 8;
    let online = alt_status & 0x8000 != 0;
    let class_bits = ((alt_status >> 12) & 0x07) as u8;
    let alt_scaler = alt_status & 0x0800 != 0;
    let alt_raw = alt_status & 0x07FF;
    let altitude = alt_raw as f64 * if alt_scaler { 4.0 } else { 1.0 };

    let speed_byte = payload[8];
    let speed_scaler = speed_byte & 0x80 != 0;
    let speed_raw = speed_byte & 0x7F;
    let ground_speed_kmh = speed_raw as f64 * 0.5 * if speed_scaler { 5.0 } else { 1.0 };

    let climb_byte = payload[9];
    let climb_scaler = climb_byte & 0x80 != 0;
    let climb_raw = sign_extend_7(climb_byte);
    let vertical_speed_ms = climb_raw as f64 * 0.1 * if climb_scaler { 5.0 } else { 1.0 };

    let heading_byte = payload[10];
    let heading_deg = heading_byte as f64 * 360.0 / 256.0;

    Ok(Common {
        position: Position {
            latitude,
            longitude,
            altitude,
        },
        class_bits,
        online,
        ground_speed_kmh,
        vertical_speed_ms,
        heading_deg,
    })
}

pub(super) fn decode_air(
    address: Address,
    payload: &[u8],
    signal: SignalQuality,
    now: f64,
    sequence: u64,
) -> Result<AirObject, CodecError> {
    let c = decode_common(payload)?;
    Ok(AirObject {
        address,
        position: c.position,
        last_update: now,
        signal,
        sequence,
        class: AircraftClass::from_bits(c.class_bits),
        ground_speed_kmh: c.ground_speed_kmh,
        vertical_speed_ms: c.vertical_speed_ms,
        heading_deg: c.heading_deg,
        online_tracking: c.online,
        name: None,
    })
}

/// Ground Tracking (type 7) shares the Air Tracking byte layout, so the
/// 3-bit class subfield can only address `GroundClass` values 0-7 (`Other`
/// through `NeedTechnical`); `NeedMedical`/`Distress`/`DistressAuto` are
/// never produced directly from a decoded frame. `GroundClass::from_bits`
/// still accepts the full 4-bit range for callers outside the codec (e.g.
/// the validator's sticky-distress rule).
pub(super) fn decode_ground(
    address: Address,
    payload: &[u8],
    signal: SignalQuality,
    now: f64,
    sequence: u64,
) -> Result<GroundObject, CodecError> {
    let c = decode_common(payload)?;
    Ok(GroundObject {
        address,
        position: c.position,
        last_update: now,
        signal,
        sequence,
        class: GroundClass::from_bits(c.class_bits),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal() -> SignalQuality {
        SignalQuality {
            rssi_dbm: -70,
            snr_db: 8,
        }
    }

    #[test]
    fn altitude_scaler_quadruples_raw_value() {
        // bit15 online, bits14-12 class=0, bit11 scaler=1, bits10-0=2047
        let alt_status: u16 = 0x8000 | 0x0800 | 2047;
        let payload = [
            0, 0, 0, 0, 0, 0, (alt_status & 0xFF) as u8, (alt_status >> 8) as u8, 0, 0, 0,
        ];
        let obj = decode_air(Address::new(1), &payload, signal(), 0.0, 1).unwrap();
        assert_eq!(obj.position.altitude, 8188.0);
    }

    #[test]
    fn climb_seven_bit_signed_value_with_scaler() {
        // bit7 scaler=1, bits6-0 = 0b1000000 = 64 -> signed -64
        let payload = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0xC0, 0];
        let obj = decode_air(Address::new(1), &payload, signal(), 0.0, 1).unwrap();
        assert_eq!(obj.vertical_speed_ms, -32.0);
    }

    #[test]
    fn heading_byte_scales_to_degrees() {
        let payload = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x80];
        let obj = decode_air(Address::new(1), &payload, signal(), 0.0, 1).unwrap();
        assert_eq!(obj.heading_deg, 180.0);
    }

    #[test]
    fn ground_tracking_reads_class_from_same_layout() {
        let alt_status: u16 = (2u16 << 12) | 100;
        let payload = [
            0, 0, 0, 0, 0, 0, (alt_status & 0xFF) as u8, (alt_status >> 8) as u8, 0, 0, 0,
        ];
        let obj = decode_ground(Address::new(2), &payload, signal(), 0.0, 1).unwrap();
        assert_eq!(obj.class, GroundClass::Vehicle);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let err = decode_air(Address::new(1), &[0u8; 5], signal(), 0.0, 1).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedPayload { .. }));
    }
}
