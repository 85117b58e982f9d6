use crate::model::{Address, Position, SignalQuality, WeatherStation};

use super::error::CodecError;
use super::decode_coordinate;

const FLAG_TEMPERATURE: u8 = 1 << 6;
const FLAG_WIND: u8 = 1 << 5;
const FLAG_HUMIDITY: u8 = 1 << 4;
const FLAG_PRESSURE: u8 = 1 << 3;
const FLAG_BATTERY: u8 = 1 << 1;

const PACKET_TYPE: u8 = 4;

/// Type 4 (Service). The flag byte's set bits select which fixed-width
/// fields follow, in declaration order, after the two coordinates.
///
/// The wind triple's exact byte assignment is undocumented upstream; this
/// reads byte 0 as direction (`*360/256`), byte 1 as sustained speed and
/// byte 2 as gust speed, both in 0.2 m/s units — the layout that keeps all
/// three values within their plausible physical range for a ground
/// station anemometer.
pub(super) fn decode(
    address: Address,
    payload: &[u8],
    signal: SignalQuality,
    now: f64,
    sequence: u64,
) -> Result<WeatherStation, CodecError> {
    if payload.len() < 7 {
        return Err(CodecError::TruncatedPayload {
            packet_type: PACKET_TYPE,
            len: payload.len(),
            expected: 7,
        });
    }
    let flags = payload[0];
    let latitude = decode_coordinate(&payload[1..4], 93206.0);
    let longitude = decode_coordinate(&payload[4..7], 46603.0);

    let mut cursor = 7usize;
    let mut take = |n: usize| -> Result<&[u8], CodecError> {
        let end = cursor + n;
        let slice = payload.get(cursor..end).ok_or(CodecError::TruncatedPayload {
            packet_type: PACKET_TYPE,
            len: payload.len(),
            expected: end,
        })?;
        cursor = end;
        Ok(slice)
    };

    let temperature_c = if flags & FLAG_TEMPERATURE != 0 {
        let b = take(1)?[0] as i8;
        Some(b as f64 / 2.0)
    } else {
        None
    };

    let (wind_direction_deg, wind_speed_ms, wind_gusts_ms) = if flags & FLAG_WIND != 0 {
        let b = take(3)?;
        let direction = b[0] as f64 * 360.0 / 256.0;
        let speed = b[1] as f64 * 0.2;
        let gust = b[2] as f64 * 0.2;
        (Some(direction), Some(speed), Some(gust))
    } else {
        (None, None, None)
    };

    let humidity_pct = if flags & FLAG_HUMIDITY != 0 {
        let b = take(1)?[0];
        Some(b as f64 / 4.0)
    } else {
        None
    };

    let pressure_hpa = if flags & FLAG_PRESSURE != 0 {
        let b = take(2)?;
        let raw = b[0] as u16 | (b[1] as u16) << 8;
        Some(raw as f64 / 10.0 + 430.0)
    } else {
        None
    };

    let battery_pct = if flags & FLAG_BATTERY != 0 {
        let b = take(1)?[0];
        Some((b & 0x0F) as f64 * (100.0 / 15.0))
    } else {
        None
    };

    Ok(WeatherStation {
        address,
        // Type 4 carries no altitude field; ground stations are assumed
        // sea-level reference unless corrected by an external fix.
        position: Position {
            latitude,
            longitude,
            altitude: 0.0,
        },
        last_update: now,
        signal,
        sequence,
        temperature_c,
        wind_direction_deg,
        wind_speed_ms,
        wind_gusts_ms,
        humidity_pct,
        pressure_hpa,
        battery_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal() -> SignalQuality {
        SignalQuality {
            rssi_dbm: -90,
            snr_db: 3,
        }
    }

    #[test]
    fn decodes_with_no_optional_fields() {
        let payload = [0u8, 0, 0, 0, 0, 0, 0];
        let station = decode(Address::new(1), &payload, signal(), 0.0, 1).unwrap();
        assert_eq!(station.temperature_c, None);
        assert_eq!(station.wind_speed_ms, None);
        assert_eq!(station.battery_pct, None);
    }

    #[test]
    fn decodes_temperature_and_battery() {
        let flags = FLAG_TEMPERATURE | FLAG_BATTERY;
        // 21.5C * 2 = 43; battery nibble 15 -> 100%
        let payload = [flags, 0, 0, 0, 0, 0, 0, 43u8, 0x0F];
        let station = decode(Address::new(1), &payload, signal(), 0.0, 1).unwrap();
        assert_eq!(station.temperature_c, Some(21.5));
        assert_eq!(station.battery_pct, Some(100.0));
    }

    #[test]
    fn decodes_pressure_little_endian() {
        let flags = FLAG_PRESSURE;
        // (1013.25 - 430) * 10 = 5832.5 -> 5833 raw
        let raw: u16 = 5833;
        let payload = [flags, 0, 0, 0, 0, 0, 0, (raw & 0xFF) as u8, (raw >> 8) as u8];
        let station = decode(Address::new(1), &payload, signal(), 0.0, 1).unwrap();
        assert!((station.pressure_hpa.unwrap() - 1013.3).abs() < 0.1);
    }

    #[test]
    fn rejects_truncated_flagged_field() {
        let flags = FLAG_WIND;
        let payload = [flags, 0, 0, 0, 0, 0, 0, 1, 2];
        let err = decode(Address::new(1), &payload, signal(), 0.0, 1).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedPayload { .. }));
    }
}
