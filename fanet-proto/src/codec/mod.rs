//! The FANET wire codec (§4.1): an 8-byte receiver wrapper, a 4-byte
//! header + address, and a per-type payload with bit-packed, scaled
//! fields. Mechanical fields use `deku`; cross-byte scaled/signed fields
//! are decoded with explicit bit arithmetic, in the manner of
//! `rs1090::decode::cpr` and `rs1090::decode::flarm`.

mod air_ground;
mod error;
mod header;
mod name;
mod service;
mod thermal;
mod wrapper;

pub use error::CodecError;
pub use header::{Header, PacketType};
pub use wrapper::Wrapper;

use crate::model::{Address, Record, SignalQuality};

/// The result of decoding one wrapper + frame pair.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// A fully modeled record ready for validation and admission.
    Record(Record),
    /// A Type 2 (Name) update: applies to an already-tracked AirObject.
    Name(Address, String),
    /// A recognized-but-unmodeled packet type (Message, LandingMarker,
    /// RemoteConfig, Hardware, or a reserved code): parsed no further
    /// than the header, never forwarded.
    Unmodeled(PacketType),
}

/// Sign-extend a 24-bit two's complement integer into a 32-bit one.
/// §8: raw `0xFFFFFF` decodes to -1, raw `0x800000` to the most negative
/// value. This is a contract, not an optimization.
pub(crate) fn sign_extend_24(raw: u32) -> i32 {
    let raw = raw & 0x00FF_FFFF;
    if raw & 0x0080_0000 != 0 {
        (raw | 0xFF00_0000) as i32
    } else {
        raw as i32
    }
}

pub(crate) fn read_u24_le(bytes: &[u8]) -> u32 {
    bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16
}

/// Decode a signed 24-bit coordinate field into degrees.
pub(crate) fn decode_coordinate(bytes: &[u8], divisor: f64) -> f64 {
    sign_extend_24(read_u24_le(bytes)) as f64 / divisor
}

/// Sign-extend a 7-bit two's complement value (bit 6 is the sign bit).
pub(crate) fn sign_extend_7(bits: u8) -> i16 {
    let bits = (bits & 0x7F) as i16;
    if bits & 0x40 != 0 {
        bits - 128
    } else {
        bits
    }
}

/// Decode one wrapper + frame pair into its modeled record, if any.
pub fn decode(
    wrapper_bytes: &[u8],
    frame: &[u8],
    now: f64,
    sequence: u64,
) -> Result<DecodedFrame, CodecError> {
    let wrapper = Wrapper::parse(wrapper_bytes)?;
    let (header, payload) = Header::parse(frame)?;
    let signal = SignalQuality {
        rssi_dbm: wrapper.rssi_dbm,
        snr_db: wrapper.snr_db,
    };

    match header.packet_type {
        PacketType::AirTracking => Ok(DecodedFrame::Record(Record::AirObject(
            air_ground::decode_air(header.source, payload, signal, now, sequence)?,
        ))),
        PacketType::GroundTracking => Ok(DecodedFrame::Record(Record::GroundObject(
            air_ground::decode_ground(header.source, payload, signal, now, sequence)?,
        ))),
        PacketType::Name => {
            let name = name::decode(payload)?;
            Ok(DecodedFrame::Name(header.source, name))
        }
        PacketType::Service => Ok(DecodedFrame::Record(Record::WeatherStation(
            service::decode(header.source, payload, signal, now, sequence)?,
        ))),
        PacketType::Thermal => Ok(DecodedFrame::Record(Record::Thermal(thermal::decode(
            header.source,
            payload,
            signal,
            now,
            sequence,
        )?))),
        other => Ok(DecodedFrame::Unmodeled(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extension_boundary_cases() {
        assert_eq!(sign_extend_24(0x00FFFFFF), -1);
        assert_eq!(sign_extend_24(0x0080_0000), -8_388_608);
        assert_eq!(sign_extend_24(0x0000_0001), 1);
    }

    #[test]
    fn unmodeled_type_is_not_forwarded() {
        let wrapper = [0u8; 8];
        let frame = [0x03, 0x00, 0x00, 0x00];
        let decoded = decode(&wrapper, &frame, 0.0, 1).unwrap();
        assert_eq!(decoded, DecodedFrame::Unmodeled(PacketType::Message));
    }

    #[test]
    fn e1_air_tracking_frame() {
        let wrapper = [0u8; 8];
        let frame = hex::decode("012345678000008000000080808080").unwrap();
        let decoded = decode(&wrapper, &frame, 1_000.0, 7).unwrap();
        let DecodedFrame::Record(Record::AirObject(obj)) = decoded else {
            panic!("expected an AirObject");
        };
        assert_eq!(obj.address.as_key(), "674523");
        assert!((obj.position.latitude - 0.001_37).abs() < 1e-4);
        assert!((obj.position.longitude - 0.002_75).abs() < 1e-4);
        assert!(obj.online_tracking);
        assert_eq!(obj.ground_speed_kmh, 0.0);
        assert_eq!(obj.heading_deg, 180.0);
    }
}
