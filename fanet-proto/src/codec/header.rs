use crate::model::Address;

use super::error::CodecError;

/// FANET's 6-bit packet type field (byte 0, bits 5-0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    AirTracking,
    Name,
    Message,
    Service,
    LandingMarker,
    RemoteConfig,
    GroundTracking,
    Hardware,
    Thermal,
    /// A recognized-but-unmodeled type: parsed only as far as the header,
    /// never forwarded to the rest of the system.
    Other(u8),
}

impl PacketType {
    fn from_code(code: u8) -> PacketType {
        match code {
            1 => PacketType::AirTracking,
            2 => PacketType::Name,
            3 => PacketType::Message,
            4 => PacketType::Service,
            5 => PacketType::LandingMarker,
            6 => PacketType::RemoteConfig,
            7 => PacketType::GroundTracking,
            8 => PacketType::Hardware,
            9 => PacketType::Thermal,
            other => PacketType::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub extended: bool,
    pub forward: bool,
    pub packet_type: PacketType,
    pub source: Address,
}

impl Header {
    /// Parses byte 0 (flags + type) and bytes 1-3 (24-bit LE address).
    /// Returns the header and the remaining payload slice.
    pub fn parse(frame: &[u8]) -> Result<(Header, &[u8]), CodecError> {
        if frame.len() < 4 {
            return Err(CodecError::TruncatedHeader { len: frame.len() });
        }
        let flags = frame[0];
        let extended = flags & 0x80 != 0;
        let forward = flags & 0x40 != 0;
        let packet_type = PacketType::from_code(flags & 0x3F);
        let source = Address::new(
            frame[1] as u32 | (frame[2] as u32) << 8 | (frame[3] as u32) << 16,
        );
        Ok((
            Header {
                extended,
                forward,
                packet_type,
                source,
            },
            &frame[4..],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_and_address() {
        let frame = [0x01, 0x23, 0x45, 0x67];
        let (header, rest) = Header::parse(&frame).unwrap();
        assert_eq!(header.packet_type, PacketType::AirTracking);
        assert!(!header.extended);
        assert!(!header.forward);
        assert_eq!(header.source.as_key(), "674523");
        assert!(rest.is_empty());
    }

    #[test]
    fn reads_extended_and_forward_flags() {
        let frame = [0xC7, 0x00, 0x00, 0x00];
        let (header, _) = Header::parse(&frame).unwrap();
        assert!(header.extended);
        assert!(header.forward);
        assert_eq!(header.packet_type, PacketType::GroundTracking);
    }

    #[test]
    fn unrecognized_type_is_other() {
        let frame = [0x00, 0x00, 0x00, 0x00];
        let (header, _) = Header::parse(&frame).unwrap();
        assert_eq!(header.packet_type, PacketType::Other(0));
    }

    #[test]
    fn rejects_short_frame() {
        assert_eq!(
            Header::parse(&[0x01, 0x02]),
            Err(CodecError::TruncatedHeader { len: 2 })
        );
    }
}
