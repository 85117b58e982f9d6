use deku::prelude::*;

use super::error::CodecError;

/// The fixed 8-byte receiver wrapper that precedes every FANET frame:
/// reception timestamp and radio signal quality. Mirrors the way
/// `rs1090`'s `Flarm` wrapper reads a fixed little-endian header ahead of
/// a variable payload.
#[derive(Debug, Clone, Copy, PartialEq, DekuRead)]
#[deku(endian = "little")]
pub struct Wrapper {
    pub timestamp: u32,
    pub rssi_dbm: i16,
    pub snr_db: i16,
}

impl Wrapper {
    pub fn parse(bytes: &[u8]) -> Result<Wrapper, CodecError> {
        if bytes.len() != 8 {
            return Err(CodecError::TruncatedWrapper { len: bytes.len() });
        }
        let (_, wrapper) = Wrapper::from_bytes((bytes, 0))
            .map_err(|_| CodecError::TruncatedWrapper { len: bytes.len() })?;
        Ok(wrapper)
    }
}
