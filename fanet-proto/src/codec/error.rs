use thiserror::Error;

/// Failure modes for decoding a wrapper + FANET frame (§7 codec category).
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("wrapper is {len} bytes, expected 8")]
    TruncatedWrapper { len: usize },

    #[error("frame is {len} bytes, too short for a header and address")]
    TruncatedHeader { len: usize },

    #[error("frame declares type {packet_type} but payload is {len} bytes, expected at least {expected}")]
    TruncatedPayload {
        packet_type: u8,
        len: usize,
        expected: usize,
    },

    #[error("coordinate out of range: {value}")]
    CoordinateOutOfRange { value: f64 },

    #[error("{field} value {value} outside its documented domain")]
    FieldOutOfDomain { field: &'static str, value: f64 },

    #[error("name payload is not valid UTF-8")]
    InvalidUtf8,
}
