use super::error::CodecError;

const MAX_NAME_BYTES: usize = 20;

/// Type 2 (Name): a UTF-8 name, up to 20 bytes, applied to an
/// already-tracked AirObject rather than modeled as its own record.
pub(super) fn decode(payload: &[u8]) -> Result<String, CodecError> {
    let truncated = &payload[..payload.len().min(MAX_NAME_BYTES)];
    std::str::from_utf8(truncated)
        .map(|s| s.trim_end_matches('\0').to_string())
        .map_err(|_| CodecError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_name() {
        assert_eq!(decode(b"Glider 42").unwrap(), "Glider 42");
    }

    #[test]
    fn truncates_past_twenty_bytes() {
        let long = "x".repeat(30);
        let decoded = decode(long.as_bytes()).unwrap();
        assert_eq!(decoded.len(), MAX_NAME_BYTES);
    }

    #[test]
    fn strips_trailing_nul_padding() {
        let mut bytes = b"ABC".to_vec();
        bytes.extend_from_slice(&[0u8; 5]);
        assert_eq!(decode(&bytes).unwrap(), "ABC");
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(matches!(decode(&[0xFF, 0xFE]), Err(CodecError::InvalidUtf8)));
    }
}
