//! Shared helpers for the hex strings returned by EVM JSON-RPC endpoints
use thiserror::Error;

/// Hex chars of an address stored in the low 20 bytes of a 32-byte word
pub const ADDRESS_HEX_LEN: usize = 40;

#[derive(Debug, Error, PartialEq)]
pub enum HexValueError {
    #[error("empty hex value")]
    Empty,

    #[error("invalid hex value: {0}")]
    Invalid(String),

    #[error("hex value does not fit in 128 bits: {0}")]
    Overflow(String),
}

pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Parse a `0x`-prefixed (or bare) hex quantity into a u128
pub fn parse_hex_u128(value: &str) -> Result<u128, HexValueError> {
    let digits = strip_hex_prefix(value.trim());
    if digits.is_empty() {
        return Err(HexValueError::Empty);
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HexValueError::Invalid(value.to_string()));
    }
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() > 32 {
        return Err(HexValueError::Overflow(value.to_string()));
    }
    u128::from_str_radix(significant, 16).map_err(|_| HexValueError::Invalid(value.to_string()))
}

pub fn parse_hex_u64(value: &str) -> Result<u64, HexValueError> {
    let parsed = parse_hex_u128(value)?;
    u64::try_from(parsed).map_err(|_| HexValueError::Overflow(value.to_string()))
}

/// Low 20 bytes of a 32-byte topic, as 40 hex chars with no prefix and casing untouched
pub fn address_from_topic(topic: &str) -> Option<&str> {
    let digits = strip_hex_prefix(topic);
    if digits.len() < ADDRESS_HEX_LEN || !digits.is_ascii() {
        return None;
    }
    let address = &digits[digits.len() - ADDRESS_HEX_LEN..];
    address
        .chars()
        .all(|c| c.is_ascii_hexdigit())
        .then_some(address)
}

/// Create a preview string for error logging (truncates long responses)
pub fn create_error_preview(response: &str, max_len: usize) -> String {
    match response.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &response[..idx]),
        None => response.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u128() {
        assert_eq!(parse_hex_u128("0x5"), Ok(5));
        assert_eq!(parse_hex_u128("0x0000000000000000000000000000000000000000000000000000000000000064"), Ok(100));
        assert_eq!(parse_hex_u128("ff"), Ok(255));
        assert_eq!(parse_hex_u128("0x000"), Ok(0));
        assert_eq!(parse_hex_u128("0x"), Err(HexValueError::Empty));
        assert!(matches!(parse_hex_u128("0xzz"), Err(HexValueError::Invalid(_))));
        assert!(matches!(
            parse_hex_u128("0x1ffffffffffffffffffffffffffffffff"),
            Err(HexValueError::Overflow(_))
        ));
    }

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0x1b4"), Ok(436));
        assert!(matches!(
            parse_hex_u64("0x10000000000000000"),
            Err(HexValueError::Overflow(_))
        ));
    }

    #[test]
    fn test_address_from_topic_keeps_low_20_bytes() {
        let topic = "0x000000000000000000000000AbCdEf0000000000000000000000000000000001";
        assert_eq!(
            address_from_topic(topic),
            Some("AbCdEf0000000000000000000000000000000001")
        );
    }

    #[test]
    fn test_address_from_topic_rejects_short_or_invalid() {
        assert_eq!(address_from_topic("0x1234"), None);
        assert_eq!(
            address_from_topic("0x00000000000000000000000000000000000000000000000000000000000000zz"),
            None
        );
    }

    #[test]
    fn test_create_error_preview() {
        assert_eq!(create_error_preview("abcdef", 3), "abc...");
        assert_eq!(create_error_preview("abc", 10), "abc");
    }
}
