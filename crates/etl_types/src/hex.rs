//! Decoding helpers for the `0x`-prefixed hex strings every JSON-RPC method
//! returns, and address normalization.

use ethnum::U256;

/// Errors produced while decoding a `0x`-prefixed hex string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HexError {
    /// The string did not start with `0x`.
    #[error("hex string '{0}' is missing the 0x prefix")]
    MissingPrefix(String),
    /// The remainder after `0x` was not valid hex.
    #[error("'{0}' is not valid hex")]
    InvalidDigits(String),
    /// The decoded value does not fit in the target integer width.
    #[error("'{0}' overflows the target width")]
    Overflow(String),
}

fn strip_prefix(value: &str) -> Result<&str, HexError> {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| HexError::MissingPrefix(value.to_string()))
}

/// Decodes a `0x`-prefixed hex quantity into a `u64`. `None` maps to `None`.
pub fn decode_u64(value: Option<&str>) -> Result<Option<u64>, HexError> {
    let Some(value) = value else { return Ok(None) };
    let digits = strip_prefix(value)?;
    let digits = if digits.is_empty() { "0" } else { digits };
    u64::from_str_radix(digits, 16)
        .map(Some)
        .map_err(|_| HexError::Overflow(value.to_string()))
}

/// Decodes a `0x`-prefixed hex quantity into a [`U256`]. `None` maps to
/// `None`.
pub fn decode_u256(value: Option<&str>) -> Result<Option<U256>, HexError> {
    let Some(value) = value else { return Ok(None) };
    let digits = strip_prefix(value)?;
    let digits = if digits.is_empty() { "0" } else { digits };
    if digits.len() > 64 {
        return Err(HexError::Overflow(value.to_string()));
    }
    let padded = format!("{digits:0>64}");
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(&padded, &mut bytes)
        .map_err(|_| HexError::InvalidDigits(value.to_string()))?;
    Ok(Some(U256::from_be_bytes(bytes)))
}

/// Decodes a `0x`-prefixed hex byte string into raw bytes. `None` and `0x`
/// (empty) both map to an empty vector; a genuinely absent field should be
/// passed as `None`.
pub fn decode_bytes(value: Option<&str>) -> Result<Option<Vec<u8>>, HexError> {
    let Some(value) = value else { return Ok(None) };
    let digits = strip_prefix(value)?;
    let digits = if digits.len() % 2 == 1 {
        return Err(HexError::InvalidDigits(value.to_string()));
    } else {
        digits
    };
    hex::decode(digits)
        .map(Some)
        .map_err(|_| HexError::InvalidDigits(value.to_string()))
}

/// Encodes raw bytes as a `0x`-prefixed lowercase hex string.
pub fn encode_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Normalizes an address to its lowercase, `0x`-prefixed, 42-character form.
/// `None` and the empty string map to `None`; malformed addresses also map
/// to `None` rather than failing the caller, since upstream nodes
/// occasionally return an empty string instead of omitting the field.
pub fn normalize_address(value: Option<&str>) -> Option<String> {
    let value = value?;
    if value.is_empty() {
        return None;
    }
    let digits = strip_prefix(value).ok()?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", digits.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_u64() {
        assert_eq!(decode_u64(Some("0xb443")).unwrap(), Some(46147));
        assert_eq!(decode_u64(Some("0x0")).unwrap(), Some(0));
        assert_eq!(decode_u64(None).unwrap(), None);
    }

    #[test]
    fn rejects_missing_prefix() {
        assert_eq!(
            decode_u64(Some("b443")),
            Err(HexError::MissingPrefix("b443".to_string()))
        );
    }

    #[test]
    fn decode_u64_is_identity_over_round_trip() {
        for value in [0u64, 1, 46147, u64::MAX] {
            let encoded = format!("0x{value:x}");
            assert_eq!(decode_u64(Some(&encoded)).unwrap(), Some(value));
        }
    }

    #[test]
    fn decodes_u256() {
        assert_eq!(
            decode_u256(Some("0x1bc16d674ec80000")).unwrap(),
            Some(U256::from(2_000_000_000_000_000_000u128))
        );
    }

    #[test]
    fn decodes_bytes_including_empty() {
        assert_eq!(decode_bytes(Some("0x")).unwrap(), Some(Vec::new()));
        assert_eq!(decode_bytes(Some("0xdeadbeef")).unwrap(), Some(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(decode_bytes(None).unwrap(), None);
    }

    #[test]
    fn normalizes_address_case_and_rejects_malformed() {
        assert_eq!(
            normalize_address(Some("0xAbCd000000000000000000000000000000001234")),
            Some("0xabcd000000000000000000000000000000001234".to_string())
        );
        assert_eq!(normalize_address(Some("")), None);
        assert_eq!(normalize_address(None), None);
        assert_eq!(normalize_address(Some("0xnothex")), None);
    }

    #[test]
    fn every_normalized_address_matches_expected_shape() {
        let inputs = [
            "0x0000000000000000000000000000000000000000",
            "0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF",
        ];
        for input in inputs {
            let normalized = normalize_address(Some(input)).unwrap();
            assert_eq!(normalized.len(), 42);
            assert!(normalized.starts_with("0x"));
            assert!(normalized[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }
}
