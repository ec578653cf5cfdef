//! ABI return-value decoding for the token-metadata job (§4.6b).

use etl_types::U256;
use sha3::{Digest, Keccak256};

/// ABI-encodes a call to the zero-argument function `signature` (e.g.
/// `"name()"`): its 4-byte selector, as `eth_call` calldata.
pub fn encode_call_data(signature: &str) -> String {
    let digest = Keccak256::digest(signature.as_bytes());
    format!("0x{}", hex::encode(&digest[..4]))
}

/// Decodes an ABI dynamic `string` return value: a 32-byte offset word
/// (ignored, always `0x20` for a single-return-value call), a 32-byte
/// length word, then the UTF-8 payload padded to a multiple of 32 bytes.
///
/// Some older tokens (e.g. the pre-standard MKR/DGD style contracts) return
/// a static `bytes32` instead of a dynamic `string`; when the dynamic
/// decode's declared length doesn't fit in the data actually returned, this
/// falls back to treating the whole 32-byte word as a right-padded
/// `bytes32` and trims trailing NUL bytes.
pub fn decode_string_return(data: &[u8]) -> Option<String> {
    if data.len() < 64 {
        return decode_bytes32_as_string(data);
    }

    let length = decode_uint_at(data, 32)? as usize;
    let payload_start = 64;
    let payload_end = payload_start.checked_add(length)?;

    if payload_end > data.len() {
        return decode_bytes32_as_string(data);
    }

    String::from_utf8(data[payload_start..payload_end].to_vec()).ok()
}

fn decode_bytes32_as_string(data: &[u8]) -> Option<String> {
    let word = data.get(0..32)?;
    let trimmed_end = word.iter().rposition(|byte| *byte != 0).map_or(0, |i| i + 1);
    let trimmed = &word[..trimmed_end];
    if trimmed.is_empty() {
        return None;
    }
    String::from_utf8(trimmed.to_vec()).ok()
}

/// Decodes a static `uint8` return value (`decimals()`).
pub fn decode_u8_return(data: &[u8]) -> Option<u8> {
    let value = decode_uint_at(data, 0)?;
    u8::try_from(value).ok()
}

/// Decodes a static `uint256` return value (`totalSupply()`).
pub fn decode_u256_return(data: &[u8]) -> Option<U256> {
    let word = data.get(0..32)?;
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(word);
    Some(U256::from_be_bytes(bytes))
}

/// Reads the low 8 bytes of the 32-byte word starting at `offset` as a
/// `u64`; used for the length/offset words of the dynamic `string` ABI
/// encoding, which never exceed `u64::MAX` in practice.
fn decode_uint_at(data: &[u8], offset: usize) -> Option<u64> {
    let word = data.get(offset..offset + 32)?;
    let low_bytes: [u8; 8] = word[24..32].try_into().ok()?;
    Some(u64::from_be_bytes(low_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abi_dynamic_string(value: &str) -> Vec<u8> {
        let mut data = vec![0u8; 32];
        data[31] = 0x20; // offset = 32

        let mut length_word = vec![0u8; 32];
        let length = value.len() as u64;
        length_word[24..32].copy_from_slice(&length.to_be_bytes());
        data.extend(length_word);

        let mut payload = value.as_bytes().to_vec();
        while payload.len() % 32 != 0 {
            payload.push(0);
        }
        data.extend(payload);
        data
    }

    #[test]
    fn decodes_dynamic_string_return() {
        let data = abi_dynamic_string("Wrapped Ether");
        assert_eq!(decode_string_return(&data).as_deref(), Some("Wrapped Ether"));
    }

    #[test]
    fn falls_back_to_bytes32_for_short_responses() {
        let mut data = vec![0u8; 32];
        data[0..3].copy_from_slice(b"DAI");
        assert_eq!(decode_string_return(&data).as_deref(), Some("DAI"));
    }

    #[test]
    fn decodes_decimals_and_total_supply() {
        let mut decimals_data = vec![0u8; 32];
        decimals_data[31] = 18;
        assert_eq!(decode_u8_return(&decimals_data), Some(18));

        let mut supply_data = vec![0u8; 32];
        supply_data[24..32].copy_from_slice(&1_000_000u64.to_be_bytes());
        assert_eq!(decode_u256_return(&supply_data), Some(U256::from(1_000_000u64)));
    }
}
