//! `RawBlock`/`RawTransaction` → `Block`/`Transaction`.

use etl_types::{
    entities::{Block, Transaction},
    hex::normalize_address,
    raw::{RawBlock, RawReceipt, RawTransaction},
};

use crate::error::{decode_bytes, decode_u256, decode_u64, MapperError, OptionExt};

/// Maps a block's own fields, leaving `transaction_count` derived from the
/// embedded `transactions` field.
pub fn map_block(raw: &RawBlock) -> Result<Block, MapperError> {
    let number = decode_u64(Some(&raw.number), "number")?.required("number")?;

    Ok(Block {
        number,
        hash: raw.hash.clone(),
        parent_hash: raw.parent_hash.clone(),
        nonce: raw.nonce.clone(),
        sha3_uncles: raw.sha3_uncles.clone(),
        logs_bloom: raw.logs_bloom.clone(),
        transactions_root: raw.transactions_root.clone(),
        state_root: raw.state_root.clone(),
        receipts_root: raw.receipts_root.clone(),
        miner: raw.miner.as_deref().and_then(|m| normalize_address(Some(m))),
        difficulty: decode_u256(raw.difficulty.as_deref(), "difficulty")?,
        total_difficulty: decode_u256(raw.total_difficulty.as_deref(), "totalDifficulty")?,
        size: decode_u64(raw.size.as_deref(), "size")?,
        extra_data: raw.extra_data.clone(),
        gas_limit: decode_u64(Some(&raw.gas_limit), "gasLimit")?.required("gasLimit")?,
        gas_used: decode_u64(Some(&raw.gas_used), "gasUsed")?.required("gasUsed")?,
        timestamp: decode_u64(Some(&raw.timestamp), "timestamp")?.required("timestamp")?,
        transaction_count: raw.transactions.hashes().len() as u64,
        base_fee_per_gas: decode_u256(raw.base_fee_per_gas.as_deref(), "baseFeePerGas")?,
    })
}

/// Maps a transaction embedded in a block, splicing in receipt fields when
/// `receipt` is `Some` (§4.2 step 3). The block's own `hash`/`number`/
/// `timestamp` are always trusted over whatever (possibly absent) block
/// fields the transaction JSON itself carries.
pub fn map_transaction(
    raw: &RawTransaction,
    block: &Block,
    transaction_index: u64,
    receipt: Option<&RawReceipt>,
) -> Result<Transaction, MapperError> {
    let mut transaction = Transaction {
        hash: raw.hash.clone(),
        nonce: decode_u64(Some(&raw.nonce), "nonce")?.required("nonce")?,
        transaction_index,
        from_address: normalize_address(raw.from.as_deref()),
        to_address: normalize_address(raw.to.as_deref()),
        value: decode_u256(Some(&raw.value), "value")?.required("value")?,
        gas: decode_u64(Some(&raw.gas), "gas")?.required("gas")?,
        gas_price: decode_u256(raw.gas_price.as_deref(), "gasPrice")?,
        input: decode_bytes(Some(&raw.input), "input")?.required("input")?,
        block_number: block.number,
        block_hash: block.hash.clone(),
        block_timestamp: block.timestamp,
        max_fee_per_gas: decode_u256(raw.max_fee_per_gas.as_deref(), "maxFeePerGas")?,
        max_priority_fee_per_gas: decode_u256(
            raw.max_priority_fee_per_gas.as_deref(),
            "maxPriorityFeePerGas",
        )?,
        transaction_type: decode_u64(raw.transaction_type.as_deref(), "type")?,
        receipt_cumulative_gas_used: None,
        receipt_gas_used: None,
        receipt_contract_address: None,
        receipt_root: None,
        receipt_status: None,
        receipt_effective_gas_price: None,
    };

    if let Some(receipt) = receipt {
        splice_receipt(&mut transaction, receipt)?;
    }

    Ok(transaction)
}

/// Fills in a transaction's `receipt_*` columns from its receipt. A `null`
/// receipt (edge case in §4.2) leaves every `receipt_*` field `None`.
pub fn splice_receipt(
    transaction: &mut Transaction,
    receipt: &RawReceipt,
) -> Result<(), MapperError> {
    transaction.receipt_cumulative_gas_used =
        decode_u64(Some(&receipt.cumulative_gas_used), "cumulativeGasUsed")?;
    transaction.receipt_gas_used = decode_u64(Some(&receipt.gas_used), "gasUsed")?;
    transaction.receipt_contract_address = normalize_address(receipt.contract_address.as_deref());
    transaction.receipt_root = receipt.root.clone();
    transaction.receipt_status = decode_u64(receipt.status.as_deref(), "status")?;
    transaction.receipt_effective_gas_price =
        decode_u256(receipt.effective_gas_price.as_deref(), "effectiveGasPrice")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_types::raw::RawBlockTransactions;

    fn sample_raw_block() -> RawBlock {
        RawBlock {
            number: "0xb443".to_string(),
            hash: "0xABCDEF0000000000000000000000000000000000000000000000000000ABCD"
                .to_string(),
            parent_hash: "0x0".to_string(),
            nonce: None,
            sha3_uncles: "0x0".to_string(),
            logs_bloom: None,
            transactions_root: "0x0".to_string(),
            state_root: "0x0".to_string(),
            receipts_root: "0x0".to_string(),
            miner: Some("0xAbCd000000000000000000000000000000001234".to_string()),
            difficulty: Some("0x1".to_string()),
            total_difficulty: Some("0x2".to_string()),
            size: Some("0x100".to_string()),
            extra_data: "0x".to_string(),
            gas_limit: "0x5208".to_string(),
            gas_used: "0x0".to_string(),
            timestamp: "0x5".to_string(),
            base_fee_per_gas: None,
            transactions: RawBlockTransactions::Hashes(vec!["0x1".to_string()]),
        }
    }

    #[test]
    fn maps_block_numerics_and_lowercases_miner() {
        let block = map_block(&sample_raw_block()).unwrap();
        assert_eq!(block.number, 46147);
        assert_eq!(block.transaction_count, 1);
        assert_eq!(
            block.miner.as_deref(),
            Some("0xabcd000000000000000000000000000000001234")
        );
    }

    #[test]
    fn null_receipt_leaves_receipt_fields_none() {
        let block = map_block(&sample_raw_block()).unwrap();
        let raw_tx = RawTransaction {
            hash: "0x1".to_string(),
            nonce: "0x0".to_string(),
            transaction_index: Some("0x0".to_string()),
            from: Some("0xaaaa000000000000000000000000000000000000".to_string()),
            to: None,
            value: "0x0".to_string(),
            gas: "0x5208".to_string(),
            gas_price: None,
            input: "0x".to_string(),
            block_number: None,
            block_hash: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            transaction_type: None,
        };

        let transaction = map_transaction(&raw_tx, &block, 0, None).unwrap();
        assert_eq!(transaction.receipt_status, None);
        assert_eq!(transaction.block_number, block.number);
        assert_eq!(transaction.block_hash, block.hash);
    }
}
