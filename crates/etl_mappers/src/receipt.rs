//! `RawReceipt`/`RawLog` → `Receipt`/`Log`.

use etl_types::{
    entities::{Log, Receipt, Topics},
    hex::normalize_address,
    raw::{RawLog, RawReceipt},
};

use crate::error::{decode_bytes, decode_u256, decode_u64, MapperError, OptionExt};

/// Maps a receipt, including its embedded `logs` array. The receipts+logs
/// job consumes `Receipt::logs` to emit individual `Log` items and then
/// drops it (§4.3).
pub fn map_receipt(raw: &RawReceipt) -> Result<Receipt, MapperError> {
    let logs = raw
        .logs
        .iter()
        .map(map_log)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Receipt {
        transaction_hash: raw.transaction_hash.clone(),
        transaction_index: decode_u64(Some(&raw.transaction_index), "transactionIndex")?
            .required("transactionIndex")?,
        block_hash: raw.block_hash.clone(),
        block_number: decode_u64(Some(&raw.block_number), "blockNumber")?
            .required("blockNumber")?,
        cumulative_gas_used: decode_u64(Some(&raw.cumulative_gas_used), "cumulativeGasUsed")?
            .required("cumulativeGasUsed")?,
        gas_used: decode_u64(Some(&raw.gas_used), "gasUsed")?.required("gasUsed")?,
        contract_address: normalize_address(raw.contract_address.as_deref()),
        root: raw.root.clone(),
        status: decode_u64(raw.status.as_deref(), "status")?,
        effective_gas_price: decode_u256(raw.effective_gas_price.as_deref(), "effectiveGasPrice")?,
        logs,
    })
}

/// Maps a single log entry. `block_timestamp` is left at `0` here; the
/// receipts+logs job fills it in once the parent block's timestamp is
/// known, and `etl_bus::enrich` corrects any log emitted outside that job
/// (e.g. via `eth_getLogs`).
fn map_log(raw: &RawLog) -> Result<Log, MapperError> {
    Ok(Log {
        log_index: decode_u64(Some(&raw.log_index), "logIndex")?.required("logIndex")?,
        transaction_hash: raw.transaction_hash.clone(),
        transaction_index: decode_u64(Some(&raw.transaction_index), "transactionIndex")?
            .required("transactionIndex")?,
        address: normalize_address(raw.address.as_deref()),
        data: decode_bytes(Some(&raw.data), "data")?.required("data")?,
        topics: Topics(raw.topics.clone()),
        block_timestamp: 0,
        block_number: decode_u64(raw.block_number.as_deref(), "blockNumber")?.unwrap_or(0),
        block_hash: raw.block_hash.clone().unwrap_or_default(),
    })
}
