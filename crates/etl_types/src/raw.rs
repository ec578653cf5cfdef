//! JSON-RPC response shapes, deserialized straight off the wire. Every
//! numeric/byte field is still a hex string here; `etl_mappers` decodes
//! them into `etl_types::entities`.

use serde::Deserialize;

/// The `transactions` field of a block, which is either a list of hashes
/// (`full_tx=false`) or a list of full transaction objects (`full_tx=true`).
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawBlockTransactions {
    Hashes(Vec<String>),
    Full(Vec<RawTransaction>),
}

impl RawBlockTransactions {
    pub fn hashes(&self) -> Vec<String> {
        match self {
            RawBlockTransactions::Hashes(hashes) => hashes.clone(),
            RawBlockTransactions::Full(transactions) => {
                transactions.iter().map(|tx| tx.hash.clone()).collect()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawBlockTransactions::Hashes(hashes) => hashes.is_empty(),
            RawBlockTransactions::Full(transactions) => transactions.is_empty(),
        }
    }
}

/// The response of `eth_getBlockByNumber`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    #[serde(default)]
    pub nonce: Option<String>,
    pub sha3_uncles: String,
    #[serde(default)]
    pub logs_bloom: Option<String>,
    pub transactions_root: String,
    pub state_root: String,
    pub receipts_root: String,
    #[serde(default)]
    pub miner: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub total_difficulty: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub extra_data: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub timestamp: String,
    #[serde(default)]
    pub base_fee_per_gas: Option<String>,
    pub transactions: RawBlockTransactions,
}

/// A transaction as embedded in a full block, or as returned standalone.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: String,
    pub nonce: String,
    pub transaction_index: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    pub value: String,
    pub gas: String,
    #[serde(default)]
    pub gas_price: Option<String>,
    pub input: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub max_fee_per_gas: Option<String>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(rename = "type", default)]
    pub transaction_type: Option<String>,
}

/// The response of `eth_getTransactionReceipt`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: String,
    pub transaction_index: String,
    pub block_hash: String,
    pub block_number: String,
    pub cumulative_gas_used: String,
    pub gas_used: String,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub effective_gas_price: Option<String>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

/// A single entry of a receipt's `logs` array, or an `eth_getLogs` result.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub log_index: String,
    pub transaction_hash: String,
    pub transaction_index: String,
    #[serde(default)]
    pub address: Option<String>,
    pub data: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

/// One frame of a `debug_traceBlockByNumber` `callTracer` response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCallFrame {
    #[serde(rename = "type")]
    pub call_type: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub calls: Vec<RawCallFrame>,
}

/// One entry of the array `debug_traceBlockByNumber` returns: one call tree
/// per transaction in the block, in transaction order.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTraceResult {
    #[serde(default)]
    pub tx_hash: Option<String>,
    pub result: RawCallFrame,
}
