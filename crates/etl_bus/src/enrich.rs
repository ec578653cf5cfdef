//! In-process joins that project block-level fields onto entities produced
//! without them (§4.3, §4.6, GLOSSARY: Enrichment).

use std::collections::HashMap;

use etl_types::entities::{Block, Contract, Log, TokenTransfer};

/// A lookup from `block_number` to the block's `(hash, timestamp)`, built
/// once per partition from the Blocks+Transactions job's output and reused
/// by every later enrichment join (§4.3, §4.6, §9 "build a map ... once per
/// partition").
pub struct BlockIndex {
    by_number: HashMap<u64, (String, u64)>,
}

impl BlockIndex {
    /// Builds the index from every `Block` item collected so far.
    pub fn build<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Self {
        let by_number = blocks
            .into_iter()
            .map(|block| (block.number, (block.hash.clone(), block.timestamp)))
            .collect();
        BlockIndex { by_number }
    }

    /// The `(hash, timestamp)` of the block numbered `block_number`, if
    /// known.
    pub fn lookup(&self, block_number: u64) -> Option<(&str, u64)> {
        self.by_number
            .get(&block_number)
            .map(|(hash, timestamp)| (hash.as_str(), *timestamp))
    }
}

/// Fills in `block_hash`/`block_timestamp` on every log by joining on
/// `block_number`. Logs whose block is unknown are dropped and counted
/// (§4.3) — the returned count is the number of dropped logs.
pub fn enrich_logs(logs: Vec<Log>, blocks: &BlockIndex) -> (Vec<Log>, usize) {
    let mut enriched = Vec::with_capacity(logs.len());
    let mut dropped = 0;

    for mut log in logs {
        match blocks.lookup(log.block_number) {
            Some((hash, timestamp)) => {
                log.block_hash = hash.to_string();
                log.block_timestamp = timestamp;
                enriched.push(log);
            }
            None => {
                tracing::warn!(block_number = log.block_number, "dropping log with unknown block");
                dropped += 1;
            }
        }
    }

    (enriched, dropped)
}

/// Fills in `block_hash`/`block_timestamp` on every token transfer, the
/// same way [`enrich_logs`] does for logs (§4.4 emits transfers with a
/// block number already known from the `eth_getLogs` filter, but not yet
/// the hash/timestamp).
pub fn enrich_token_transfers(
    transfers: Vec<TokenTransfer>,
    blocks: &BlockIndex,
) -> (Vec<TokenTransfer>, usize) {
    let mut enriched = Vec::with_capacity(transfers.len());
    let mut dropped = 0;

    for mut transfer in transfers {
        match blocks.lookup(transfer.block_number) {
            Some((hash, timestamp)) => {
                transfer.block_hash = hash.to_string();
                transfer.block_timestamp = timestamp;
                enriched.push(transfer);
            }
            None => {
                tracing::warn!(
                    block_number = transfer.block_number,
                    "dropping token transfer with unknown block"
                );
                dropped += 1;
            }
        }
    }

    (enriched, dropped)
}

/// Fills in `block_hash`/`block_timestamp` on every contract (§4.6, final
/// step). Contracts are never dropped here: both extraction modes already
/// derive `block_number` from data the RPC node itself vouched for (a trace
/// or a receipt) within the requested range, so an unknown block would
/// indicate a malformed response rather than a legitimate gap.
pub fn enrich_contracts(contracts: Vec<Contract>, blocks: &BlockIndex) -> Vec<Contract> {
    contracts
        .into_iter()
        .map(|mut contract| {
            if let Some((hash, timestamp)) = blocks.lookup(contract.block_number) {
                contract.block_hash = hash.to_string();
                contract.block_timestamp = timestamp;
            }
            contract
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use etl_types::entities::Topics;

    use super::*;

    fn sample_block(number: u64, hash: &str, timestamp: u64) -> Block {
        Block {
            number,
            hash: hash.to_string(),
            parent_hash: "0x0".to_string(),
            nonce: None,
            sha3_uncles: "0x0".to_string(),
            logs_bloom: None,
            transactions_root: "0x0".to_string(),
            state_root: "0x0".to_string(),
            receipts_root: "0x0".to_string(),
            miner: None,
            difficulty: None,
            total_difficulty: None,
            size: None,
            extra_data: "0x".to_string(),
            gas_limit: 0,
            gas_used: 0,
            timestamp,
            transaction_count: 0,
            base_fee_per_gas: None,
        }
    }

    fn sample_log(block_number: u64) -> Log {
        Log {
            log_index: 0,
            transaction_hash: "0xaa".to_string(),
            transaction_index: 0,
            address: None,
            data: vec![],
            topics: Topics::default(),
            block_timestamp: 0,
            block_number,
            block_hash: String::new(),
        }
    }

    #[test]
    fn enriches_logs_with_matching_block() {
        let blocks = vec![sample_block(5, "0xbb", 100)];
        let index = BlockIndex::build(&blocks);

        let (enriched, dropped) = enrich_logs(vec![sample_log(5)], &index);
        assert_eq!(dropped, 0);
        assert_eq!(enriched[0].block_hash, "0xbb");
        assert_eq!(enriched[0].block_timestamp, 100);
    }

    #[test]
    fn drops_logs_with_unknown_block_and_counts_them() {
        let index = BlockIndex::build(&[]);
        let (enriched, dropped) = enrich_logs(vec![sample_log(5), sample_log(6)], &index);
        assert!(enriched.is_empty());
        assert_eq!(dropped, 2);
    }
}
