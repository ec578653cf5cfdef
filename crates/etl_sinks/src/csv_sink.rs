//! The per-entity CSV file sink (§4.9).

use std::{collections::HashMap, fs, fs::File, path::PathBuf};

use async_trait::async_trait;
use etl_bus::{Sink, SinkError};
use etl_types::entities::{Block, Contract, Item, Log, Receipt, Token, TokenTransfer, Transaction};
use etl_types::hex::encode_bytes;

const ENTITIES: &[&str] = &[
    "block",
    "transaction",
    "receipt",
    "log",
    "token_transfer",
    "contract",
    "token",
];

/// Every entity family `CsvSink` can write, used when the provider supports
/// every job (§4.9).
pub const ALL_ENTITIES: &[&str] = ENTITIES;

/// Every entity family except `token_transfer`, for a partition run with
/// `Capabilities::supports_log_filters == false`: the token-transfers job
/// never runs, so no `token_transfer` directory/file/header should appear
/// (§4.4, §8 "when log-filter support is disabled, no `token_transfers` file
/// appears").
pub const ENTITIES_WITHOUT_TOKEN_TRANSFER: &[&str] =
    &["block", "transaction", "receipt", "log", "contract", "token"];

fn headers(entity: &str) -> &'static [&'static str] {
    match entity {
        "block" => &[
            "number",
            "hash",
            "parent_hash",
            "nonce",
            "sha3_uncles",
            "logs_bloom",
            "transactions_root",
            "state_root",
            "receipts_root",
            "miner",
            "difficulty",
            "total_difficulty",
            "size",
            "extra_data",
            "gas_limit",
            "gas_used",
            "timestamp",
            "transaction_count",
            "base_fee_per_gas",
        ],
        "transaction" => &[
            "hash",
            "nonce",
            "block_hash",
            "block_number",
            "transaction_index",
            "from_address",
            "to_address",
            "value",
            "gas",
            "gas_price",
            "input",
            "block_timestamp",
            "max_fee_per_gas",
            "max_priority_fee_per_gas",
            "transaction_type",
            "receipt_cumulative_gas_used",
            "receipt_gas_used",
            "receipt_contract_address",
            "receipt_root",
            "receipt_status",
            "receipt_effective_gas_price",
        ],
        "receipt" => &[
            "transaction_hash",
            "transaction_index",
            "block_hash",
            "block_number",
            "cumulative_gas_used",
            "gas_used",
            "contract_address",
            "root",
            "status",
            "effective_gas_price",
        ],
        "log" => &[
            "log_index",
            "transaction_hash",
            "transaction_index",
            "address",
            "data",
            "topics",
            "block_timestamp",
            "block_number",
            "block_hash",
        ],
        "token_transfer" => &[
            "token_address",
            "from_address",
            "to_address",
            "value",
            "transaction_hash",
            "log_index",
            "block_timestamp",
            "block_number",
            "block_hash",
        ],
        "contract" => &[
            "address",
            "bytecode",
            "function_sighashes",
            "is_erc20",
            "is_erc721",
            "block_number",
            "block_timestamp",
            "block_hash",
        ],
        "token" => &[
            "address",
            "name",
            "symbol",
            "decimals",
            "total_supply",
            "block_number",
            "block_timestamp",
            "block_hash",
        ],
        other => unreachable!("unknown entity '{other}'"),
    }
}

fn opt_string<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map_or(String::new(), ToString::to_string)
}

fn block_row(block: &Block) -> Vec<String> {
    vec![
        block.number.to_string(),
        block.hash.clone(),
        block.parent_hash.clone(),
        block.nonce.clone().unwrap_or_default(),
        block.sha3_uncles.clone(),
        block.logs_bloom.clone().unwrap_or_default(),
        block.transactions_root.clone(),
        block.state_root.clone(),
        block.receipts_root.clone(),
        block.miner.clone().unwrap_or_default(),
        opt_string(&block.difficulty),
        opt_string(&block.total_difficulty),
        opt_string(&block.size),
        block.extra_data.clone(),
        block.gas_limit.to_string(),
        block.gas_used.to_string(),
        block.timestamp.to_string(),
        block.transaction_count.to_string(),
        opt_string(&block.base_fee_per_gas),
    ]
}

fn transaction_row(transaction: &Transaction) -> Vec<String> {
    vec![
        transaction.hash.clone(),
        transaction.nonce.to_string(),
        transaction.block_hash.clone(),
        transaction.block_number.to_string(),
        transaction.transaction_index.to_string(),
        transaction.from_address.clone().unwrap_or_default(),
        transaction.to_address.clone().unwrap_or_default(),
        transaction.value.to_string(),
        transaction.gas.to_string(),
        opt_string(&transaction.gas_price),
        encode_bytes(&transaction.input),
        transaction.block_timestamp.to_string(),
        opt_string(&transaction.max_fee_per_gas),
        opt_string(&transaction.max_priority_fee_per_gas),
        opt_string(&transaction.transaction_type),
        opt_string(&transaction.receipt_cumulative_gas_used),
        opt_string(&transaction.receipt_gas_used),
        transaction.receipt_contract_address.clone().unwrap_or_default(),
        transaction.receipt_root.clone().unwrap_or_default(),
        opt_string(&transaction.receipt_status),
        opt_string(&transaction.receipt_effective_gas_price),
    ]
}

fn receipt_row(receipt: &Receipt) -> Vec<String> {
    vec![
        receipt.transaction_hash.clone(),
        receipt.transaction_index.to_string(),
        receipt.block_hash.clone(),
        receipt.block_number.to_string(),
        receipt.cumulative_gas_used.to_string(),
        receipt.gas_used.to_string(),
        receipt.contract_address.clone().unwrap_or_default(),
        receipt.root.clone().unwrap_or_default(),
        opt_string(&receipt.status),
        opt_string(&receipt.effective_gas_price),
    ]
}

fn log_row(log: &Log) -> Vec<String> {
    vec![
        log.log_index.to_string(),
        log.transaction_hash.clone(),
        log.transaction_index.to_string(),
        log.address.clone().unwrap_or_default(),
        encode_bytes(&log.data),
        log.topics.to_delimited_string(),
        log.block_timestamp.to_string(),
        log.block_number.to_string(),
        log.block_hash.clone(),
    ]
}

fn token_transfer_row(transfer: &TokenTransfer) -> Vec<String> {
    vec![
        transfer.token_address.clone().unwrap_or_default(),
        transfer.from_address.clone().unwrap_or_default(),
        transfer.to_address.clone().unwrap_or_default(),
        transfer.value.to_string(),
        transfer.transaction_hash.clone(),
        transfer.log_index.to_string(),
        transfer.block_timestamp.to_string(),
        transfer.block_number.to_string(),
        transfer.block_hash.clone(),
    ]
}

fn contract_row(contract: &Contract) -> Vec<String> {
    vec![
        contract.address.clone(),
        encode_bytes(&contract.bytecode),
        contract.function_sighashes.join("|"),
        contract.is_erc20.to_string(),
        contract.is_erc721.to_string(),
        contract.block_number.to_string(),
        contract.block_timestamp.to_string(),
        contract.block_hash.clone(),
    ]
}

fn token_row(token: &Token) -> Vec<String> {
    vec![
        token.address.clone(),
        token.name.clone().unwrap_or_default(),
        token.symbol.clone().unwrap_or_default(),
        opt_string(&token.decimals),
        opt_string(&token.total_supply),
        token.block_number.to_string(),
        token.block_timestamp.to_string(),
        token.block_hash.clone(),
    ]
}

fn row_for(item: &Item) -> Vec<String> {
    match item {
        Item::Block(block) => block_row(block),
        Item::Transaction(transaction) => transaction_row(transaction),
        Item::Receipt(receipt) => receipt_row(receipt),
        Item::Log(log) => log_row(log),
        Item::TokenTransfer(transfer) => token_transfer_row(transfer),
        Item::Contract(contract) => contract_row(contract),
        Item::Token(token) => token_row(token),
    }
}

/// Writes one CSV file per entity family under `<output_dir>/<entity>/
/// <partition_dir>/<entity>_<start8>_<end8>.csv` (§4.9). Files are opened
/// and header rows written at [`Sink::open`]; rows are appended as items
/// arrive and the writers are flushed at [`Sink::close`].
pub struct CsvSink {
    output_dir: PathBuf,
    partition_dir: String,
    start_block: u64,
    end_block: u64,
    entities: &'static [&'static str],
    writers: HashMap<&'static str, csv::Writer<File>>,
}

impl CsvSink {
    /// Creates a sink that will write every entity family into `output_dir`
    /// for the partition named `partition_dir`, covering `[start_block,
    /// end_block]`. Use [`Self::with_entities`] to restrict which families
    /// get a file at all, e.g. when a job won't run for this partition.
    pub fn new(output_dir: PathBuf, partition_dir: impl Into<String>, start_block: u64, end_block: u64) -> Self {
        Self::with_entities(output_dir, partition_dir, start_block, end_block, ALL_ENTITIES)
    }

    /// Creates a sink that only opens a file for each entity in `entities`
    /// (§4.9, §8): an entity left out never gets a directory, file, or
    /// header row, matching how a job that didn't run has nothing to write.
    pub fn with_entities(
        output_dir: PathBuf,
        partition_dir: impl Into<String>,
        start_block: u64,
        end_block: u64,
        entities: &'static [&'static str],
    ) -> Self {
        CsvSink {
            output_dir,
            partition_dir: partition_dir.into(),
            start_block,
            end_block,
            entities,
            writers: HashMap::new(),
        }
    }

    fn file_name(&self, entity: &str) -> String {
        format!("{entity}_{:08}_{:08}.csv", self.start_block, self.end_block)
    }
}

#[async_trait]
impl Sink for CsvSink {
    async fn open(&mut self) -> Result<(), SinkError> {
        for &entity in self.entities {
            let dir = self.output_dir.join(entity).join(&self.partition_dir);
            fs::create_dir_all(&dir).map_err(|source| SinkError::Open {
                sink: "csv",
                source: source.into(),
            })?;

            let path = dir.join(self.file_name(entity));
            let mut writer = csv::WriterBuilder::new()
                .from_path(&path)
                .map_err(|source| SinkError::Open {
                    sink: "csv",
                    source: source.into(),
                })?;
            writer
                .write_record(headers(entity))
                .map_err(|source| SinkError::Open {
                    sink: "csv",
                    source: source.into(),
                })?;

            self.writers.insert(entity, writer);
        }

        Ok(())
    }

    async fn export_items(&mut self, items: &[Item]) -> Result<(), SinkError> {
        for item in items {
            let writer = self.writers.get_mut(item.type_name()).expect(
                "open() registers a writer for every entity in self.entities, and the partition \
                 driver only emits items for entities it configured a writer for",
            );

            writer
                .write_record(row_for(item))
                .map_err(|source| SinkError::Write {
                    sink: "csv",
                    source: source.into(),
                })?;
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        for (entity, writer) in &mut self.writers {
            writer.flush().map_err(|source| SinkError::Close {
                sink: *entity,
                source: source.into(),
            })?;
        }

        Ok(())
    }
}
