#![warn(missing_docs)]

//! The extraction jobs that make up one partition run: Blocks+Transactions,
//! Receipts+Logs, Token-transfers, Geth-traces, Contracts, and
//! Token-metadata. Each job owns its own `RpcClient` batch calls and mapping
//! into domain entities, and exports its results into the shared
//! `etl_bus::ItemBus`; the partition driver (`etl_cli`) sequences them in
//! the order §4.11 requires.

mod blocks_transactions;
mod capabilities;
mod contracts;
mod error;
mod geth_traces;
mod receipts_logs;
mod token_transfers;
mod tokens;

pub use blocks_transactions::run as run_blocks_transactions;
pub use capabilities::{is_trace_unavailable, Capabilities};
pub use contracts::run as run_contracts;
pub use error::JobError;
pub use geth_traces::run as run_geth_traces;
pub use receipts_logs::run as run_receipts_logs;
pub use token_transfers::run as run_token_transfers;
pub use tokens::run as run_tokens;
