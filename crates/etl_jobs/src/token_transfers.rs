//! The Token-transfers job (§4.4).

use std::sync::Arc;

use etl_bus::{enrich_token_transfers, BlockIndex, ItemBus};
use etl_executor::BatchExecutor;
use etl_jsonrpc::RpcClient;
use etl_mappers::map_token_transfer;
use etl_types::{entities::Item, method::EthMethod, raw::RawLog};

use crate::error::{from_executor, JobError};

/// Runs the Token-transfers job over `[start_block, end_block]`, exporting
/// `token_transfer` items into `bus`, enriched against `blocks`.
///
/// Callers must check `Capabilities::supports_log_filters` before calling
/// this (§4.4 degradation): this job always issues `eth_getLogs` and has no
/// internal skip logic of its own, matching the teacher's convention of
/// keeping capability branching in the driver, not the job.
#[tracing::instrument(skip(rpc, executor, bus, blocks), fields(start_block, end_block))]
pub async fn run(
    rpc: &RpcClient,
    executor: &BatchExecutor,
    bus: &Arc<ItemBus>,
    blocks: &BlockIndex,
    start_block: u64,
    end_block: u64,
) -> Result<usize, JobError> {
    let block_numbers: Vec<u64> = (start_block..=end_block).collect();
    let total = block_numbers.len();

    let rpc = rpc.clone();
    let raw_bus = bus.clone();

    executor
        .execute(block_numbers, total, move |batch: Vec<u64>| {
            let rpc = rpc.clone();
            let bus = raw_bus.clone();
            async move { process_batch(&rpc, &bus, batch).await }
        })
        .await
        .map_err(from_executor)?;

    let transfers = bus
        .get_items("token_transfer")
        .into_iter()
        .filter_map(|item| match item {
            Item::TokenTransfer(transfer) => Some(transfer),
            _ => None,
        })
        .collect();

    let (enriched, dropped) = enrich_token_transfers(transfers, blocks);
    bus.clear("token_transfer");
    bus.export_items(enriched.into_iter().map(Item::TokenTransfer));

    Ok(dropped)
}

async fn process_batch(rpc: &RpcClient, bus: &ItemBus, block_numbers: Vec<u64>) -> Result<(), JobError> {
    let Some(&from_block) = block_numbers.iter().min() else {
        return Ok(());
    };
    let to_block = *block_numbers.iter().max().expect("non-empty batch");

    let method = EthMethod::get_transfer_logs(from_block, to_block);
    let raw_logs: Vec<RawLog> = rpc.call(method).await?;

    for raw_log in &raw_logs {
        let transfer = map_token_transfer(raw_log)?;
        bus.export_item(Item::TokenTransfer(transfer));
    }

    Ok(())
}
