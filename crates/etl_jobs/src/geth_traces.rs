//! The Geth-traces job (§4.5).

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use etl_bus::ItemBus;
use etl_executor::BatchExecutor;
use etl_jsonrpc::{RpcClient, RpcClientError};
use etl_mappers::map_call_frame;
use etl_types::{
    entities::{GethTrace, Item},
    method::EthMethod,
    raw::RawTraceResult,
};

use crate::{
    capabilities::is_trace_unavailable,
    error::{from_executor, JobError},
};

/// Runs the Geth-traces job over `[start_block, end_block]`, exporting one
/// `geth_trace` item per block into `bus`.
///
/// Returns whether traces were available for the whole range. On the first
/// historical-state-unavailable or HTTP-level failure, the job flips this
/// to `false`, stops treating further such failures as errors, and the
/// caller must discard any `geth_trace` items already exported — per §4.5
/// "no traces are emitted" is a property of the whole job, not of the
/// individual failing block.
#[tracing::instrument(skip(rpc, executor, bus), fields(start_block, end_block))]
pub async fn run(
    rpc: &RpcClient,
    executor: &BatchExecutor,
    bus: &Arc<ItemBus>,
    start_block: u64,
    end_block: u64,
) -> Result<bool, JobError> {
    let block_numbers: Vec<u64> = (start_block..=end_block).collect();
    let total = block_numbers.len();

    let available = Arc::new(AtomicBool::new(true));
    let rpc = rpc.clone();
    let raw_bus = bus.clone();
    let raw_available = available.clone();

    executor
        .execute(block_numbers, total, move |batch: Vec<u64>| {
            let rpc = rpc.clone();
            let bus = raw_bus.clone();
            let available = raw_available.clone();
            async move { process_batch(&rpc, &bus, &available, batch).await }
        })
        .await
        .map_err(from_executor)?;

    let available = available.load(Ordering::SeqCst);
    if !available {
        tracing::warn!("debug_traceBlockByNumber unavailable, discarding any partial traces");
        bus.clear("geth_trace");
    }

    Ok(available)
}

async fn process_batch(
    rpc: &RpcClient,
    bus: &ItemBus,
    available: &AtomicBool,
    block_numbers: Vec<u64>,
) -> Result<(), JobError> {
    for block_number in block_numbers {
        if !available.load(Ordering::SeqCst) {
            // Another batch already discovered traces are unavailable;
            // no point spending further RPC calls on this job.
            return Ok(());
        }

        let method = EthMethod::debug_trace_block_by_number(block_number);
        match rpc.call::<_, Vec<RawTraceResult>>(method).await {
            Ok(raw_results) => {
                let root_calls = raw_results
                    .iter()
                    .map(|result| map_call_frame(&result.result))
                    .collect::<Result<Vec<_>, _>>()?;
                bus.export_item(Item::GethTrace(GethTrace {
                    block_number,
                    root_calls,
                }));
            }
            Err(RpcClientError::JsonRpcError { error }) if is_trace_unavailable(&error) => {
                available.store(false, Ordering::SeqCst);
                return Ok(());
            }
            Err(RpcClientError::HttpStatus(_)) => {
                available.store(false, Ordering::SeqCst);
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        }
    }

    Ok(())
}
