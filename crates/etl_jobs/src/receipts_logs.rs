//! The Receipts+Logs job (§4.3).

use std::sync::Arc;

use etl_bus::{enrich_logs, BlockIndex, ItemBus};
use etl_executor::BatchExecutor;
use etl_jsonrpc::RpcClient;
use etl_mappers::map_receipt;
use etl_types::{entities::Item, method::EthMethod, raw::RawReceipt};

use crate::error::{from_executor, JobError};

/// Runs the Receipts+Logs job over `transaction_hashes` (the unique `hash`
/// column of the transactions already written by the Blocks+Transactions
/// job, §4.3), exporting one `receipt` item per transaction and one `log`
/// item per log entry, with logs enriched against `blocks`.
///
/// Returns the number of logs dropped because their block was not found in
/// `blocks` (§4.3 edge case).
#[tracing::instrument(skip(rpc, executor, bus, blocks, transaction_hashes))]
pub async fn run(
    rpc: &RpcClient,
    executor: &BatchExecutor,
    bus: &Arc<ItemBus>,
    blocks: &BlockIndex,
    transaction_hashes: Vec<String>,
) -> Result<usize, JobError> {
    let total = transaction_hashes.len();
    let rpc = rpc.clone();
    let raw_bus = bus.clone();

    executor
        .execute(transaction_hashes, total, move |batch: Vec<String>| {
            let rpc = rpc.clone();
            let bus = raw_bus.clone();
            async move { process_batch(&rpc, &bus, batch).await }
        })
        .await
        .map_err(from_executor)?;

    // Enrichment runs once, after every batch has drained (§4.3, §5:
    // "a CSV is only finalized after every prior job ... has completed").
    let logs = bus.get_items("log");
    let raw_logs: Vec<_> = logs
        .into_iter()
        .filter_map(|item| match item {
            Item::Log(log) => Some(log),
            _ => None,
        })
        .collect();

    let (enriched, dropped) = enrich_logs(raw_logs, blocks);

    // Replace the unenriched `log` bucket with the enriched, possibly
    // shorter, set (dropped logs are excluded per §4.3).
    bus.clear("log");
    bus.export_items(enriched.into_iter().map(Item::Log));

    Ok(dropped)
}

async fn process_batch(
    rpc: &RpcClient,
    bus: &ItemBus,
    transaction_hashes: Vec<String>,
) -> Result<(), JobError> {
    let methods: Vec<EthMethod> = transaction_hashes
        .iter()
        .cloned()
        .map(EthMethod::get_transaction_receipt)
        .collect();

    let responses: Vec<Result<Option<RawReceipt>, etl_jsonrpc::jsonrpc::Error>> =
        rpc.call_batch(methods).await?;

    for response in responses {
        let Some(raw_receipt) = response? else {
            continue;
        };
        let receipt = map_receipt(&raw_receipt)?;

        for log in &receipt.logs {
            bus.export_item(Item::Log(log.clone()));
        }

        let mut receipt = receipt;
        receipt.logs.clear();
        bus.export_item(Item::Receipt(receipt));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use etl_executor::ExecutorConfig;
    use etl_types::entities::Block;

    use super::*;

    fn sample_block(number: u64) -> Block {
        Block {
            number,
            hash: format!("0x{number:064x}"),
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
            timestamp: 42,
            transaction_count: 0,
            base_fee_per_gas: None,
        }
    }

    #[tokio::test]
    async fn enriches_logs_and_drops_logs_with_unknown_block() {
        use wiremock::{
            matchers::{method, path},
            Mock, MockServer, ResponseTemplate,
        };

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(|request: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
                let batch = body.as_array().unwrap();
                let responses: Vec<_> = batch
                    .iter()
                    .map(|req| {
                        let block_number = if req["params"][0] == "0xaa" { "0x1" } else { "0x2" };
                        serde_json::json!({
                            "jsonrpc": "2.0",
                            "id": req["id"],
                            "result": {
                                "transactionHash": req["params"][0],
                                "transactionIndex": "0x0",
                                "blockHash": "0xffff",
                                "blockNumber": block_number,
                                "cumulativeGasUsed": "0x100",
                                "gasUsed": "0x50",
                                "status": "0x1",
                                "logs": [{
                                    "logIndex": "0x0",
                                    "transactionHash": req["params"][0],
                                    "transactionIndex": "0x0",
                                    "address": "0xabcd000000000000000000000000000000001234",
                                    "data": "0x",
                                    "topics": [],
                                    "blockNumber": block_number,
                                    "blockHash": "0xffff",
                                }],
                            }
                        })
                    })
                    .collect();
                ResponseTemplate::new(200).set_body_json(responses)
            })
            .mount(&server)
            .await;

        let rpc = RpcClient::new(&server.uri()).unwrap();
        let executor = BatchExecutor::new(ExecutorConfig {
            batch_size: 10,
            max_workers: 2,
            max_retries: 1,
        });
        let bus = Arc::new(ItemBus::open());
        let blocks = BlockIndex::build(&[sample_block(1)]);

        let dropped = run(
            &rpc,
            &executor,
            &bus,
            &blocks,
            vec!["0xaa".to_string(), "0xbb".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(dropped, 1);
        assert_eq!(bus.get_items("log").len(), 1);
        assert_eq!(bus.get_items("receipt").len(), 2);
        if let Item::Log(log) = &bus.get_items("log")[0] {
            assert_eq!(log.block_timestamp, 42);
        } else {
            panic!("expected a log item");
        }
    }
}
