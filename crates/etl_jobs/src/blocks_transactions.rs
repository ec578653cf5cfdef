//! The Blocks+Transactions job (§4.2).

use std::sync::Arc;

use etl_bus::ItemBus;
use etl_executor::BatchExecutor;
use etl_jsonrpc::RpcClient;
use etl_mappers::{map_block, map_transaction};
use etl_types::{
    entities::Item,
    method::EthMethod,
    raw::{RawBlock, RawBlockTransactions, RawReceipt},
};

use crate::error::{from_executor, JobError};

/// Runs the Blocks+Transactions job over `[start_block, end_block]`,
/// exporting `block` items (and `transaction` items, if
/// `export_transactions`) into `bus`.
///
/// At least one of `export_blocks`/`export_transactions` must be `true`
/// (§4.2); `export_blocks=false, export_transactions=true` still fetches
/// full blocks (receipts need the transaction hashes) but only exports
/// `transaction` items.
#[tracing::instrument(skip(rpc, executor, bus), fields(start_block, end_block))]
pub async fn run(
    rpc: &RpcClient,
    executor: &BatchExecutor,
    bus: &Arc<ItemBus>,
    start_block: u64,
    end_block: u64,
    export_blocks: bool,
    export_transactions: bool,
) -> Result<(), JobError> {
    if !export_blocks && !export_transactions {
        return Err(JobError::InvalidConfig(
            "at least one of export_blocks/export_transactions must be true",
        ));
    }
    if end_block < start_block {
        return Err(JobError::InvalidConfig("end_block must be >= start_block"));
    }

    let block_numbers: Vec<u64> = (start_block..=end_block).collect();
    let total = block_numbers.len();

    let rpc = rpc.clone();
    let bus = bus.clone();

    executor
        .execute(block_numbers, total, move |batch: Vec<u64>| {
            let rpc = rpc.clone();
            let bus = bus.clone();
            async move {
                process_batch(&rpc, &bus, batch, export_blocks, export_transactions).await
            }
        })
        .await
        .map_err(from_executor)
}

async fn process_batch(
    rpc: &RpcClient,
    bus: &ItemBus,
    block_numbers: Vec<u64>,
    export_blocks: bool,
    export_transactions: bool,
) -> Result<(), JobError> {
    let methods: Vec<EthMethod> = block_numbers
        .iter()
        .map(|number| EthMethod::get_block_by_number(*number, export_transactions))
        .collect();

    let responses: Vec<Result<Option<RawBlock>, etl_jsonrpc::jsonrpc::Error>> =
        rpc.call_batch(methods).await?;

    let mut raw_blocks = Vec::with_capacity(responses.len());
    for (number, response) in block_numbers.iter().zip(responses) {
        let raw_block = response?
            .ok_or_else(|| JobError::MalformedResponse(format!("block {number} not found")))?;
        raw_blocks.push(raw_block);
    }

    // Step 2: a single receipts batch across every transaction hash seen in
    // this entire block batch (§4.2 step 2), skipped entirely when no block
    // in the batch has any transactions (edge case in §4.2).
    let receipts_by_hash = if export_transactions {
        fetch_receipts(rpc, &raw_blocks).await?
    } else {
        std::collections::HashMap::new()
    };

    for raw_block in &raw_blocks {
        let block = etl_mappers::map_block(raw_block)?;

        if export_blocks {
            bus.export_item(Item::Block(block.clone()));
        }

        if export_transactions {
            if let RawBlockTransactions::Full(raw_transactions) = &raw_block.transactions {
                for (index, raw_transaction) in raw_transactions.iter().enumerate() {
                    let receipt = receipts_by_hash.get(&raw_transaction.hash);
                    let transaction =
                        map_transaction(raw_transaction, &block, index as u64, receipt)?;
                    bus.export_item(Item::Transaction(transaction));
                }
            }
        }
    }

    Ok(())
}

async fn fetch_receipts(
    rpc: &RpcClient,
    raw_blocks: &[RawBlock],
) -> Result<std::collections::HashMap<String, RawReceipt>, JobError> {
    let hashes: Vec<String> = raw_blocks
        .iter()
        .filter(|block| !block.transactions.is_empty())
        .flat_map(|block| block.transactions.hashes())
        .collect();

    if hashes.is_empty() {
        return Ok(std::collections::HashMap::new());
    }

    let methods: Vec<EthMethod> = hashes
        .iter()
        .cloned()
        .map(EthMethod::get_transaction_receipt)
        .collect();

    let responses: Vec<Result<Option<RawReceipt>, etl_jsonrpc::jsonrpc::Error>> =
        rpc.call_batch(methods).await?;

    let mut receipts_by_hash = std::collections::HashMap::with_capacity(hashes.len());
    for (hash, response) in hashes.into_iter().zip(responses) {
        // A null receipt is allowed (§4.2 edge case): `receipt_*` fields
        // stay `None` rather than failing the batch.
        if let Some(receipt) = response? {
            receipts_by_hash.insert(hash, receipt);
        }
    }

    Ok(receipts_by_hash)
}

#[cfg(test)]
mod tests {
    use etl_executor::ExecutorConfig;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn sample_block_json(number: u64, tx_hash: &str) -> serde_json::Value {
        json!({
            "jsonrpc": "2.0",
            "id": number,
            "result": {
                "number": format!("0x{:x}", number),
                "hash": format!("0x{:064x}", number),
                "parentHash": "0x0",
                "sha3Uncles": "0x0",
                "transactionsRoot": "0x0",
                "stateRoot": "0x0",
                "receiptsRoot": "0x0",
                "extraData": "0x",
                "gasLimit": "0x5208",
                "gasUsed": "0x0",
                "timestamp": "0x5",
                "transactions": [{
                    "hash": tx_hash,
                    "nonce": "0x0",
                    "transactionIndex": "0x0",
                    "from": "0xaaaa000000000000000000000000000000000000",
                    "to": null,
                    "value": "0x0",
                    "gas": "0x5208",
                    "input": "0x",
                }],
            }
        })
    }

    #[tokio::test]
    async fn exports_block_and_transaction_items_with_receipt_spliced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(|request: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
                let batch = body.as_array().unwrap();
                let is_block_batch = batch[0]["method"] == "eth_getBlockByNumber";
                if is_block_batch {
                    let responses: Vec<_> = batch
                        .iter()
                        .map(|_req| sample_block_json(1, "0xdeadbeef"))
                        .collect();
                    ResponseTemplate::new(200).set_body_json(responses)
                } else {
                    let responses: Vec<_> = batch
                        .iter()
                        .map(|req| {
                            json!({
                                "jsonrpc": "2.0",
                                "id": req["id"],
                                "result": {
                                    "transactionHash": "0xdeadbeef",
                                    "transactionIndex": "0x0",
                                    "blockHash": format!("0x{:064x}", 1),
                                    "blockNumber": "0x1",
                                    "cumulativeGasUsed": "0x100",
                                    "gasUsed": "0x50",
                                    "status": "0x1",
                                }
                            })
                        })
                        .collect();
                    ResponseTemplate::new(200).set_body_json(responses)
                }
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

        run(&rpc, &executor, &bus, 1, 1, true, true).await.unwrap();

        assert_eq!(bus.get_items("block").len(), 1);
        let transactions = bus.get_items("transaction");
        assert_eq!(transactions.len(), 1);
        if let Item::Transaction(transaction) = &transactions[0] {
            assert_eq!(transaction.receipt_status, Some(1));
            assert_eq!(transaction.block_number, 1);
        } else {
            panic!("expected a transaction item");
        }
    }

    #[tokio::test]
    async fn rejects_invalid_flag_combination() {
        let rpc = RpcClient::new("http://127.0.0.1:1").unwrap();
        let executor = BatchExecutor::new(ExecutorConfig::default());
        let bus = Arc::new(ItemBus::open());

        let result = run(&rpc, &executor, &bus, 1, 1, false, false).await;
        assert!(matches!(result, Err(JobError::InvalidConfig(_))));
    }
}
