//! The Token-metadata job (§4.6b).

use std::sync::Arc;

use etl_bus::ItemBus;
use etl_executor::BatchExecutor;
use etl_jsonrpc::{jsonrpc, RpcClient};
use etl_mappers::{decode_string_return, decode_u256_return, decode_u8_return, encode_call_data};
use etl_types::{
    entities::{Contract, Item, Token},
    hex::decode_bytes,
    method::EthMethod,
};

use crate::error::{from_executor, JobError};

/// Runs the token-metadata job over every `contract` item already in `bus`
/// flagged `is_erc20` or `is_erc721`, exporting one `token` item per
/// candidate (§4.6b). A field that fails to decode degrades to `null`
/// rather than failing the contract or the partition.
#[tracing::instrument(skip(rpc, executor, bus))]
pub async fn run(rpc: &RpcClient, executor: &BatchExecutor, bus: &Arc<ItemBus>) -> Result<(), JobError> {
    let candidates: Vec<Contract> = bus
        .get_items("contract")
        .into_iter()
        .filter_map(|item| match item {
            Item::Contract(contract) if contract.is_erc20 || contract.is_erc721 => Some(contract),
            _ => None,
        })
        .collect();

    if candidates.is_empty() {
        return Ok(());
    }

    let total = candidates.len();
    let rpc = rpc.clone();
    let raw_bus = bus.clone();

    executor
        .execute(candidates, total, move |batch: Vec<Contract>| {
            let rpc = rpc.clone();
            let bus = raw_bus.clone();
            async move { process_batch(&rpc, &bus, batch).await }
        })
        .await
        .map_err(from_executor)
}

async fn process_batch(rpc: &RpcClient, bus: &ItemBus, contracts: Vec<Contract>) -> Result<(), JobError> {
    for contract in contracts {
        let token = fetch_token(rpc, &contract).await?;
        bus.export_item(Item::Token(token));
    }

    Ok(())
}

async fn fetch_token(rpc: &RpcClient, contract: &Contract) -> Result<Token, JobError> {
    let mut methods = vec![
        EthMethod::call(contract.address.clone(), encode_call_data("name()")),
        EthMethod::call(contract.address.clone(), encode_call_data("symbol()")),
        EthMethod::call(contract.address.clone(), encode_call_data("decimals()")),
    ];
    if contract.is_erc20 {
        methods.push(EthMethod::call(
            contract.address.clone(),
            encode_call_data("totalSupply()"),
        ));
    }

    let responses: Vec<Result<String, jsonrpc::Error>> = rpc.call_batch(methods).await?;

    let name = decode_field(&responses[0], decode_string_return);
    let symbol = decode_field(&responses[1], decode_string_return);
    let decimals = if contract.is_erc20 {
        decode_field(&responses[2], decode_u8_return).map(u64::from)
    } else {
        Some(0)
    };
    let total_supply = if contract.is_erc20 {
        decode_field(&responses[3], decode_u256_return)
    } else {
        None
    };

    Ok(Token {
        address: contract.address.clone(),
        name,
        symbol,
        decimals,
        total_supply,
        block_number: contract.block_number,
        block_timestamp: contract.block_timestamp,
        block_hash: contract.block_hash.clone(),
    })
}

/// Decodes one `eth_call` result, collapsing an application-level error or
/// a malformed return value to `None` instead of propagating (§4.6b).
fn decode_field<T>(
    response: &Result<String, jsonrpc::Error>,
    decode: impl Fn(&[u8]) -> Option<T>,
) -> Option<T> {
    let hex_data = response.as_ref().ok()?;
    let bytes = decode_bytes(Some(hex_data.as_str())).ok().flatten()?;
    decode(&bytes)
}
