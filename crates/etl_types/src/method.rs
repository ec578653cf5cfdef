//! The Ethereum JSON-RPC methods this pipeline calls, as payloads ready to
//! hand to `etl_jsonrpc::RpcClient::call`/`call_batch`.

use serde::Serialize;

fn to_quantity(block_number: u64) -> String {
    format!("0x{block_number:x}")
}

/// A filter for `eth_getLogs`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub from_block: String,
    pub to_block: String,
    /// `topics[0]` selects the event signature; later slots are left `null`
    /// (matching any value) for the ERC20/ERC721 Transfer filter this
    /// pipeline uses.
    pub topics: Vec<Option<String>>,
}

/// The ERC20/ERC721 `Transfer` event signature topic.
pub const TRANSFER_EVENT_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

impl LogFilter {
    /// A filter for every `Transfer` event in `[from_block, to_block]`.
    pub fn transfers(from_block: u64, to_block: u64) -> Self {
        LogFilter {
            from_block: to_quantity(from_block),
            to_block: to_quantity(to_block),
            topics: vec![Some(TRANSFER_EVENT_TOPIC.to_string())],
        }
    }
}

/// A call request for `eth_call`.
#[derive(Clone, Debug, Serialize)]
pub struct CallRequest {
    pub to: String,
    pub data: String,
}

/// Tracer configuration for `debug_traceBlockByNumber`.
#[derive(Clone, Debug, Serialize)]
pub struct TraceConfig {
    pub tracer: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            tracer: "callTracer".to_string(),
        }
    }
}

/// The subset of the Ethereum JSON-RPC surface this pipeline calls.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum EthMethod {
    #[serde(rename = "eth_getBlockByNumber")]
    GetBlockByNumber(String, bool),
    #[serde(rename = "eth_getTransactionReceipt")]
    GetTransactionReceipt(String),
    #[serde(rename = "eth_getLogs")]
    GetLogs(LogFilter),
    #[serde(rename = "eth_getCode")]
    GetCode(String, &'static str),
    #[serde(rename = "eth_call")]
    Call(CallRequest, &'static str),
    #[serde(rename = "debug_traceBlockByNumber")]
    DebugTraceBlockByNumber(String, TraceConfig),
}

impl EthMethod {
    /// `eth_getBlockByNumber(number, full_tx)`.
    pub fn get_block_by_number(number: u64, full_tx: bool) -> Self {
        EthMethod::GetBlockByNumber(to_quantity(number), full_tx)
    }

    /// `eth_getTransactionReceipt(hash)`.
    pub fn get_transaction_receipt(hash: impl Into<String>) -> Self {
        EthMethod::GetTransactionReceipt(hash.into())
    }

    /// `eth_getLogs` filtered to `Transfer` events in `[from_block,
    /// to_block]`.
    pub fn get_transfer_logs(from_block: u64, to_block: u64) -> Self {
        EthMethod::GetLogs(LogFilter::transfers(from_block, to_block))
    }

    /// `eth_getCode(address, "latest")`.
    pub fn get_code(address: impl Into<String>) -> Self {
        EthMethod::GetCode(address.into(), "latest")
    }

    /// `eth_call({to, data}, "latest")`.
    pub fn call(to: impl Into<String>, data: impl Into<String>) -> Self {
        EthMethod::Call(
            CallRequest {
                to: to.into(),
                data: data.into(),
            },
            "latest",
        )
    }

    /// `debug_traceBlockByNumber(number, {tracer: "callTracer"})`.
    pub fn debug_trace_block_by_number(number: u64) -> Self {
        EthMethod::DebugTraceBlockByNumber(to_quantity(number), TraceConfig::default())
    }

    /// The method name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            EthMethod::GetBlockByNumber(..) => "eth_getBlockByNumber",
            EthMethod::GetTransactionReceipt(_) => "eth_getTransactionReceipt",
            EthMethod::GetLogs(_) => "eth_getLogs",
            EthMethod::GetCode(..) => "eth_getCode",
            EthMethod::Call(..) => "eth_call",
            EthMethod::DebugTraceBlockByNumber(..) => "debug_traceBlockByNumber",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_method_and_params_array() {
        let method = EthMethod::get_block_by_number(46147, true);
        let value = serde_json::to_value(&method).unwrap();
        assert_eq!(value["method"], "eth_getBlockByNumber");
        assert_eq!(value["params"][0], "0xb443");
        assert_eq!(value["params"][1], true);
    }

    #[test]
    fn transfer_filter_carries_the_transfer_topic() {
        let method = EthMethod::get_transfer_logs(100, 199);
        let value = serde_json::to_value(&method).unwrap();
        assert_eq!(value["params"]["fromBlock"], "0x64");
        assert_eq!(value["params"]["toBlock"], "0xc7");
        assert_eq!(value["params"]["topics"][0], TRANSFER_EVENT_TOPIC);
    }
}
