//! Detects which optional RPC methods a provider supports, so the partition
//! driver can degrade gracefully instead of failing (§4.4, §4.5, §9).

use etl_jsonrpc::{jsonrpc, RpcClient};
use etl_types::method::EthMethod;

/// Substrings of a provider URI known to front a backend that rejects wide
/// `eth_getLogs` filters (free/public RPC gateways that cap log queries to
/// a handful of blocks or don't implement them at all). This is the
/// "substring test on the provider URI" the design notes call a stopgap
/// (§9) pending real capability probing.
const KNOWN_NO_LOG_FILTER_HOSTS: &[&str] = &["cloudflare-eth.com"];

/// Which optional methods the current provider is known or assumed to
/// support. Every capability defaults to `true`; detection only ever turns
/// one off, never turns the RPC client's other happy-path behavior on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether `eth_getLogs` is usable for the token-transfers job (§4.4).
    pub supports_log_filters: bool,
    /// Whether `debug_traceBlockByNumber` is usable for the geth-traces job
    /// (§4.5). This starts `true` and is turned off by the geth-traces job
    /// itself on first failure, not by URL inspection — debug methods
    /// aren't reliably guessable from the URL the way free-tier log-filter
    /// limits are.
    pub supports_debug_traces: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            supports_log_filters: true,
            supports_debug_traces: true,
        }
    }
}

impl Capabilities {
    /// The cheap, synchronous default: assume every capability is
    /// available unless `provider_uri` matches a known-limited host (§9).
    pub fn from_url(provider_uri: &str) -> Self {
        let supports_log_filters = !KNOWN_NO_LOG_FILTER_HOSTS
            .iter()
            .any(|host| provider_uri.contains(host));

        Capabilities {
            supports_log_filters,
            ..Capabilities::default()
        }
    }

    /// The documented upgrade path from [`Self::from_url`] (§9): issue a
    /// minimal `eth_getLogs` call for the empty range `[latest, latest]`
    /// and treat a "method not supported"/HTTP error as evidence the
    /// provider lacks log filters. A successful call (even with zero
    /// results) confirms support.
    pub async fn probe(rpc: &RpcClient, latest_block: u64) -> Self {
        let probe_filter = EthMethod::get_transfer_logs(latest_block, latest_block);
        let supports_log_filters = rpc
            .call::<_, Vec<serde_json::Value>>(probe_filter)
            .await
            .is_ok();

        Capabilities {
            supports_log_filters,
            ..Capabilities::default()
        }
    }
}

/// Whether a `debug_traceBlockByNumber` failure indicates the method is
/// unsupported/unavailable for this block (historical state pruned, method
/// not found) as opposed to a transient network error (§4.5, §7).
pub fn is_trace_unavailable(error: &jsonrpc::Error) -> bool {
    let message = error.message.to_ascii_lowercase();
    message.contains("missing trie node")
        || message.contains("historical")
        || message.contains("method not found")
        || message.contains("method not supported")
        || message.contains("not available")
}
