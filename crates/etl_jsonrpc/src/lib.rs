#![warn(missing_docs)]

//! A batched JSON-RPC client for Ethereum-family nodes.
//!
//! This crate only knows how to shuttle JSON-RPC requests and responses over
//! HTTP; it has no opinion about which `eth_*`/`debug_*` methods exist or how
//! their results map onto domain entities — see `etl_types` and
//! `etl_mappers` for that.

mod client;
mod error;
/// Wire types for JSON-RPC 2.0 requests and responses.
pub mod jsonrpc;

pub use self::{
    client::{RpcClient, RpcClientError},
    error::{MiddlewareError, ReqwestError},
};
