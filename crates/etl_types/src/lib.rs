#![warn(missing_docs)]

//! Domain types for the block-range ETL pipeline: decoded entities
//! (`entities`), the raw hex-string JSON-RPC shapes they're decoded from
//! (`raw`), decoding helpers (`hex`), and the JSON-RPC method payloads the
//! extraction jobs issue (`method`).

pub mod entities;
pub mod hex;
pub mod method;
pub mod raw;

pub use ethnum::U256;
