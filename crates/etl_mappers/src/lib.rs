#![warn(missing_docs)]

//! Pure transforms between the JSON-RPC wire shapes in `etl_types::raw` and
//! the domain entities in `etl_types::entities`. Hex decoding, address
//! normalization, log-topic parsing, bytecode dispatch-table scanning, and
//! ABI return-value decoding all live here; nothing in this crate talks to
//! the network or touches a filesystem.

mod block;
mod contract;
mod error;
mod receipt;
mod token;
mod token_transfer;
mod trace;

pub use block::{map_block, map_transaction, splice_receipt};
pub use contract::classify_contract;
pub use error::MapperError;
pub use receipt::map_receipt;
pub use token::{decode_string_return, decode_u256_return, decode_u8_return, encode_call_data};
pub use token_transfer::map_token_transfer;
pub use trace::map_call_frame;
