#![warn(missing_docs)]

//! The in-memory item bus that couples extraction jobs together within one
//! partition, the `Sink`/`MultiExporter` fan-out abstraction every output
//! sink implements, and the block-number enrichment joins (§4.6-4.8).

mod bus;
mod enrich;
mod error;
mod sink;

pub use bus::ItemBus;
pub use enrich::{enrich_contracts, enrich_logs, enrich_token_transfers, BlockIndex};
pub use error::SinkError;
pub use sink::{MultiExporter, Sink};
