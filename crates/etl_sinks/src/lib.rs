#![warn(missing_docs)]

//! The two sinks items are fanned out to by `etl_bus::MultiExporter`: a
//! per-entity CSV file writer (§4.9) and a relational upsert writer backed
//! by Postgres (§4.10).

mod csv_sink;
mod upsert_sink;

pub use csv_sink::{CsvSink, ALL_ENTITIES, ENTITIES_WITHOUT_TOKEN_TRANSFER};
pub use upsert_sink::PgUpsertSink;
