#![warn(missing_docs)]

//! The bounded-concurrency batch work executor (§4.1).
//!
//! This crate has no opinion about what a "batch" contains or what failures
//! look like beyond [`TransientError`] — it is reused by every extraction
//! job in `etl_jobs` with a different work-unit type and a different
//! per-batch callable.

mod error;
mod executor;

pub use error::{ExecutorError, TransientError};
pub use executor::{BatchExecutor, ExecutorConfig};
