//! The partition driver's error type (§7, §10.2).
//!
//! Jobs and sinks raise their own typed errors; this enum is where they get
//! aggregated before the driver decides whether to abort the whole run or,
//! under `--keep-going`, log and move on to the next partition. The binary
//! boundary (`main.rs`) converts this (and [`ConfigError`]) into
//! `anyhow::Error` for final reporting, matching the teacher's CLI
//! convention of keeping library crates `anyhow`-free.

/// Failures that can abort a single partition (§7).
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// `end_block < start_block`, or a negative/overflowing range (§7
    /// "Range validation"). Checked before any work starts.
    #[error("invalid partition range [{start_block}, {end_block}]: end must be >= start")]
    InvalidRange { start_block: u64, end_block: u64 },

    /// An extraction job failed persistently.
    #[error(transparent)]
    Job(#[from] etl_jobs::JobError),

    /// A sink failed; fatal to the partition (§4.8, §7).
    #[error(transparent)]
    Sink(#[from] etl_bus::SinkError),

    /// The scratch directory or transaction-hash temp file could not be
    /// written or read.
    #[error("partition scratch I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures resolving the CLI/TOML configuration into a runnable [`crate::config::Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The `--config` file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file did not parse as valid TOML.
    #[error("failed to parse config file '{path}': {source}")]
    ParseFile {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// A required field was not supplied by either CLI flags or the config
    /// file.
    #[error("missing required configuration: {0}")]
    MissingField(&'static str),

    /// `--start-block`/`--end-block`/`--partition-size` were given in a
    /// combination that can't be turned into a partition plan.
    #[error("invalid partition plan: {0}")]
    InvalidPlan(&'static str),
}
