//! Typed configuration, layered from CLI flags (`clap`) over an optional
//! TOML file (`serde`/`toml`), mirroring `edr_tool_cli`'s scenario/config
//! layering (§10.3): CLI flags always win over the file.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::error::ConfigError;

/// One `(start_block, end_block, partition_dir)` tuple (GLOSSARY:
/// Partition).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub start_block: u64,
    pub end_block: u64,
    pub dir: String,
}

/// CLI flags (§10.3). Every field is optional here so the merge with a
/// config file can tell "not supplied" apart from "supplied as a default".
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "etl", about = "Block-range ETL engine for an Ethereum-family JSON-RPC node")]
pub struct Cli {
    /// Optional TOML file merged under these flags (flags win on conflict).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON-RPC provider URI (HTTP/HTTPS).
    #[arg(long)]
    pub provider_uri: Option<String>,

    /// Postgres connection string. Omit to skip the relational sink.
    #[arg(long)]
    pub database_url: Option<String>,

    /// Root directory the per-entity CSV partitions are written under.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// First block of the sweep (inclusive).
    #[arg(long)]
    pub start_block: Option<u64>,

    /// Last block of the sweep (inclusive).
    #[arg(long)]
    pub end_block: Option<u64>,

    /// Splits `[start_block, end_block]` into partitions of this many
    /// blocks each. Required unless the config file supplies an explicit
    /// `partitions` list.
    #[arg(long)]
    pub partition_size: Option<u64>,

    /// Batch executor tuning: work units per RPC batch (§4.1).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Batch executor tuning: concurrent in-flight batches (§4.1).
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Batch executor tuning: retries per transiently-failing batch (§4.1).
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Skip the geth-traces job; contracts always fall back to receipt
    /// mode (§4.5, §4.11 step 6).
    #[arg(long)]
    pub skip_geth_traces: bool,

    /// Continue to the next partition on a partition failure instead of
    /// aborting the whole run (§7 "a run over multiple partitions may
    /// choose to continue or stop").
    #[arg(long)]
    pub keep_going: bool,
}

/// The mirror of [`Cli`] loadable from a TOML file, every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct FileConfig {
    provider_uri: Option<String>,
    database_url: Option<String>,
    output_dir: Option<PathBuf>,
    start_block: Option<u64>,
    end_block: Option<u64>,
    partition_size: Option<u64>,
    batch_size: Option<usize>,
    max_workers: Option<usize>,
    max_retries: Option<u32>,
    skip_geth_traces: Option<bool>,
    keep_going: Option<bool>,
    partitions: Option<Vec<FilePartition>>,
}

#[derive(Debug, Deserialize)]
struct FilePartition {
    start_block: u64,
    end_block: u64,
    dir: String,
}

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_MAX_RETRIES: u32 = 5;

/// The fully-resolved configuration a partition sweep runs from.
#[derive(Clone, Debug)]
pub struct Config {
    pub provider_uri: String,
    pub database_url: Option<String>,
    pub output_dir: PathBuf,
    pub batch_size: usize,
    pub max_workers: usize,
    pub max_retries: u32,
    pub skip_geth_traces: bool,
    pub keep_going: bool,
    pub partitions: Vec<Partition>,
}

impl Config {
    /// Resolves `cli` (optionally merged with the TOML file it names) into
    /// a runnable [`Config`]. CLI flags override file values (§10.3).
    pub fn resolve(cli: Cli) -> Result<Config, ConfigError> {
        let file = match &cli.config {
            Some(path) => load_file_config(path)?,
            None => FileConfig::default(),
        };

        let provider_uri = cli
            .provider_uri
            .or(file.provider_uri)
            .ok_or(ConfigError::MissingField("provider_uri"))?;
        let output_dir = cli
            .output_dir
            .or(file.output_dir)
            .ok_or(ConfigError::MissingField("output_dir"))?;
        let database_url = cli.database_url.or(file.database_url);
        let batch_size = cli.batch_size.or(file.batch_size).unwrap_or(DEFAULT_BATCH_SIZE);
        let max_workers = cli.max_workers.or(file.max_workers).unwrap_or(DEFAULT_MAX_WORKERS);
        let max_retries = cli.max_retries.or(file.max_retries).unwrap_or(DEFAULT_MAX_RETRIES);
        let skip_geth_traces = cli.skip_geth_traces || file.skip_geth_traces.unwrap_or(false);
        let keep_going = cli.keep_going || file.keep_going.unwrap_or(false);

        let partitions = resolve_partitions(&cli, file.partitions)?;

        Ok(Config {
            provider_uri,
            database_url,
            output_dir,
            batch_size,
            max_workers,
            max_retries,
            skip_geth_traces,
            keep_going,
            partitions,
        })
    }
}

fn load_file_config(path: &PathBuf) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseFile {
        path: path.display().to_string(),
        source,
    })
}

/// An explicit `partitions` list in the config file wins outright; failing
/// that, `start_block`/`end_block`/`partition_size` (from either layer)
/// generate a sweep of fixed-size partitions named by their own range
/// (§10.3 "a single start/end/partition_size to generate a sweep").
fn resolve_partitions(cli: &Cli, file_partitions: Option<Vec<FilePartition>>) -> Result<Vec<Partition>, ConfigError> {
    if let Some(file_partitions) = file_partitions {
        return Ok(file_partitions
            .into_iter()
            .map(|partition| Partition {
                start_block: partition.start_block,
                end_block: partition.end_block,
                dir: partition.dir,
            })
            .collect());
    }

    let start_block = cli
        .start_block
        .ok_or(ConfigError::InvalidPlan("start_block is required without an explicit partitions list"))?;
    let end_block = cli
        .end_block
        .ok_or(ConfigError::InvalidPlan("end_block is required without an explicit partitions list"))?;
    let partition_size = cli
        .partition_size
        .ok_or(ConfigError::InvalidPlan("partition_size is required without an explicit partitions list"))?;

    if partition_size == 0 {
        return Err(ConfigError::InvalidPlan("partition_size must be >= 1"));
    }
    if end_block < start_block {
        return Err(ConfigError::InvalidPlan("end_block must be >= start_block"));
    }

    let mut partitions = Vec::new();
    let mut cursor = start_block;
    while cursor <= end_block {
        let partition_end = cursor.saturating_add(partition_size - 1).min(end_block);
        partitions.push(Partition {
            start_block: cursor,
            end_block: partition_end,
            dir: format!("{cursor:08}_{partition_end:08}"),
        });
        cursor = partition_end + 1;
    }

    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            provider_uri: Some("http://localhost:8545".to_string()),
            output_dir: Some(PathBuf::from("/tmp/out")),
            start_block: Some(100),
            end_block: Some(219),
            partition_size: Some(50),
            ..Cli::default()
        }
    }

    #[test]
    fn generates_a_fixed_size_sweep_from_start_end_partition_size() {
        let config = Config::resolve(base_cli()).unwrap();
        assert_eq!(
            config.partitions,
            vec![
                Partition { start_block: 100, end_block: 149, dir: "00000100_00000149".to_string() },
                Partition { start_block: 150, end_block: 199, dir: "00000150_00000199".to_string() },
                Partition { start_block: 200, end_block: 219, dir: "00000200_00000219".to_string() },
            ]
        );
    }

    #[test]
    fn missing_provider_uri_is_an_error() {
        let mut cli = base_cli();
        cli.provider_uri = None;
        let result = Config::resolve(cli);
        assert!(matches!(result, Err(ConfigError::MissingField("provider_uri"))));
    }

    #[test]
    fn rejects_end_before_start() {
        let mut cli = base_cli();
        cli.end_block = Some(50);
        let result = Config::resolve(cli);
        assert!(matches!(result, Err(ConfigError::InvalidPlan(_))));
    }

    #[test]
    fn defaults_match_the_executor_defaults() {
        let config = Config::resolve(base_cli()).unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.max_workers, DEFAULT_MAX_WORKERS);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(!config.skip_geth_traces);
        assert!(!config.keep_going);
    }
}
