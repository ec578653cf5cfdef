//! `etl`: runs a block-range ETL sweep over an Ethereum-family JSON-RPC
//! node, partition by partition (§1, §4.11).

mod config;
mod error;
mod partition;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Config};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::resolve(cli)?;
    let rpc = etl_jsonrpc::RpcClient::new(&config.provider_uri)?;
    let capabilities = partition::detect_capabilities(&rpc, &config).await;

    tracing::info!(
        partitions = config.partitions.len(),
        supports_log_filters = capabilities.supports_log_filters,
        "starting partition sweep"
    );

    let mut failures = 0usize;
    for partition in &config.partitions {
        match partition::run_partition(&rpc, &config, partition, &capabilities).await {
            Ok(()) => {}
            Err(error) => {
                failures += 1;
                tracing::error!(dir = %partition.dir, %error, "partition failed");
                if !config.keep_going {
                    return Err(error.into());
                }
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} partitions failed", config.partitions.len());
    }

    Ok(())
}
