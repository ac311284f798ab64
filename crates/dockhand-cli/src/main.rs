use anyhow::Context;
use clap::Parser;
use dockhand_core::ConnectionConfig;
use dockhand_network::NetworkClient;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the facts
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.apply_to_config(
        ConnectionConfig::from_env().context("Invalid DOCKER_* environment")?,
    );
    debug!(host = %config.docker_host, "resolved daemon endpoint");

    let facts = async {
        let client = NetworkClient::connect(config).await?;
        client.network_facts_with(&cli.name, &cli.options()).await
    }
    .await
    .map_err(|err| {
        if err.should_log() {
            error!(code = err.error_code(), "{err}");
        }
        err
    })
    .with_context(|| format!("Failed to inspect network `{}`", cli.name))?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&facts)?
    } else {
        serde_json::to_string(&facts)?
    };
    println!("{rendered}");
    Ok(())
}
