//! ipwd - image policy webhook daemon
//!
//! Reads its configuration from the environment (or matching flags), then
//! serves `POST /ipw` until SIGINT or SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ipw_core::{init_tracing, logging_profile, DockerConnector, METRICS};
use ipwd::{AppState, Cli, Server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (json, level) = logging_profile(cli.debug);
    init_tracing(json, level);

    let config = cli
        .webhook_config()
        .context("Invalid webhook configuration")?;

    info!(
        version = ipw_core::VERSION,
        whitelist = ?config.policy.whitelist,
        excluded_namespaces = ?config.policy.excluded_namespaces,
        replicate = config.stages.replicate,
        scan = config.stages.scan,
        "ipwd starting"
    );
    if let Some(target) = &config.replication {
        info!(target = ?target, "replication enabled");
    }

    let state = AppState::new(config, Arc::new(DockerConnector));
    Server::new(cli.listen_addr(), state)
        .run()
        .await
        .context("Server failed")?;

    METRICS.flush();
    Ok(())
}
