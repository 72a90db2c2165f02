use anyhow::{Context, Result};
use clap::Parser;
use regent_daemon::config::RegentConfig;
use regent_daemon::start_daemon;
use regent_protocol::NodeId;
use std::path::PathBuf;
use tracing::info;

/// Regent daemon - per-node service lifecycle orchestrator
#[derive(Parser)]
#[command(name = "regent-daemon", about = "Regent daemon for cluster service orchestration")]
struct Args {
    /// Path to the daemon configuration
    #[arg(short, long, default_value = "regent.yaml")]
    config: PathBuf,

    /// Override the node name from the configuration
    #[arg(long)]
    node: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut config = RegentConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(node) = args.node {
        config.node = NodeId::from(node);
        config.validate()?;
    }

    info!("Starting Regent daemon on node {}", config.node);

    let handle = start_daemon(&config).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    handle.shutdown().await;

    info!("Regent daemon stopped");
    Ok(())
}
