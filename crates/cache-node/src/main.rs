//! # UMPS Packet Cache Node
//!
//! Runs a packet cache until Ctrl+C. See the library docs for the startup
//! sequence and `config.rs` for the configuration file format.

use anyhow::{Context, Result};
use cache_node::{CacheNode, NodeConfig};
use cache_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let _guard = init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    let node = CacheNode::new(config).context("Failed to create packet cache node")?;
    node.start().context("Failed to start packet cache node")?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    node.shutdown().await.context("Shutdown did not complete cleanly")?;
    Ok(())
}
