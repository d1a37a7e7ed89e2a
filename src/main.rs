use std::sync::Arc;

use anyhow::Context;

use travel_discovery::config::DiscoveryConfig;
use travel_discovery::orchestrator::Orchestrator;
use travel_discovery::{logging, web};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DiscoveryConfig::load().context("Failed to load configuration")?;
    logging::init(&config.logging)?;

    tracing::info!(version = travel_discovery::VERSION, "Starting travel discovery");
    let orchestrator = Orchestrator::from_config(&config)?;
    web::run(Arc::new(orchestrator), config.server.port).await
}
