//! cproxy - multi-port TCP front-end proxy for challenge containers

use cproxy_config::CProxyConfig;
use cproxy_core::registry;
use cproxy_driver::CliComposeDriver;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CProxyConfig::from_env();

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::info!(root = %config.challenges_root.display(), "discovering challenges");
    let registry = Arc::new(registry::discover(&config.challenges_root));
    tracing::info!(count = registry.len(), "discovery complete");

    let driver: Arc<dyn cproxy_driver::ComposeDriver> = Arc::new(CliComposeDriver::new());

    cproxy_core::supervisor::run(registry, driver).await?;

    Ok(())
}
