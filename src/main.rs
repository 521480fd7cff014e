//! `imsafe-server`: HTTP front end for VirusTotal file and URL scans.

use imsafe::backends::VirusTotalProvider;
use imsafe::config::ServerConfig;
use imsafe::manager::ScanManager;
use imsafe::server;

use std::sync::Arc;

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config = ServerConfig::from_env()?;
    let provider = VirusTotalProvider::new(config.virustotal.clone())?;
    let manager = ScanManager::builder()
        .with_provider(provider)
        .with_config(config.manager.clone())
        .build()?;

    if let Err(e) = manager.provider().health_check().await {
        tracing::warn!(error = %e, "Provider health check failed; serving anyway");
    }

    let listener = tiny_http::Server::http(&config.bind)?;
    tracing::info!(
        bind = %config.bind,
        version = env!("CARGO_PKG_VERSION"),
        "Server listening"
    );

    let manager = Arc::new(manager);
    let runtime = tokio::runtime::Handle::current();
    tokio::task::spawn_blocking(move || server::serve(listener, manager, runtime)).await?;

    Ok(())
}
