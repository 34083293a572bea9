// src/main.rs
use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use docker_healthcheck::{
    config,
    health::HealthAggregator,
    server::{RequestHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docker_healthcheck=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    info!(
        dependency = %config.dependency.address,
        started = %config.started(),
        checks = ?config.checks,
        "Configuration loaded"
    );

    let aggregator = Arc::new(HealthAggregator::new(&config)?);
    let handler = RequestHandler::new(aggregator, config.health.path.as_str());

    info!(
        "Serving health checks on http://{}{}",
        config.server.listen, config.health.path
    );

    ServerBuilder::new(config.server.listen)
        .with_handler(handler)
        .serve(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
