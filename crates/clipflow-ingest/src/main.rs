//! SFTP ingestion gateway binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipflow_ingest::{IngestConfig, SftpGateway};
use clipflow_registry::RestRegistry;
use clipflow_storage::S3Store;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    init_tracing();

    info!("Starting clipflow-ingest");

    let config = match IngestConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid ingestion config: {}", e);
            std::process::exit(1);
        }
    };

    let registry = match RestRegistry::from_env() {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to create registry client: {}", e);
            std::process::exit(1);
        }
    };

    let store = match S3Store::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create object store client: {}", e);
            std::process::exit(1);
        }
    };

    let gateway = SftpGateway::new(config, Arc::new(store), Arc::new(registry));

    if let Err(e) = gateway.run().await {
        error!("SFTP gateway failed: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("clipflow=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}
