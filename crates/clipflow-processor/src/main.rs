//! Processing orchestrator binary.

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipflow_processor::{
    create_router, AppState, ClipTransformer, CommandTransformer, PassthroughTransformer,
    ProcessorConfig, Reconciler,
};
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

    info!("Starting clipflow-processor");

    let config = match ProcessorConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid processor config: {}", e);
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

    let transformer: Arc<dyn ClipTransformer> = match &config.transform_command {
        Some(command) => {
            info!(command = %command, "Using external transform command");
            match CommandTransformer::new(command) {
                Ok(t) => Arc::new(t),
                Err(e) => {
                    error!("Invalid TRANSFORM_COMMAND: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            info!("No TRANSFORM_COMMAND set; using passthrough transformer");
            Arc::new(PassthroughTransformer)
        }
    };

    let port = config.port;
    let state = AppState::new(config, Arc::new(registry), Arc::new(store), transformer);

    let metrics_handle = init_metrics();

    if state.config.reconcile_enabled {
        let reconciler = Reconciler::new(
            Arc::clone(&state.registry),
            state.config.reconcile_interval,
            state.config.processing_timeout,
        );
        tokio::spawn(async move {
            reconciler.run().await;
        });
    } else {
        info!("Reconciliation sweep disabled");
    }

    let app = create_router(state, metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

fn init_metrics() -> Option<PrometheusHandle> {
    let enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    if enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(
            PrometheusBuilder::new()
                .install_recorder()
                .expect("Failed to install Prometheus recorder"),
        )
    } else {
        None
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

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
