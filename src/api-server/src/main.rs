//! Vertretungsplan API Server
//!
//! Discovers the registered endpoints and serves them over REST, GraphQL
//! and WebSocket.

use std::net::SocketAddr;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vp_api_server::{build_app, handlers, Config, EndpointRegistry, Result};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting Vertretungsplan API Server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        environment = %config.environment,
        debug = config.debug,
        prefix = %config.api_prefix(),
        "Configuration loaded"
    );

    let mut registry = EndpointRegistry::new();
    handlers::register_all(&mut registry, &config);

    let host = config.server.host.clone();
    let port = config.server.port;
    let prefix = config.api_prefix();
    let app = build_app(config, &registry, handlers::HANDLER_SCOPE)?;

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    let addr = listener.local_addr()?;

    info!("API Server listening on {}", addr);
    info!("GraphQL endpoint: http://{}{}/graphql", addr, prefix);
    info!("Health check endpoint: http://{}/health", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("API Server shutdown complete");
    Ok(())
}

/// Initialize structured JSON logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vp_api_server=debug,api_server=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            warn!("Received SIGTERM, shutting down gracefully");
        },
    }
}
