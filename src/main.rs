//! sessiond - per-user application containers behind stable routes
//!
//! This is the main entry point for the session daemon.
//! It manages Docker containers and provides a REST API for session mapping.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderName;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use sessiond::api::create_router;
use sessiond::catalog::StaticCatalog;
use sessiond::config::AppConfig;
use sessiond::logging::init_logging;
use sessiond::routes::RouteTable;
use sessiond::runtime::{ContainerRuntime, DockerRuntime};
use sessiond::session::{HttpProber, ListenerHub, ManagerSettings, MappingListener, SessionManager};
use sessiond::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    init_logging(&config.log_level, &config.log_dir)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting sessiond");

    // Initialize metrics system
    sessiond::metrics::init_metrics()?;
    info!("Prometheus metrics initialized");

    // Connect to the container daemon
    let runtime = Arc::new(DockerRuntime::connect(&config.docker).context("Failed to connect to Docker")?);
    match runtime.version().await {
        Ok(version) => info!(%version, "Docker daemon connected"),
        Err(e) => warn!(error = %e, "Docker daemon not reachable yet"),
    }

    if config.apps.is_empty() {
        warn!("No applications configured");
    }
    let catalog = Arc::new(StaticCatalog::new(config.apps.clone()));
    let prober = Arc::new(HttpProber::new());
    let listeners = Arc::new(ListenerHub::new());

    let session_manager = Arc::new(SessionManager::new(
        ManagerSettings::from_config(&config),
        catalog,
        runtime,
        prober,
        listeners,
    ));

    // Route table follows every mapping change
    let route_table = Arc::new(RouteTable::new());
    session_manager
        .subscribe(route_table.clone() as Arc<dyn MappingListener>)
        .await;

    // Create shared application state
    let state = Arc::new(AppState {
        config: config.clone(),
        session_manager: session_manager.clone(),
        route_table,
    });

    // Build the router with all routes and middleware
    let x_request_id = HeaderName::from_static("x-request-id");
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Bind to address
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(%addr, "Listening on");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, releasing all sessions...");
    session_manager.shutdown().await;

    info!("sessiond stopped");
    Ok(())
}

/// Handle shutdown signals gracefully
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
}
