//! API module for sessiond
//!
//! Provides REST API endpoints for:
//! - Application catalog
//! - Session mapping and release
//! - Published routes
//! - Admin operations
//! - Health checks

mod auth;
mod error;
mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get},
    Router,
};

use crate::AppState;

pub use auth::{AdminAuth, UserAuth};
pub use error::ApiError;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check (no auth)
        .route("/health", get(handlers::health::health_check))
        // Prometheus metrics (no auth for scraping)
        .route("/metrics", get(crate::metrics::metrics_handler))
        // API v1 routes
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/apps", get(handlers::apps::list_apps))
        .route("/mapping/:app_name", get(handlers::session::get_mapping))
        .route("/session", delete(handlers::session::release_session))
        .route("/routes", get(handlers::routes::list_routes))
        // Admin endpoints (separate auth)
        .nest("/admin", admin_routes())
}

/// Admin API routes
fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(handlers::admin::list_sessions))
        .route(
            "/sessions/:user_name",
            delete(handlers::admin::terminate_session),
        )
        .route("/containers", get(handlers::admin::list_containers))
}
