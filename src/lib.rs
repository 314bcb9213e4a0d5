//! sessiond library
//!
//! Starts one application container per user on demand, probes it until it
//! answers, and publishes the route to it until the session is released.

use std::sync::Arc;

pub mod api;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod runtime;
pub mod session;

/// Application state shared across all handlers
pub struct AppState {
    pub config: config::AppConfig,
    pub session_manager: Arc<session::SessionManager>,
    pub route_table: Arc<routes::RouteTable>,
}
