//! Data models for sessiond
//!
//! Request/response types of the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::AppDefinition;
use crate::session::{Session, SessionState};

// ============================================================================
// Mapping Models
// ============================================================================

/// Result of resolving a user's application to a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingResponse {
    pub route_name: String,
    pub app_name: String,
    /// Address the route forwards to, when it could be formed
    #[serde(default)]
    pub target: Option<String>,
}

/// Published route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub route_name: String,
    pub target: String,
}

/// Catalog entry as listed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSummary {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub image: String,
}

impl From<AppDefinition> for AppSummary {
    fn from(app: AppDefinition) -> Self {
        Self {
            name: app.name,
            display_name: app.display_name,
            description: app.description,
            image: app.image,
        }
    }
}

// ============================================================================
// Admin Models
// ============================================================================

/// Session summary for admin view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSessionSummary {
    pub session_id: Uuid,
    pub user_name: String,
    pub app_name: String,
    pub route_name: String,
    pub container_id: String,
    pub port: u16,
    pub status: SessionState,
    pub created_at: DateTime<Utc>,
}

impl From<Session> for AdminSessionSummary {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.session_id,
            user_name: session.user_name,
            app_name: session.app_name,
            route_name: session.route_name,
            container_id: session.container_id,
            port: session.port,
            status: SessionState::Active,
            created_at: session.created_at,
        }
    }
}

/// A start still in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingStart {
    pub user_name: String,
    pub status: SessionState,
}

/// Admin session listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSessionList {
    pub sessions: Vec<AdminSessionSummary>,
    pub pending: Vec<PendingStart>,
}

// ============================================================================
// Health Models
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_sessions: u64,
    #[serde(default)]
    pub runtime_version: Option<String>,
}

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

// ============================================================================
// Error Models
// ============================================================================

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
