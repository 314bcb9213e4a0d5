//! Session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle position of a user's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Port allocated, container being created
    Starting,
    /// Container running, waiting for it to answer
    Probing,
    Active,
    Releasing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Starting => "starting",
            SessionState::Probing => "probing",
            SessionState::Active => "active",
            SessionState::Releasing => "releasing",
        }
    }
}

/// A user's live container binding
///
/// Only the session manager builds these. Everything else receives copies, so
/// holding a `Session` never gives access to registry state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Identity used for removal; unique per start
    pub session_id: Uuid,

    /// Runtime-assigned container name, published as the route
    pub route_name: String,

    /// Host port the container is bound to
    pub port: u16,

    pub container_id: String,

    pub user_name: String,

    pub app_name: String,

    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_name: impl Into<String>,
        app_name: impl Into<String>,
        route_name: impl Into<String>,
        container_id: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            route_name: route_name.into(),
            port,
            container_id: container_id.into(),
            user_name: user_name.into(),
            app_name: app_name.into(),
            created_at: Utc::now(),
        }
    }
}
