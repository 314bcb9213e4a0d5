//! Session lifecycle errors

use thiserror::Error;

use crate::runtime::RuntimeError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unknown application: {0}")]
    UnknownApplication(String),

    #[error("User {0} already has a running or starting session")]
    DuplicateSession(String),

    #[error("Failed to start container: {0}")]
    ContainerStart(#[source] RuntimeError),

    #[error("Container {route_name} did not respond within {attempts} attempts")]
    ReadinessTimeout { route_name: String, attempts: u32 },

    /// Stop or remove failed while releasing; logged, never returned to callers
    #[error("Failed to tear down container {container_id}: {source}")]
    Teardown {
        container_id: String,
        #[source]
        source: RuntimeError,
    },

    #[error("No free port at or above {0}")]
    PortsExhausted(u16),

    #[error("Session manager is shutting down")]
    ShuttingDown,
}

impl SessionError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::UnknownApplication(_) => "unknown_application",
            SessionError::DuplicateSession(_) => "duplicate_session",
            SessionError::ContainerStart(_) => "container_start",
            SessionError::ReadinessTimeout { .. } => "readiness_timeout",
            SessionError::Teardown { .. } => "teardown",
            SessionError::PortsExhausted(_) => "ports_exhausted",
            SessionError::ShuttingDown => "shutting_down",
        }
    }
}
