//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::runtime::RuntimeError;
use crate::session::SessionError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Container runtime error: {0}")]
    BadGateway(String),

    #[error("Timed out: {0}")]
    GatewayTimeout(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                self.to_string(),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "RUNTIME_ERROR", msg.clone()),
            ApiError::GatewayTimeout(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                "NOT_READY",
                msg.clone(),
            ),
            ApiError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                msg.clone(),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = Json(ErrorResponse::new(error_code, message));
        (status, body).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UnknownApplication(_) => ApiError::NotFound(err.to_string()),
            SessionError::DuplicateSession(_) => ApiError::Conflict(err.to_string()),
            SessionError::ContainerStart(_) | SessionError::Teardown { .. } => {
                tracing::error!(error = %err, "Container runtime failure");
                ApiError::BadGateway(err.to_string())
            }
            SessionError::ReadinessTimeout { .. } => ApiError::GatewayTimeout(err.to_string()),
            SessionError::PortsExhausted(_) | SessionError::ShuttingDown => {
                ApiError::Unavailable(err.to_string())
            }
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        tracing::error!(error = %err, "Container runtime failure");
        ApiError::BadGateway(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "Internal error");
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_status_codes() {
        let cases = [
            (SessionError::UnknownApplication("x".into()), StatusCode::NOT_FOUND),
            (SessionError::DuplicateSession("alice".into()), StatusCode::CONFLICT),
            (
                SessionError::ContainerStart(RuntimeError::daemon("create", "boom")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                SessionError::ReadinessTimeout {
                    route_name: "r".into(),
                    attempts: 20,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (SessionError::PortsExhausted(20000), StatusCode::SERVICE_UNAVAILABLE),
            (SessionError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
