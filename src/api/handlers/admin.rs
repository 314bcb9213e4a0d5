//! Admin API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::api::{AdminAuth, ApiError};
use crate::models::{AdminSessionList, AdminSessionSummary, PendingStart};
use crate::runtime::ContainerInfo;
use crate::AppState;

/// List all sessions, including starts still in flight
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
) -> Json<AdminSessionList> {
    let sessions = state
        .session_manager
        .list_sessions()
        .await
        .into_iter()
        .map(AdminSessionSummary::from)
        .collect();

    let pending = state
        .session_manager
        .pending_starts()
        .await
        .into_iter()
        .map(|(user_name, status)| PendingStart { user_name, status })
        .collect();

    Json(AdminSessionList { sessions, pending })
}

/// Force-release a user's session
pub async fn terminate_session(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(user_name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.session_manager.release_session(&user_name, false).await {
        return Err(ApiError::NotFound(format!(
            "No active session for user {}",
            user_name
        )));
    }

    info!(user = %user_name, "Admin terminated session");

    Ok(StatusCode::NO_CONTENT)
}

/// Containers the runtime reports for the session image
pub async fn list_containers(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
) -> Result<Json<Vec<ContainerInfo>>, ApiError> {
    let containers = state.session_manager.list_runtime_containers().await?;
    Ok(Json(containers))
}
