//! Session mapping handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::api::{ApiError, UserAuth};
use crate::models::MappingResponse;
use crate::AppState;

/// Resolve (starting if needed) the caller's session for an application
pub async fn get_mapping(
    State(state): State<Arc<AppState>>,
    auth: UserAuth,
    Path(app_name): Path<String>,
) -> Result<Json<MappingResponse>, ApiError> {
    let route_name = state
        .session_manager
        .get_mapping(&auth.user_name, &app_name)
        .await?;

    let target = state
        .route_table
        .resolve(&route_name)
        .await
        .map(|url| url.to_string());

    Ok(Json(MappingResponse {
        route_name,
        app_name,
        target,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReleaseQuery {
    /// Tear the container down before answering
    #[serde(default)]
    pub wait: bool,
}

/// Release the caller's session
pub async fn release_session(
    State(state): State<Arc<AppState>>,
    auth: UserAuth,
    Query(query): Query<ReleaseQuery>,
) -> StatusCode {
    let released = state
        .session_manager
        .release_session(&auth.user_name, !query.wait)
        .await;

    if released {
        info!(user = %auth.user_name, "Session released by user");
    }

    StatusCode::NO_CONTENT
}
