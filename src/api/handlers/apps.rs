//! Application catalog handler

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::api::UserAuth;
use crate::models::AppSummary;
use crate::AppState;

/// List launchable applications
pub async fn list_apps(
    State(state): State<Arc<AppState>>,
    _auth: UserAuth,
) -> Json<Vec<AppSummary>> {
    let apps = state
        .session_manager
        .catalog()
        .list()
        .into_iter()
        .map(AppSummary::from)
        .collect();

    Json(apps)
}
