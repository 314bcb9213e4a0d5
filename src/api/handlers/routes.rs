//! Published route listing

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::models::RouteEntry;
use crate::AppState;

pub async fn list_routes(State(state): State<Arc<AppState>>) -> Json<Vec<RouteEntry>> {
    Json(state.route_table.entries().await)
}
