//! Prometheus metrics export
//!
//! Provides metrics endpoint for monitoring and alerting

use std::sync::Arc;

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::AppState;

/// Prometheus metrics recorder
static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder; later calls are no-ops
pub fn init_metrics() -> Result<()> {
    METRICS_HANDLE.get_or_try_init(|| -> Result<PrometheusHandle> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("sessiond_session_start_seconds".to_string()),
                &[0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0],
            )?
            .install_recorder()?;
        Ok(handle)
    })?;
    Ok(())
}

/// Record a session that became active
pub fn record_session_started(app: &str, duration_secs: f64) {
    counter!("sessiond_sessions_started_total", "app" => app.to_string()).increment(1);
    histogram!("sessiond_session_start_seconds", "app" => app.to_string()).record(duration_secs);
}

/// Record a failed start by reason
pub fn record_start_failure(app: &str, reason: &str) {
    counter!("sessiond_session_start_failures_total", "app" => app.to_string(), "reason" => reason.to_string()).increment(1);
}

/// Record a container that never answered its readiness probe
pub fn record_probe_failure(app: &str) {
    counter!("sessiond_probe_failures_total", "app" => app.to_string()).increment(1);
}

/// Record session release
pub fn record_session_released(app: &str) {
    counter!("sessiond_sessions_released_total", "app" => app.to_string()).increment(1);
}

pub fn record_teardown_failure() {
    counter!("sessiond_teardown_failures_total").increment(1);
}

/// Prometheus metrics endpoint handler
///
/// Gauges are sampled from the session manager at scrape time.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    gauge!("sessiond_active_sessions").set(state.session_manager.active_session_count().await as f64);
    gauge!("sessiond_occupied_ports").set(state.session_manager.ports().occupied().await.len() as f64);

    let metrics = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics,
    )
}
