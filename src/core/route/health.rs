use alloc::sync::Arc;
use core::sync::atomic::Ordering::Relaxed;

use axum::{Json, extract::State};

use crate::{
    app::{
        constant::{PKG_NAME, PKG_VERSION},
        model::AppState,
    },
    common::model::health::{HealthCheckResponse, RequestStats},
};

pub async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "success",
        service: PKG_NAME,
        version: PKG_VERSION,
        upstream_mode: state.source.name(),
        started_at: state.started_at,
        uptime_seconds: state.uptime().as_secs(),
        requests: RequestStats {
            total: state.total_requests.load(Relaxed),
            active: state.active_requests.load(Relaxed),
            errors: state.error_requests.load(Relaxed),
        },
        sessions: state.sessions.store().len(),
    })
}
