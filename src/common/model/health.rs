use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub upstream_mode: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub requests: RequestStats,
    pub sessions: usize,
}

#[derive(Serialize)]
pub struct RequestStats {
    pub total: u64,
    pub active: u64,
    pub errors: u64,
}
