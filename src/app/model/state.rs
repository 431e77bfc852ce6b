use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::app::config::{Config, UpstreamMode};
use crate::core::session::{MemorySessionStore, SessionManager, SessionStore};
use crate::core::source::{FragmentSource, PollingSource, StreamingSource};
use crate::core::stream::RelayGuard;
use crate::core::upstream::{AssistantApi, OpenAiClient, UpstreamError};

pub struct AppState {
    pub config: Config,
    pub api: Arc<dyn AssistantApi>,
    pub source: Arc<dyn FragmentSource>,
    pub sessions: SessionManager,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub total_requests: AtomicU64,
    pub active_requests: AtomicU64,
    pub error_requests: AtomicU64,
}

impl AppState {
    pub fn new(
        config: Config,
        api: Arc<dyn AssistantApi>,
        source: Arc<dyn FragmentSource>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            sessions: SessionManager::new(store, api.clone()),
            config,
            api,
            source,
            started_at: Utc::now(),
            started: Instant::now(),
            total_requests: AtomicU64::new(0),
            active_requests: AtomicU64::new(0),
            error_requests: AtomicU64::new(0),
        }
    }

    /// Wires the OpenAI client, the configured source and an in-memory store.
    pub fn from_config(config: Config) -> Result<Self, UpstreamError> {
        let api: Arc<dyn AssistantApi> = Arc::new(OpenAiClient::new(&config)?);
        let source: Arc<dyn FragmentSource> = match config.upstream_mode {
            UpstreamMode::Stream => Arc::new(StreamingSource),
            UpstreamMode::Poll => {
                Arc::new(PollingSource::new(config.poll.interval, config.poll.max_attempts))
            }
        };
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(
            config.session.ttl,
            config.session.idempotency_limit,
        ));
        Ok(Self::new(config, api, source, store))
    }

    #[inline]
    pub fn uptime(&self) -> Duration { self.started.elapsed() }

    /// 增加总请求计数
    #[inline(always)]
    pub fn increment_total(&self) { self.total_requests.fetch_add(1, Ordering::Relaxed); }

    /// 增加活跃请求计数
    #[inline(always)]
    pub fn increment_active(&self) { self.active_requests.fetch_add(1, Ordering::Relaxed); }

    /// 减少活跃请求计数
    #[inline(always)]
    pub fn decrement_active(&self) { self.active_requests.fetch_sub(1, Ordering::Relaxed); }

    /// 增加错误请求计数
    #[inline(always)]
    pub fn increment_error(&self) { self.error_requests.fetch_add(1, Ordering::Relaxed); }
}

/// Counts as an active request until dropped.
pub struct ActiveRequest(Arc<AppState>);

impl ActiveRequest {
    #[inline]
    pub fn new(state: Arc<AppState>) -> Self {
        state.increment_active();
        Self(state)
    }
}

impl RelayGuard for ActiveRequest {
    #[inline]
    fn failed(&self) { self.0.increment_error() }
}

impl Drop for ActiveRequest {
    #[inline]
    fn drop(&mut self) { self.0.decrement_active() }
}
