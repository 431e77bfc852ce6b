use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{Session, SessionId};
use crate::app::constant::MAX_SWEEP_INTERVAL_SECS;

type HashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// One session's state behind its own async lock.
///
/// The lock is the per-session critical section: it may be held across
/// upstream calls without blocking other sessions.
pub struct SessionCell {
    state: Mutex<Session>,
    /// 相对于存储创建时刻的毫秒数
    last_seen: AtomicU64,
}

impl SessionCell {
    fn new(session: Session, now: u64) -> Self {
        Self { state: Mutex::new(session), last_seen: AtomicU64::new(now) }
    }

    #[inline]
    pub async fn lock(&self) -> MutexGuard<'_, Session> { self.state.lock().await }

    #[inline]
    fn touch(&self, now: u64) { self.last_seen.fetch_max(now, Ordering::Relaxed); }

    #[inline]
    fn is_busy(&self) -> bool { self.state.try_lock().is_err() }
}

/// Storage for session state, keyed by [`SessionId`].
pub trait SessionStore: Send + Sync + 'static {
    /// Existing session, refreshing its expiry.
    fn get(&self, id: &SessionId) -> Option<Arc<SessionCell>>;

    /// Existing or new session, refreshing its expiry.
    fn get_or_create(&self, id: &SessionId) -> Arc<SessionCell>;

    fn remove(&self, id: &SessionId) -> bool;

    /// Drops sessions idle past the TTL. Returns how many were removed.
    fn purge_expired(&self) -> usize;

    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool { self.len() == 0 }
}

/// In-process [`SessionStore`] with idle expiry.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<SessionCell>>>,
    ttl: Duration,
    idempotency_limit: usize,
    epoch: Instant,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration, idempotency_limit: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::default()),
            ttl,
            idempotency_limit,
            epoch: Instant::now(),
        }
    }

    #[inline]
    pub fn ttl(&self) -> Duration { self.ttl }

    #[inline]
    fn now(&self) -> u64 { self.epoch.elapsed().as_millis() as u64 }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: &SessionId) -> Option<Arc<SessionCell>> {
        let cell = self.sessions.read().get(id).cloned()?;
        cell.touch(self.now());
        Some(cell)
    }

    fn get_or_create(&self, id: &SessionId) -> Arc<SessionCell> {
        let now = self.now();
        if let Some(cell) = self.sessions.read().get(id) {
            cell.touch(now);
            return cell.clone();
        }

        let mut sessions = self.sessions.write();
        let cell = sessions
            .entry(id.clone())
            .or_insert_with(|| Arc::new(SessionCell::new(Session::new(self.idempotency_limit), now)));
        cell.touch(now);
        cell.clone()
    }

    fn remove(&self, id: &SessionId) -> bool { self.sessions.write().remove(id).is_some() }

    fn purge_expired(&self) -> usize {
        let now = self.now();
        let ttl = self.ttl.as_millis() as u64;
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        // 正在处理请求的会话保留
        sessions.retain(|_, cell| {
            now.saturating_sub(cell.last_seen.load(Ordering::Relaxed)) <= ttl || cell.is_busy()
        });
        before - sessions.len()
    }

    fn len(&self) -> usize { self.sessions.read().len() }
}

/// Periodically purges expired sessions until the runtime shuts down.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, ttl: Duration) -> JoinHandle<()> {
    let period = ttl.min(Duration::from_secs(MAX_SWEEP_INTERVAL_SECS));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // 第一次 tick 立即返回
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = store.len(), "expired sessions purged");
            }
        }
    })
}
