//! Per-session conversation binding and duplicate-submission suppression.

mod identity;
mod store;

use alloc::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;

pub use identity::{SessionId, resolve_session_id, session_cookie, session_id_from_headers};
pub use store::{MemorySessionStore, SessionCell, SessionStore, spawn_sweeper};

use crate::core::upstream::{AssistantApi, UpstreamError};

/// Opaque reference to an upstream conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConversationHandle(Arc<str>);

impl ConversationHandle {
    #[inline]
    pub fn new(id: impl Into<Arc<str>>) -> Self { Self(id.into()) }

    #[inline]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl core::fmt::Display for ConversationHandle {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result { f.write_str(&self.0) }
}

/// The conversation bound to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "threadId")]
    pub handle: ConversationHandle,
    pub created_at: DateTime<Utc>,
    /// Messages submitted through this relay.
    pub messages: u64,
}

/// Idempotency tokens already accepted for a session.
///
/// Bounded; the oldest token is forgotten first once the limit is reached.
#[derive(Debug)]
pub struct IdempotencyRecord {
    tokens: IndexSet<Box<str>, ahash::RandomState>,
    limit: usize,
}

impl IdempotencyRecord {
    pub fn new(limit: usize) -> Self {
        Self { tokens: IndexSet::with_hasher(ahash::RandomState::new()), limit: limit.max(1) }
    }

    #[inline]
    pub fn contains(&self, token: &str) -> bool { self.tokens.contains(token) }

    /// Records `token`, returning `false` if it was already present.
    pub fn record(&mut self, token: &str) -> bool {
        if self.tokens.contains(token) {
            return false;
        }
        if self.tokens.len() >= self.limit {
            self.tokens.shift_remove_index(0);
        }
        self.tokens.insert(token.into())
    }

    #[inline]
    pub fn len(&self) -> usize { self.tokens.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.tokens.is_empty() }
}

/// Mutable state of one session, guarded by its [`SessionCell`].
#[derive(Debug)]
pub struct Session {
    pub conversation: Option<Conversation>,
    pub idempotency: IdempotencyRecord,
}

impl Session {
    #[inline]
    pub fn new(idempotency_limit: usize) -> Self {
        Self { conversation: None, idempotency: IdempotencyRecord::new(idempotency_limit) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("duplicate message")]
    DuplicateMessage,
}

/// Binds sessions to conversations and filters repeated submissions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    api: Arc<dyn AssistantApi>,
}

impl SessionManager {
    #[inline]
    pub fn new(store: Arc<dyn SessionStore>, api: Arc<dyn AssistantApi>) -> Self { Self { store, api } }

    #[inline]
    pub fn store(&self) -> &Arc<dyn SessionStore> { &self.store }

    /// Rejects a token already accepted for `session`, otherwise records it.
    ///
    /// Absent or empty tokens always proceed and are never recorded.
    pub async fn check_and_record_idempotency(
        &self,
        session: &SessionId,
        token: Option<&str>,
    ) -> Result<(), SessionError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(());
        };

        let cell = self.store.get_or_create(session);
        let mut state = cell.lock().await;
        if state.idempotency.record(token) {
            Ok(())
        } else {
            tracing::debug!(session = %session, "duplicate submission rejected");
            Err(SessionError::DuplicateMessage)
        }
    }

    /// Returns the session's conversation, creating it upstream on first use.
    ///
    /// The session lock is held across creation, so concurrent first
    /// requests of one session share a single upstream thread.
    pub async fn resolve_conversation(
        &self,
        session: &SessionId,
    ) -> Result<ConversationHandle, UpstreamError> {
        let cell = self.store.get_or_create(session);
        let mut state = cell.lock().await;

        if let Some(conversation) = &state.conversation {
            return Ok(conversation.handle.clone());
        }

        let handle = self.api.create_thread().await?;
        tracing::info!(session = %session, thread = %handle, "conversation created");
        state.conversation =
            Some(Conversation { handle: handle.clone(), created_at: Utc::now(), messages: 0 });
        Ok(handle)
    }

    /// Counts a message submitted to the session's conversation.
    pub async fn record_submission(&self, session: &SessionId) {
        if let Some(cell) = self.store.get(session) {
            let mut state = cell.lock().await;
            if let Some(conversation) = state.conversation.as_mut() {
                conversation.messages += 1;
            }
        }
    }

    /// Snapshot of the session's conversation, without creating anything.
    pub async fn conversation(&self, session: &SessionId) -> Option<Conversation> {
        let cell = self.store.get(session)?;
        let state = cell.lock().await;
        state.conversation.clone()
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};
    use core::time::Duration;

    use super::*;
    use crate::core::upstream::{ByteStream, Run};

    #[derive(Default)]
    struct CountingApi {
        created: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AssistantApi for CountingApi {
        async fn create_thread(&self) -> Result<ConversationHandle, UpstreamError> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            // 放大竞争窗口
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(ConversationHandle::new(format!("thread_{n}")))
        }

        async fn add_user_message(
            &self,
            _: &ConversationHandle,
            _: &str,
        ) -> Result<(), UpstreamError> {
            Ok(())
        }

        async fn stream_run(&self, _: &ConversationHandle) -> Result<ByteStream, UpstreamError> {
            unimplemented!()
        }

        async fn create_run(&self, _: &ConversationHandle) -> Result<Run, UpstreamError> {
            unimplemented!()
        }

        async fn retrieve_run(&self, _: &ConversationHandle, _: &str) -> Result<Run, UpstreamError> {
            unimplemented!()
        }

        async fn latest_reply(
            &self,
            _: &ConversationHandle,
            _: &str,
        ) -> Result<Option<String>, UpstreamError> {
            unimplemented!()
        }
    }

    fn manager() -> (SessionManager, Arc<CountingApi>) {
        let api = Arc::new(CountingApi::default());
        let store = Arc::new(MemorySessionStore::new(Duration::from_secs(60), 4));
        (SessionManager::new(store, api.clone()), api)
    }

    #[tokio::test]
    async fn test_concurrent_resolve_creates_one_conversation() {
        let (manager, api) = manager();
        let id = SessionId::from("session-a");

        let (a, b, c) = tokio::join!(
            manager.resolve_conversation(&id),
            manager.resolve_conversation(&id),
            manager.resolve_conversation(&id),
        );

        assert_eq!(api.created.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(c.unwrap().as_str(), "thread_0");
    }

    #[tokio::test]
    async fn test_sessions_get_distinct_conversations() {
        let (manager, api) = manager();
        let a = manager.resolve_conversation(&SessionId::from("a")).await.unwrap();
        let b = manager.resolve_conversation(&SessionId::from("b")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(api.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_idempotency_tokens() {
        let (manager, _) = manager();
        let id = SessionId::from("s");

        assert_eq!(manager.check_and_record_idempotency(&id, Some("t1")).await, Ok(()));
        assert_eq!(
            manager.check_and_record_idempotency(&id, Some("t1")).await,
            Err(SessionError::DuplicateMessage)
        );
        // 其他会话不受影响
        let other = SessionId::from("other");
        assert_eq!(manager.check_and_record_idempotency(&other, Some("t1")).await, Ok(()));
    }

    #[tokio::test]
    async fn test_empty_token_always_proceeds() {
        let (manager, _) = manager();
        let id = SessionId::from("s");
        for _ in 0..3 {
            assert_eq!(manager.check_and_record_idempotency(&id, Some("")).await, Ok(()));
            assert_eq!(manager.check_and_record_idempotency(&id, None).await, Ok(()));
        }
    }

    #[tokio::test]
    async fn test_concurrent_same_token_passes_once() {
        let (manager, _) = manager();
        let id = SessionId::from("s");
        let results = futures_util::future::join_all(
            (0..8).map(|_| manager.check_and_record_idempotency(&id, Some("same"))),
        )
        .await;
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[tokio::test]
    async fn test_conversation_snapshot() {
        let (manager, _) = manager();
        let id = SessionId::from("s");
        assert_eq!(manager.conversation(&id).await, None);

        let handle = manager.resolve_conversation(&id).await.unwrap();
        manager.record_submission(&id).await;
        manager.record_submission(&id).await;

        let snapshot = manager.conversation(&id).await.unwrap();
        assert_eq!(snapshot.handle, handle);
        assert_eq!(snapshot.messages, 2);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["threadId"], "thread_0");
        assert_eq!(json["messages"], 2);
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn test_idempotency_record_evicts_oldest() {
        let mut record = IdempotencyRecord::new(2);
        assert!(record.is_empty());
        assert!(record.record("a"));
        assert!(record.record("b"));
        assert!(!record.record("a"));
        assert!(record.record("c"));
        assert_eq!(record.len(), 2);
        assert!(!record.contains("a"));
        assert!(record.contains("b") && record.contains("c"));
    }
}
