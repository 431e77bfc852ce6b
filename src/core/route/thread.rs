use alloc::sync::Arc;

use axum::{Json, extract::State};
use http::HeaderMap;

use crate::{
    app::model::AppState,
    common::model::error::ChatError,
    core::session::{Conversation, session_id_from_headers},
};

/// Metadata of the caller's conversation, or 404 if it has none yet.
pub async fn handle_thread(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Conversation>, ChatError> {
    let session = session_id_from_headers(&headers).ok_or(ChatError::ConversationNotFound)?;
    state.sessions.conversation(&session).await.map(Json).ok_or(ChatError::ConversationNotFound)
}
