use alloc::sync::Arc;
use core::convert::Infallible;

use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse as _, Response},
};
use bytes::Bytes;
use http::{
    HeaderMap, HeaderValue,
    header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE, SET_COOKIE},
};
use serde::Deserialize;

use crate::{
    app::{
        constant::header::{EVENT_STREAM, IDEMPOTENCY_KEY, KEEP_ALIVE, NO_CACHE, X_SESSION_ID},
        model::{ActiveRequest, AppState},
    },
    common::model::error::ChatError,
    core::{
        session::{SessionId, resolve_session_id, session_cookie},
        source::FragmentStream,
        stream::relay,
    },
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    /// Client-chosen token identifying this submission.
    #[serde(default, alias = "idempotency_token")]
    pub idempotency_token: Option<String>,
}

/// `POST /chat`: submits the message and streams the reply as SSE.
pub async fn handle_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    state.increment_total();
    let (session, minted) = resolve_session_id(&headers);

    let opened = match request {
        Ok(Json(request)) => {
            // body 中的 token 优先于请求头
            let header_token = headers.get(IDEMPOTENCY_KEY).and_then(|v| v.to_str().ok());
            let token = request.idempotency_token.as_deref().or(header_token);
            open_chat(&state, &session, &request.message, token).await
        }
        Err(rejection) => Err(ChatError::from(rejection)),
    };

    let mut response = match opened {
        Ok(events) => sse_response(relay(events, ActiveRequest::new(state.clone()))),
        Err(e) => {
            if e.is_failure() {
                state.increment_error();
                tracing::warn!(session = %session, error = %e, "chat request failed");
            }
            e.into_response()
        }
    };

    attach_session(response.headers_mut(), &session, minted);
    response
}

/// Everything that must succeed before the first frame is written.
async fn open_chat(
    state: &Arc<AppState>,
    session: &SessionId,
    message: &str,
    token: Option<&str>,
) -> Result<FragmentStream, ChatError> {
    if message.trim().is_empty() {
        return Err(ChatError::EmptyMessage);
    }

    state.sessions.check_and_record_idempotency(session, token).await?;
    let thread = state.sessions.resolve_conversation(session).await?;
    state.api.add_user_message(&thread, message).await?;
    state.sessions.record_submission(session).await;

    tracing::debug!(session = %session, thread = %thread, source = state.source.name(), "opening run");
    Ok(state.source.open(state.api.clone(), thread).await?)
}

fn sse_response<S>(stream: S) -> Response
where S: futures_core::Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, EVENT_STREAM);
    headers.insert(CACHE_CONTROL, NO_CACHE);
    headers.insert(CONNECTION, KEEP_ALIVE);
    response
}

/// Echoes the session id; a freshly minted one is also set as a cookie.
fn attach_session(headers: &mut HeaderMap, session: &SessionId, minted: bool) {
    if let Ok(value) = HeaderValue::from_str(session.as_str()) {
        headers.insert(X_SESSION_ID, value);
    }
    if minted && let Some(cookie) = session_cookie(session) {
        headers.append(SET_COOKIE, cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_shapes() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","idempotencyToken":"t-1"}"#).unwrap();
        assert_eq!(request.idempotency_token.as_deref(), Some("t-1"));

        let request: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(request.idempotency_token, None);
    }

    #[test]
    fn test_minted_session_sets_cookie() {
        let mut headers = HeaderMap::new();
        attach_session(&mut headers, &SessionId::from("abc"), true);
        assert_eq!(headers[X_SESSION_ID], "abc");
        assert_eq!(headers[SET_COOKIE], "sid=abc; Path=/; HttpOnly; SameSite=Lax");

        let mut headers = HeaderMap::new();
        attach_session(&mut headers, &SessionId::from("abc"), false);
        assert!(headers.get(SET_COOKIE).is_none());
    }
}
