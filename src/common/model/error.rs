use alloc::borrow::Cow;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use super::ErrorBody;
use crate::core::session::SessionError;
use crate::core::upstream::UpstreamError;

/// Failures reported to the client before any stream frame has been written.
///
/// Once streaming has started, failures are written into the stream instead.
#[derive(Debug)]
pub enum ChatError {
    /// The body was not a valid chat request.
    InvalidRequest(String),

    /// The body exceeded the configured size limit.
    PayloadTooLarge,

    /// The request carried no message text.
    EmptyMessage,

    /// The idempotency token was already accepted for this session.
    DuplicateMessage,

    /// `GET /thread` for a session that has no conversation yet.
    ConversationNotFound,

    /// Talking to the assistant service failed before streaming began.
    Upstream(UpstreamError),
}

impl ChatError {
    /// Returns the HTTP status code for this error
    #[inline]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::EmptyMessage => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            // 重复提交不是错误响应，客户端据此忽略
            Self::DuplicateMessage => StatusCode::OK,
            Self::ConversationNotFound => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error type identifier
    #[inline]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::PayloadTooLarge => "payload_too_large",
            Self::EmptyMessage => "empty_message",
            Self::DuplicateMessage => "duplicate",
            Self::ConversationNotFound => "not_found",
            Self::Upstream(_) => "upstream_error",
        }
    }

    /// Whether this outcome counts against the error counter.
    #[inline]
    pub fn is_failure(&self) -> bool { !matches!(self, Self::DuplicateMessage) }

    #[inline]
    pub fn into_body(self) -> ErrorBody {
        match self {
            Self::DuplicateMessage => ErrorBody::from_static("duplicate"),
            other => ErrorBody::new(Cow::Owned(other.to_string())),
        }
    }

    #[inline]
    pub fn into_tuple(self) -> (StatusCode, Json<ErrorBody>) {
        (self.status_code(), Json(self.into_body()))
    }
}

impl core::fmt::Display for ChatError {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidRequest(reason) => write!(f, "invalid request body: {reason}"),
            Self::PayloadTooLarge => f.write_str("request body too large"),
            Self::EmptyMessage => f.write_str("message must not be empty"),
            Self::DuplicateMessage => f.write_str("duplicate"),
            Self::ConversationNotFound => f.write_str("no conversation for this session"),
            Self::Upstream(err) => write!(f, "failed to process message: {err}"),
        }
    }
}

impl core::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Upstream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UpstreamError> for ChatError {
    #[inline]
    fn from(err: UpstreamError) -> Self { Self::Upstream(err) }
}

impl From<JsonRejection> for ChatError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::InvalidRequest(rejection.body_text())
        }
    }
}

impl From<SessionError> for ChatError {
    #[inline]
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::DuplicateMessage => Self::DuplicateMessage,
        }
    }
}

impl IntoResponse for ChatError {
    #[inline]
    fn into_response(self) -> Response { self.into_tuple().into_response() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_is_ok_with_fixed_body() {
        let err = ChatError::DuplicateMessage;
        assert_eq!(err.status_code(), StatusCode::OK);
        assert!(!err.is_failure());
        assert_eq!(err.into_body(), ErrorBody::from_static("duplicate"));
    }

    #[test]
    fn test_request_errors_are_client_errors() {
        let err = ChatError::InvalidRequest("missing field `message`".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.into_body().error, "invalid request body: missing field `message`");

        let err = ChatError::PayloadTooLarge;
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.error_type(), "payload_too_large");
    }

    #[test]
    fn test_upstream_maps_to_internal_error() {
        let err = ChatError::from(UpstreamError::PollTimeout { attempts: 3 });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_type(), "upstream_error");
        let body = serde_json::to_value(err.into_body()).unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("failed to process message"));
    }
}
