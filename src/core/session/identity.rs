use alloc::sync::Arc;

use http::{HeaderMap, HeaderValue, header::COOKIE};

use crate::app::constant::{
    MAX_SESSION_ID_LEN, SESSION_COOKIE_ATTRIBUTES, SESSION_COOKIE_NAME, header::X_SESSION_ID,
};

/// Client-scoped key the relay tracks state under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Arc<str>);

impl SessionId {
    /// Mints a fresh random id.
    #[inline]
    pub fn generate() -> Self { Self(uuid::Uuid::new_v4().to_string().into()) }

    /// Accepts `value` if it is visible ASCII that fits in a cookie.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = !value.is_empty()
            && value.len() <= MAX_SESSION_ID_LEN
            && value.bytes().all(|b| b.is_ascii_graphic() && !matches!(b, b';' | b',' | b'"' | b'\\'));
        valid.then(|| Self(value.into()))
    }

    #[inline]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for SessionId {
    #[inline]
    fn from(value: &str) -> Self { Self(value.into()) }
}

impl core::fmt::Display for SessionId {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result { f.write_str(&self.0) }
}

/// Looks up the session id in `X-Session-Id`, then in the `sid` cookie.
///
/// Malformed values are ignored.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    if let Some(value) = headers.get(X_SESSION_ID) {
        match value.to_str().ok().and_then(|v| SessionId::parse(v.trim())) {
            Some(id) => return Some(id),
            None => tracing::debug!(len = value.len(), "rejected malformed X-Session-Id header"),
        }
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .and_then(|(_, value)| SessionId::parse(value.trim_matches('"')))
}

/// Returns the request's session id, and whether it was freshly minted.
#[inline]
pub fn resolve_session_id(headers: &HeaderMap) -> (SessionId, bool) {
    match session_id_from_headers(headers) {
        Some(id) => (id, false),
        None => (SessionId::generate(), true),
    }
}

/// `Set-Cookie` value carrying `id`.
#[inline]
pub fn session_cookie(id: &SessionId) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={id}; {SESSION_COOKIE_ATTRIBUTES}")).ok()
}
