use http::header::{HeaderName, HeaderValue};

crate::define_typed_constants! {
    pub HeaderValue => {
        EVENT_STREAM = HeaderValue::from_static("text/event-stream"),
        NO_CACHE = HeaderValue::from_static("no-cache"),
        KEEP_ALIVE = HeaderValue::from_static("keep-alive"),
    }
    pub HeaderName => {
        /// Explicit session id, takes precedence over the cookie
        X_SESSION_ID = HeaderName::from_static("x-session-id"),
        IDEMPOTENCY_KEY = HeaderName::from_static("idempotency-key"),
        OPENAI_BETA = HeaderName::from_static("openai-beta"),
    }
}
