use alloc::sync::Arc;

use axum::{
    Router,
    middleware::map_response,
    response::{IntoResponse as _, Response},
    routing::{get, post},
};
use http::{StatusCode, header::CONTENT_TYPE};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

use super::{
    constant::{ROUTE_CHAT_PATH, ROUTE_HEALTH_PATH, ROUTE_THREAD_PATH},
    model::AppState,
};
use crate::{
    common::model::error::ChatError,
    core::{
        route::{handle_health, handle_thread},
        service::handle_chat,
    },
};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(ROUTE_CHAT_PATH, post(handle_chat))
        .route(ROUTE_THREAD_PATH, get(handle_thread))
        .route(ROUTE_HEALTH_PATH, get(handle_health))
        .layer(RequestBodyLimitLayer::new(state.config.request_body_limit))
        .layer(map_response(json_length_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 请求体超限时 `RequestBodyLimitLayer` 直接返回纯文本，此处改写为 JSON
async fn json_length_limit(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE && !is_json {
        return ChatError::PayloadTooLarge.into_response();
    }
    response
}
