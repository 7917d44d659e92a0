use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;

use crate::context::GatewayContext;
use crate::handlers;

/// Request body cap; media URLs are downloaded server-side, so payloads
/// stay small, but menu bodies can be verbose.
const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub ctx: GatewayContext,
    pub api_token: String,
    /// Client used to download media referenced by URL in /send-media.
    pub downloads: reqwest::Client,
    pub download_timeout: Duration,
}

impl AppState {
    pub fn new(ctx: GatewayContext, api_token: String, download_timeout: Duration) -> Self {
        Self {
            ctx,
            api_token,
            downloads: reqwest::Client::new(),
            download_timeout,
        }
    }
}

pub fn build_app(state: AppState, request_timeout_secs: u64) -> Router {
    Router::new()
        .route("/status", get(handlers::status))
        .route("/send", post(handlers::send))
        .route("/send-media", post(handlers::send_media))
        .route("/send-buttons", post(handlers::send_buttons))
        .route("/send-list", post(handlers::send_list))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_secs),
        ))
}
