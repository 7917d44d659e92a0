//! Connection status. No auth; always succeeds.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::server::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub ready: bool,
    /// Linked account id once ready, else null.
    pub me: Option<String>,
}

/// GET /status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        ready: state.ctx.is_ready(),
        me: state.ctx.account_id(),
    })
}
