//! Outbound send handlers: text, media, button menus, list menus.
//!
//! Every handler runs the same gate sequence: token check (401), readiness
//! check (503), payload validation (400), target resolution (404), then the
//! bridge call. Unexpected bridge failures surface as 500 with the failure
//! text and are logged server-side.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::bridge::{
    BridgeError, ButtonsMessage, ListMessage, ListSection, MediaAttachment, SentMessage,
};
use crate::response;
use crate::server::AppState;

use super::token_matches;

// ============================================================================
// Request/Response Types
// ============================================================================

// Required fields are Options so a missing field produces this module's 400
// with a named field instead of a rejection from the JSON extractor.

#[derive(Deserialize)]
pub struct SendRequest {
    to: Option<String>,
    message: Option<String>,
    token: Option<String>,
}

#[derive(Deserialize)]
pub struct SendMediaRequest {
    to: Option<String>,
    url: Option<String>,
    caption: Option<String>,
    token: Option<String>,
}

#[derive(Deserialize)]
pub struct SendButtonsRequest {
    to: Option<String>,
    text: Option<String>,
    buttons: Option<Vec<String>>,
    title: Option<String>,
    footer: Option<String>,
    token: Option<String>,
}

#[derive(Deserialize)]
pub struct SendListRequest {
    to: Option<String>,
    text: Option<String>,
    /// Label on the button that opens the list.
    button: Option<String>,
    sections: Option<Vec<ListSection>>,
    title: Option<String>,
    footer: Option<String>,
    token: Option<String>,
}

#[derive(Serialize)]
pub struct SendResponse {
    to: String,
    id: Option<String>,
    ack: i32,
}

#[derive(Serialize)]
pub struct SendMediaResponse {
    to: String,
    id: Option<String>,
    ack: i32,
    filename: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /send
pub async fn send(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(req): Json<SendRequest>,
) -> Response {
    if let Err(resp) = check_access(&state, &headers, req.token.as_deref()) {
        return resp;
    }

    let (Some(to), Some(message)) = (non_empty(req.to), non_empty(req.message)) else {
        return response::bad_request(r#"Missing "to" or "message""#).into_response();
    };

    let chat_id = match resolve_target(&state, &to).await {
        Ok(chat_id) => chat_id,
        Err(resp) => return resp,
    };

    match state.ctx.bridge().send_text(&chat_id, &message).await {
        Ok(sent) => sent_response(chat_id, sent),
        Err(e) => bridge_failure(e),
    }
}

/// POST /send-media
pub async fn send_media(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(req): Json<SendMediaRequest>,
) -> Response {
    if let Err(resp) = check_access(&state, &headers, req.token.as_deref()) {
        return resp;
    }

    let (Some(to), Some(url)) = (non_empty(req.to), non_empty(req.url)) else {
        return response::bad_request(r#"Missing "to" or "url""#).into_response();
    };

    let chat_id = match resolve_target(&state, &to).await {
        Ok(chat_id) => chat_id,
        Err(resp) => return resp,
    };

    // The download is the only step with its own timeout; the bridge call
    // keeps the bridge client's.
    let downloaded =
        tokio::time::timeout(state.download_timeout, fetch_media(&state.downloads, &url)).await;
    let (bytes, mimetype) = match downloaded {
        Ok(Ok(Download::Content { bytes, mimetype })) => (bytes, mimetype),
        Ok(Ok(Download::BadStatus(status))) => {
            return response::bad_request(format!("Download failed: {status}")).into_response();
        }
        Ok(Err(e)) => {
            error!(error = %e, %url, "media download failed");
            return response::internal_error(e.to_string()).into_response();
        }
        Err(_) => {
            error!(%url, "media download timed out");
            return response::internal_error("Download timed out").into_response();
        }
    };

    let filename = filename_from_url(&url);
    let media = MediaAttachment {
        mimetype,
        filename: filename.clone(),
        data: BASE64.encode(&bytes),
    };

    match state
        .ctx
        .bridge()
        .send_media(&chat_id, &media, req.caption.as_deref())
        .await
    {
        Ok(sent) => (
            StatusCode::OK,
            Json(SendMediaResponse {
                to: chat_id,
                id: sent.id,
                ack: sent.ack,
                filename,
            }),
        )
            .into_response(),
        Err(e) => bridge_failure(e),
    }
}

/// POST /send-buttons
pub async fn send_buttons(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(req): Json<SendButtonsRequest>,
) -> Response {
    if let Err(resp) = check_access(&state, &headers, req.token.as_deref()) {
        return resp;
    }

    let (Some(to), Some(text)) = (non_empty(req.to), non_empty(req.text)) else {
        return response::bad_request(r#"Missing "to", "text" or non-empty "buttons" array"#)
            .into_response();
    };
    let Some(buttons) = req.buttons.filter(|b| !b.is_empty()) else {
        return response::bad_request(r#"Missing "to", "text" or non-empty "buttons" array"#)
            .into_response();
    };

    let chat_id = match resolve_target(&state, &to).await {
        Ok(chat_id) => chat_id,
        Err(resp) => return resp,
    };

    let message = ButtonsMessage {
        text,
        buttons,
        title: req.title,
        footer: req.footer,
    };
    match state.ctx.bridge().send_buttons(&chat_id, &message).await {
        Ok(sent) => sent_response(chat_id, sent),
        Err(e) => bridge_failure(e),
    }
}

/// POST /send-list
pub async fn send_list(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(req): Json<SendListRequest>,
) -> Response {
    if let Err(resp) = check_access(&state, &headers, req.token.as_deref()) {
        return resp;
    }

    let (Some(to), Some(text)) = (non_empty(req.to), non_empty(req.text)) else {
        return response::bad_request(r#"Missing "to", "text" or non-empty "sections" array"#)
            .into_response();
    };
    let Some(sections) = req.sections.filter(|s| !s.is_empty()) else {
        return response::bad_request(r#"Missing "to", "text" or non-empty "sections" array"#)
            .into_response();
    };

    let chat_id = match resolve_target(&state, &to).await {
        Ok(chat_id) => chat_id,
        Err(resp) => return resp,
    };

    let message = ListMessage {
        text,
        button: req.button.unwrap_or_else(|| "Select".to_string()),
        sections,
        title: req.title,
        footer: req.footer,
    };
    match state.ctx.bridge().send_list(&chat_id, &message).await {
        Ok(sent) => sent_response(chat_id, sent),
        Err(e) => bridge_failure(e),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Token and readiness gates shared by every send handler. The token is
/// checked first so an invalid caller learns nothing about gateway state.
fn check_access(
    state: &AppState,
    headers: &axum::http::HeaderMap,
    body_token: Option<&str>,
) -> Result<(), Response> {
    if !token_matches(headers, body_token, &state.api_token) {
        return Err(response::unauthorized().into_response());
    }
    if !state.ctx.is_ready() {
        return Err(response::service_unavailable("Client not ready").into_response());
    }
    Ok(())
}

/// Canonical chat id for a user-supplied phone number; 404 when the number
/// has no account on the platform.
async fn resolve_target(state: &AppState, to: &str) -> Result<String, Response> {
    match state.ctx.bridge().resolve_number(to).await {
        Ok(Some(chat_id)) => Ok(chat_id),
        Ok(None) => Err(response::not_found("Number is not on WhatsApp").into_response()),
        Err(e) => Err(bridge_failure(e)),
    }
}

fn sent_response(chat_id: String, sent: SentMessage) -> Response {
    (
        StatusCode::OK,
        Json(SendResponse {
            to: chat_id,
            id: sent.id,
            ack: sent.ack,
        }),
    )
        .into_response()
}

fn bridge_failure(e: BridgeError) -> Response {
    error!(error = %e, "bridge call failed");
    response::internal_error(e.to_string()).into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

enum Download {
    Content { bytes: Bytes, mimetype: String },
    BadStatus(u16),
}

async fn fetch_media(client: &reqwest::Client, url: &str) -> Result<Download, reqwest::Error> {
    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Ok(Download::BadStatus(resp.status().as_u16()));
    }
    let mimetype = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_owned();
    let bytes = resp.bytes().await?;
    Ok(Download::Content { bytes, mimetype })
}

/// Last path segment of the URL with the query string stripped; `"file"`
/// when there is none.
fn filename_from_url(raw: &str) -> String {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_owned))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "file".to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_strips_query_string() {
        assert_eq!(
            filename_from_url("https://example.com/img/photo.png?x=1"),
            "photo.png"
        );
    }

    #[test]
    fn filename_is_last_path_segment() {
        assert_eq!(
            filename_from_url("https://example.com/a/b/report.pdf"),
            "report.pdf"
        );
    }

    #[test]
    fn filename_defaults_for_bare_host() {
        assert_eq!(filename_from_url("https://example.com/"), "file");
        assert_eq!(filename_from_url("https://example.com"), "file");
    }

    #[test]
    fn filename_defaults_for_unparseable_url() {
        assert_eq!(filename_from_url("not a url"), "file");
    }

    #[test]
    fn non_empty_rejects_empty_strings() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("x".into())), Some("x".into()));
    }
}
