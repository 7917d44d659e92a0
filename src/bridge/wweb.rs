//! HTTP client for the whatsapp-web.js bridge sidecar.
//!
//! All platform operations go through this client. Lifecycle and message
//! events are pulled from the sidecar's `/events/poll` long-polling endpoint
//! by a background task.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    BridgeError, BridgeEvent, ButtonsMessage, ListMessage, MediaAttachment, SentMessage,
    SessionSettings, WhatsAppBridge,
};

/// HTTP connect timeout for the sidecar client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Long-poll timeout; must exceed the sidecar's own poll window.
const POLL_TIMEOUT_SECS: u64 = 60;

/// Maximum reconnect backoff for the event listener (milliseconds).
const MAX_BACKOFF_MS: u64 = 30_000;

/// Capacity of the event channel handed to the gateway.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Response envelope from the sidecar HTTP API.
#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Client for the whatsapp-web.js bridge sidecar.
pub struct WwebBridge {
    client: reqwest::Client,
    base_url: String,
}

impl WwebBridge {
    /// Create a client for the sidecar at `base_url` with the given
    /// per-request timeout.
    pub fn new(base_url: String, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Self { client, base_url }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, BridgeError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let resp = self.client.post(&url).json(body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Api { status, message });
        }
        let envelope: Envelope<T> = resp.json().await?;
        if !envelope.success {
            return Err(BridgeError::Protocol(
                envelope
                    .error
                    .unwrap_or_else(|| "sidecar reported failure without detail".to_owned()),
            ));
        }
        envelope
            .data
            .ok_or_else(|| BridgeError::Protocol("sidecar response missing data".to_owned()))
    }

    /// POST where the sidecar returns no payload, only success/error.
    async fn post_ok<B>(&self, path: &str, body: &B) -> Result<(), BridgeError>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        let resp = self.client.post(&url).json(body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Api { status, message });
        }
        let envelope: Envelope<serde_json::Value> = resp.json().await?;
        if !envelope.success {
            return Err(BridgeError::Protocol(
                envelope
                    .error
                    .unwrap_or_else(|| "sidecar reported failure without detail".to_owned()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl WhatsAppBridge for WwebBridge {
    async fn initialize(
        &self,
        session: &SessionSettings,
    ) -> Result<mpsc::Receiver<BridgeEvent>, BridgeError> {
        self.post_ok("/init", session).await?;
        info!(data_dir = %session.data_dir.display(), client_id = %session.client_id,
            "whatsapp client initializing");

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let _listener = spawn_event_listener(self.base_url.clone(), event_tx);
        Ok(event_rx)
    }

    async fn resolve_number(&self, number: &str) -> Result<Option<String>, BridgeError> {
        // data is null when the number has no account on the platform.
        let url = format!("{}/number/{number}", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Api { status, message });
        }
        let envelope: Envelope<String> = resp.json().await?;
        if !envelope.success {
            return Err(BridgeError::Protocol(
                envelope
                    .error
                    .unwrap_or_else(|| "sidecar reported failure without detail".to_owned()),
            ));
        }
        Ok(envelope.data)
    }

    async fn send_text(&self, chat_id: &str, body: &str) -> Result<SentMessage, BridgeError> {
        self.post(
            "/send-text",
            &serde_json::json!({ "chat_id": chat_id, "body": body }),
        )
        .await
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: &MediaAttachment,
        caption: Option<&str>,
    ) -> Result<SentMessage, BridgeError> {
        self.post(
            "/send-media",
            &serde_json::json!({ "chat_id": chat_id, "media": media, "caption": caption }),
        )
        .await
    }

    async fn send_buttons(
        &self,
        chat_id: &str,
        message: &ButtonsMessage,
    ) -> Result<SentMessage, BridgeError> {
        self.post(
            "/send-buttons",
            &serde_json::json!({ "chat_id": chat_id, "message": message }),
        )
        .await
    }

    async fn send_list(
        &self,
        chat_id: &str,
        message: &ListMessage,
    ) -> Result<SentMessage, BridgeError> {
        self.post(
            "/send-list",
            &serde_json::json!({ "chat_id": chat_id, "message": message }),
        )
        .await
    }

    async fn close_browser(&self) -> Result<(), BridgeError> {
        self.post_ok("/browser/close", &serde_json::json!({})).await
    }

    async fn destroy(&self) -> Result<(), BridgeError> {
        self.post_ok("/destroy", &serde_json::json!({})).await
    }
}

/// Spawn a listener that long-polls the sidecar and forwards events to the
/// given channel. Reconnects with exponential backoff on network errors;
/// stops when the receiver is dropped.
fn spawn_event_listener(
    base_url: String,
    event_tx: mpsc::Sender<BridgeEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let poll_url = format!("{base_url}/events/poll");
        let mut backoff_ms: u64 = 1000;

        loop {
            debug!(url = %poll_url, "connecting to bridge event stream");

            match poll_events(&poll_url, &event_tx).await {
                Ok(()) => {
                    info!("bridge event stream closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "bridge event stream error, reconnecting");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                }
            }
        }
    })
}

/// Poll the sidecar for events in a loop. Returns `Err` on non-timeout
/// network errors so the caller can reconnect with backoff.
async fn poll_events(
    poll_url: &str,
    event_tx: &mpsc::Sender<BridgeEvent>,
) -> Result<(), BridgeError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(POLL_TIMEOUT_SECS))
        .build()?;

    loop {
        match client.get(poll_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let events: Vec<BridgeEvent> = match resp.json().await {
                    Ok(events) => events,
                    Err(e) => {
                        debug!(error = %e, "discarding malformed event batch");
                        continue;
                    }
                };
                for event in events {
                    if event_tx.send(event).await.is_err() {
                        // Receiver dropped, shut down cleanly.
                        return Ok(());
                    }
                }
            }
            Ok(resp) => {
                debug!(status = %resp.status(), "event poll returned non-200");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Err(e) if e.is_timeout() => {
                // Long-poll window expired, retry immediately.
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
