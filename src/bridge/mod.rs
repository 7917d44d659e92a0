//! WhatsApp bridge client: trait seam, value types, and lifecycle events.
//!
//! The actual WhatsApp connectivity (QR pairing, session persistence, media
//! codecs) lives in a whatsapp-web.js sidecar reached over local HTTP. The
//! gateway only ever talks to it through the [`WhatsAppBridge`] trait.

mod wweb;

pub use wweb::WwebBridge;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Settings handed to the sidecar when the client is constructed.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSettings {
    /// Directory holding the persisted authentication state.
    pub data_dir: PathBuf,
    /// Key under which the session credential store is kept.
    pub client_id: String,
    /// Browser executable to launch; sidecar default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_path: Option<String>,
    pub headless: bool,
}

/// Result of a successful send: message id plus the delivery ack code
/// reported by the platform, passed through unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: Option<String>,
    pub ack: i32,
}

/// A media payload, base64-encoded for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub mimetype: String,
    pub filename: String,
    /// Base64-encoded content.
    pub data: String,
}

/// An interactive button-menu message.
#[derive(Debug, Clone, Serialize)]
pub struct ButtonsMessage {
    pub text: String,
    pub buttons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

/// An interactive list-menu message.
#[derive(Debug, Clone, Serialize)]
pub struct ListMessage {
    pub text: String,
    /// Label on the button that opens the list.
    pub button: String,
    pub sections: Vec<ListSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A message received on the linked account, as forwarded to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender chat id.
    pub from: String,
    pub body: String,
    /// Platform timestamp, epoch seconds.
    pub timestamp: i64,
    /// Platform message type (chat, image, ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "hasMedia")]
    pub has_media: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaAttachment>,
}

/// Lifecycle and message events pushed by the sidecar.
///
/// Tagged by an `event` field so message payloads can carry their own
/// platform `type` field untouched.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// A pairing QR code is waiting to be scanned.
    Qr { code: String },
    /// Session credentials accepted.
    Authenticated,
    /// Handshake complete; sends may proceed. `me` is the linked account id.
    Ready { me: String },
    /// Connection lost. No automatic reconnect is attempted.
    Disconnected { reason: Option<String> },
    /// A message arrived on the linked account.
    Message(InboundMessage),
}

/// Errors from the bridge sidecar.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// HTTP request to the sidecar failed.
    #[error("bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The sidecar answered with a non-success HTTP status.
    #[error("bridge error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The sidecar answered 200 but reported a failure or malformed payload.
    #[error("{0}")]
    Protocol(String),
}

/// Operations the gateway needs from the messaging platform.
///
/// One implementation talks to the whatsapp-web.js sidecar ([`WwebBridge`]);
/// tests substitute their own.
#[async_trait]
pub trait WhatsAppBridge: Send + Sync {
    /// Construct the platform client and begin the asynchronous connection
    /// sequence. Returns the stream of lifecycle and message events.
    async fn initialize(
        &self,
        session: &SessionSettings,
    ) -> Result<mpsc::Receiver<BridgeEvent>, BridgeError>;

    /// Canonical chat id for a phone number, or `None` when the number has
    /// no account on the platform.
    async fn resolve_number(&self, number: &str) -> Result<Option<String>, BridgeError>;

    async fn send_text(&self, chat_id: &str, body: &str) -> Result<SentMessage, BridgeError>;

    async fn send_media(
        &self,
        chat_id: &str,
        media: &MediaAttachment,
        caption: Option<&str>,
    ) -> Result<SentMessage, BridgeError>;

    async fn send_buttons(
        &self,
        chat_id: &str,
        message: &ButtonsMessage,
    ) -> Result<SentMessage, BridgeError>;

    async fn send_list(
        &self,
        chat_id: &str,
        message: &ListMessage,
    ) -> Result<SentMessage, BridgeError>;

    /// Release the underlying browser handle. Must run before [`destroy`]
    /// so session files are unlocked on platforms that hold them open.
    ///
    /// [`destroy`]: WhatsAppBridge::destroy
    async fn close_browser(&self) -> Result<(), BridgeError>;

    /// Tear down the platform client.
    async fn destroy(&self) -> Result<(), BridgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_deserializes_from_tagged_json() {
        let event: BridgeEvent =
            serde_json::from_str(r#"{"event":"ready","me":"15555550123@c.us"}"#).unwrap();
        match event {
            BridgeEvent::Ready { me } => assert_eq!(me, "15555550123@c.us"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn disconnect_reason_is_optional() {
        let event: BridgeEvent = serde_json::from_str(r#"{"event":"disconnected"}"#).unwrap();
        assert!(matches!(event, BridgeEvent::Disconnected { reason: None }));
    }

    #[test]
    fn inbound_message_keeps_platform_field_names() {
        let event: BridgeEvent = serde_json::from_str(
            r#"{"event":"message","from":"15555550123@c.us","body":"hi","timestamp":1756000000,"type":"chat","hasMedia":false}"#,
        )
        .unwrap();
        let BridgeEvent::Message(msg) = event else {
            panic!("expected message event");
        };
        assert_eq!(msg.from, "15555550123@c.us");
        assert_eq!(msg.kind, "chat");
        assert!(!msg.has_media);
        assert!(msg.media.is_none());

        // Serializing for the webhook keeps the same field names.
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "chat");
        assert_eq!(json["hasMedia"], false);
    }
}
