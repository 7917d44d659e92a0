//! Fire-and-forget forwarding of received messages to an external
//! automation endpoint.
//!
//! At-most-once, best-effort: delivery failures are logged and dropped, no
//! retry, no dead-lettering.

use std::time::Duration;

use tracing::{debug, warn};

use crate::bridge::InboundMessage;

/// POSTs inbound messages to a configured webhook URL.
pub struct WebhookForwarder {
    client: reqwest::Client,
    url: String,
}

impl WebhookForwarder {
    pub fn new(url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build webhook client with timeout, using default");
                reqwest::Client::default()
            });
        Self { client, url }
    }

    /// Dispatch one message in the background and return immediately.
    pub fn forward(&self, message: InboundMessage) {
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&message).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(from = %message.from, "inbound message forwarded");
                }
                Ok(resp) => {
                    warn!(status = %resp.status(), "webhook rejected inbound message");
                }
                Err(e) => {
                    warn!(error = %e, "webhook delivery failed");
                }
            }
        });
    }
}
