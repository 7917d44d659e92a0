//! Process-wide gateway state: session guard, readiness tracker, and the
//! ordered shutdown sequence.

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::bridge::{BridgeError, BridgeEvent, SessionSettings, WhatsAppBridge};
use crate::webhook::WebhookForwarder;

/// Holds the bridge handle, the readiness flag, and the linked account id.
/// Cheap to clone; injected into every handler through
/// [`AppState`](crate::server::AppState). `start`, the event loop, and
/// `shutdown` are its only mutators.
#[derive(Clone)]
pub struct GatewayContext {
    inner: Arc<Inner>,
}

struct Inner {
    bridge: Arc<dyn WhatsAppBridge>,
    session: SessionSettings,
    webhook: Option<WebhookForwarder>,
    started: AtomicBool,
    ready: AtomicBool,
    me: RwLock<Option<String>>,
}

impl GatewayContext {
    pub fn new(
        bridge: Arc<dyn WhatsAppBridge>,
        session: SessionSettings,
        webhook: Option<WebhookForwarder>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                bridge,
                session,
                webhook,
                started: AtomicBool::new(false),
                ready: AtomicBool::new(false),
                me: RwLock::new(None),
            }),
        }
    }

    /// Initialize the platform client and start consuming its events.
    ///
    /// Idempotent: the first call initializes, every later call in the same
    /// process is a no-op. An initialization failure is returned to the
    /// caller; the process treats it as fatal rather than retrying.
    pub async fn start(&self) -> Result<(), BridgeError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let events = self.inner.bridge.initialize(&self.inner.session).await?;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_event_loop(events).await });
        Ok(())
    }

    /// Whether sends may proceed.
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// The linked account id, known once the first ready event arrived.
    pub fn account_id(&self) -> Option<String> {
        self.inner.me.read().expect("account id lock poisoned").clone()
    }

    pub fn bridge(&self) -> &dyn WhatsAppBridge {
        self.inner.bridge.as_ref()
    }

    /// Ordered teardown: clear readiness, release the browser handle, then
    /// destroy the client. Each step is best-effort; a failure never stops
    /// the sequence. The browser must go first or session files stay
    /// locked on some platforms.
    pub async fn shutdown(&self) {
        info!("closing whatsapp client");
        self.inner.ready.store(false, Ordering::SeqCst);

        if let Err(e) = self.inner.bridge.close_browser().await {
            warn!(error = %e, "failed to close browser during shutdown");
        }
        if let Err(e) = self.inner.bridge.destroy().await {
            warn!(error = %e, "failed to destroy client during shutdown");
        }
    }
}

impl Inner {
    /// Consume bridge events until the stream closes. Pure state
    /// transitions only; no bridge calls happen in here.
    async fn run_event_loop(&self, mut events: mpsc::Receiver<BridgeEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                BridgeEvent::Qr { code } => {
                    info!(qr = %code, "pairing required, scan the QR code");
                }
                BridgeEvent::Authenticated => {
                    info!("session authenticated");
                }
                BridgeEvent::Ready { me } => {
                    *self.me.write().expect("account id lock poisoned") = Some(me.clone());
                    self.ready.store(true, Ordering::SeqCst);
                    info!(%me, "whatsapp client ready");
                }
                BridgeEvent::Disconnected { reason } => {
                    self.ready.store(false, Ordering::SeqCst);
                    error!(
                        reason = reason.as_deref().unwrap_or("unknown"),
                        "whatsapp client disconnected; to resume, stop the process, \
                         delete the session directory and restart to re-pair"
                    );
                }
                BridgeEvent::Message(message) => {
                    if let Some(webhook) = &self.webhook {
                        webhook.forward(message);
                    }
                }
            }
        }
    }
}
