//! wagate - HTTP gateway exposing a WhatsApp account over REST.
//!
//! The WhatsApp protocol itself (pairing, session persistence, media
//! codecs) lives in a whatsapp-web.js bridge sidecar; this crate validates
//! requests, gates them on readiness, and maps bridge results to HTTP
//! responses.

pub mod bridge;
pub mod config;
pub mod context;
pub mod handlers;
pub mod response;
pub mod server;
pub mod webhook;
