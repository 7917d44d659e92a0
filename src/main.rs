//! Process entry point: CLI, logging, startup, serving, and the ordered
//! shutdown sequence on termination signals.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use wagate::bridge::{SessionSettings, WwebBridge};
use wagate::config::Config;
use wagate::context::GatewayContext;
use wagate::server::{AppState, build_app};
use wagate::webhook::WebhookForwarder;

#[derive(Parser)]
#[command(name = "wagate", version, about = "REST gateway for a WhatsApp account")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, default_value = "wagate.yaml")]
    config: PathBuf,

    /// Override the listening port from config/environment.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Precedence: CLI > env vars > config file > defaults.
    let mut config = Config::load(&cli.config)
        .await
        .context("failed to load configuration")?;
    config.apply_env().context("invalid environment override")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let bridge = Arc::new(WwebBridge::new(
        config.bridge.url.clone(),
        Duration::from_secs(config.bridge.request_timeout_seconds),
    ));
    let webhook = config
        .webhook
        .url
        .clone()
        .map(|url| WebhookForwarder::new(url, Duration::from_secs(config.webhook.timeout_seconds)));
    let session = SessionSettings {
        data_dir: config.session.dir.clone(),
        client_id: config.session.client_id.clone(),
        browser_path: config.session.browser_path.clone(),
        headless: config.session.headless,
    };

    let ctx = GatewayContext::new(bridge, session, webhook);
    // Fail-stop: an unpairable or unreachable client is an operator problem,
    // not something to retry silently.
    ctx.start()
        .await
        .context("failed to initialize whatsapp client")?;

    let state = AppState::new(
        ctx.clone(),
        config.api_token.clone(),
        Duration::from_secs(config.download_timeout_seconds),
    );
    let app = build_app(state, config.server.request_timeout_seconds);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "gateway listening");

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = drain_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    info!("termination signal received, shutting down");
    let _ = drain_tx.send(());

    // 0 means exit without waiting on in-flight requests; anything higher
    // bounds the drain.
    let grace = config.server.shutdown_grace_seconds;
    if grace > 0
        && tokio::time::timeout(Duration::from_secs(grace), server)
            .await
            .is_err()
    {
        warn!(grace, "drain window elapsed with requests still in flight");
    }

    ctx.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
