//! Webhook channel — receives gateway events over HTTP with axum.
//!
//! Implements [`Component`] so it slots into the comms subsystem lifecycle:
//! `run()` drives the axum event loop and the shared [`CancellationToken`]
//! is wired to axum's graceful shutdown.
//!
//! ## URL layout
//!
//! ```text
//! POST /webhook   gateway events (always 200)
//! GET  /health    { status, active, entries }
//! ```

mod api;
pub mod payload;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;
use crate::subsystems::runtime::{Component, ComponentFuture};

use super::state::{CommsEvent, CommsState};

// ── Shared request state ──────────────────────────────────────────────────────

/// Axum router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone — all fields are reference-counted.
#[derive(Clone)]
pub(crate) struct WebhookState {
    /// Channel identifier used in log spans.
    pub channel_id: Arc<str>,
    pub comms: Arc<CommsState>,
}

// ── WebhookChannel ────────────────────────────────────────────────────────────

pub struct WebhookChannel {
    channel_id: String,
    bind_addr: String,
    state: Arc<CommsState>,
}

impl WebhookChannel {
    pub fn new(channel_id: impl Into<String>, bind_addr: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self {
            channel_id: channel_id.into(),
            bind_addr: bind_addr.into(),
            state,
        }
    }
}

impl Component for WebhookChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_webhook(self.channel_id, self.bind_addr, self.state, shutdown))
    }
}

// ── Server loop ───────────────────────────────────────────────────────────────

async fn run_webhook(
    channel_id: String,
    bind_addr: String,
    comms: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let router = build_router_with_id(&channel_id, Arc::clone(&comms));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Comms(format!("webhook bind failed on {bind_addr}: {e}")))?;

    info!(%channel_id, %bind_addr, "webhook channel listening");
    comms.report_event(CommsEvent::ChannelStarted { channel_id: channel_id.clone() }).await;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Comms(format!("webhook server error: {e}")))?;

    info!(%channel_id, "webhook channel shut down");
    comms.report_event(CommsEvent::ChannelShutdown { channel_id }).await;
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Router with the default channel id, for embedding and tests.
pub fn build_router(comms: Arc<CommsState>) -> Router {
    build_router_with_id("webhook0", comms)
}

fn build_router_with_id(channel_id: &str, comms: Arc<CommsState>) -> Router {
    let state = WebhookState { channel_id: Arc::from(channel_id), comms };
    Router::new()
        .route("/webhook", post(api::webhook))
        .route("/health", get(api::health))
        .with_state(state)
}
