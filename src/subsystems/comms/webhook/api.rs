//! Axum handlers for the webhook channel.
//!
//! `POST /webhook` acknowledges every request with 200 so the gateway never
//! retries a delivery because of our own validation. Reply delivery runs on
//! a spawned task after the acknowledgement.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, warn};

use super::WebhookState;
use super::payload::{self, WebhookEvent};

fn ack(status: &str) -> Response {
    (StatusCode::OK, Json(json!({ "status": status }))).into_response()
}

/// POST /webhook
pub(super) async fn webhook(State(state): State<WebhookState>, body: Bytes) -> Response {
    let event = match payload::parse(&body) {
        Ok(event) => event,
        Err(e) if e.is_routine() => {
            debug!(channel_id = %state.channel_id, "webhook ignored: {e}");
            return ack("ignored");
        }
        Err(e) => {
            warn!(channel_id = %state.channel_id, "webhook rejected: {e}");
            return ack("ignored");
        }
    };

    let comms = state.comms.clone();
    match event {
        WebhookEvent::Message(msg) => {
            if let Some(id) = msg.id.as_deref() {
                if !comms.register_message(id) {
                    debug!(channel_id = %state.channel_id, message_id = id, "duplicate delivery");
                    return ack("duplicate");
                }
            }
            tokio::spawn(async move { comms.handle_message(msg).await });
        }
        WebhookEvent::SessionStatus(status) => {
            tokio::spawn(async move { comms.handle_session_status(status).await });
        }
        WebhookEvent::GroupJoin(join) => {
            tokio::spawn(async move { comms.handle_group_join(join).await });
        }
    }
    ack("ok")
}

/// GET /health
pub(super) async fn health(State(state): State<WebhookState>) -> Response {
    let body = json!({
        "status": "ok",
        "active": state.comms.is_active(),
        "entries": state.comms.entry_count().await,
    });
    (StatusCode::OK, Json(body)).into_response()
}
