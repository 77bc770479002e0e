//! Inbound webhook schema and validation.
//!
//! The gateway posts `{ event, session, payload }`. Only three event kinds
//! are acted on:
//!
//! - `message`        → [`InboundMessage`]
//! - `session.status` → [`SessionStatus`]
//! - `group.join`     → [`GroupJoin`]
//!
//! Everything else is reported as [`PayloadError::Unsupported`]. Parsing
//! never panics on missing nested fields; it returns a typed error that the
//! handler logs before acknowledging with 200.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const DEFAULT_SESSION: &str = "default";
const GROUP_SUFFIX: &str = "@g.us";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("malformed webhook body: {0}")]
    Malformed(String),
    #[error("unsupported event: {0}")]
    Unsupported(String),
    #[error("event '{0}' has no payload")]
    MissingPayload(String),
    #[error("message sent by the bot itself")]
    FromSelf,
    #[error("message has no text body")]
    EmptyBody,
    #[error("message has no sender")]
    MissingSender,
}

impl PayloadError {
    /// `true` for rejections that are part of normal traffic (not worth a warning).
    pub fn is_routine(&self) -> bool {
        matches!(self, PayloadError::Unsupported(_) | PayloadError::FromSelf | PayloadError::EmptyBody)
    }
}

// ── Validated events ──────────────────────────────────────────────────────────

/// A text message from somebody other than the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub session: String,
    /// Message id used for deduplication; `None` disables dedup for this message.
    pub id: Option<String>,
    /// Chat the message arrived in (a person or a group).
    pub chat_id: String,
    /// Author of the message; differs from `chat_id` in groups.
    pub sender: String,
    pub body: String,
    /// Display name from `_data.notifyName`.
    pub sender_name: Option<String>,
    pub mentioned_ids: Vec<String>,
}

impl InboundMessage {
    pub fn is_group(&self) -> bool {
        self.chat_id.ends_with(GROUP_SUFFIX)
    }
}

/// Messaging session state reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    /// Waiting for a QR scan to pair.
    QrRequired,
    /// Paired and connected.
    Ready,
    AuthFailure,
    Disconnected,
    Other(String),
}

impl SessionState {
    fn parse(raw: &str) -> Self {
        match raw {
            "STARTING" => SessionState::Starting,
            "SCAN_QR_CODE" => SessionState::QrRequired,
            "WORKING" => SessionState::Ready,
            "FAILED" => SessionState::AuthFailure,
            "STOPPED" => SessionState::Disconnected,
            other => SessionState::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub session: String,
    pub state: SessionState,
}

/// New members in a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupJoin {
    pub session: String,
    pub chat_id: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Message(InboundMessage),
    SessionStatus(SessionStatus),
    GroupJoin(GroupJoin),
}

// ── Raw wire shapes ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    session: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct RawMessage {
    /// A string, or `{ "_serialized": "..." }` on some engines.
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default, rename = "fromMe")]
    from_me: bool,
    #[serde(default)]
    participant: Option<String>,
    #[serde(default, rename = "mentionedIds")]
    mentioned_ids: Vec<String>,
    #[serde(default, rename = "_data")]
    data: Option<RawMessageData>,
}

#[derive(Deserialize, Default)]
struct RawMessageData {
    #[serde(default, rename = "notifyName")]
    notify_name: Option<String>,
}

#[derive(Deserialize)]
struct RawSessionStatus {
    status: String,
}

#[derive(Deserialize)]
struct RawGroupJoin {
    #[serde(default, rename = "chatId")]
    chat_id: Option<String>,
    #[serde(default)]
    participant: Option<String>,
    #[serde(default, alias = "recipientIds")]
    participants: Vec<String>,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse and validate a raw webhook body.
pub fn parse(body: &[u8]) -> Result<WebhookEvent, PayloadError> {
    let envelope: RawEnvelope =
        serde_json::from_slice(body).map_err(|e| PayloadError::Malformed(e.to_string()))?;

    let event = envelope.event.unwrap_or_default();
    let session = envelope
        .session
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());

    let payload = match envelope.payload {
        Some(Value::Null) | None => None,
        Some(v) => Some(v),
    };

    match event.as_str() {
        "message" => {
            let payload = payload.ok_or_else(|| PayloadError::MissingPayload(event.clone()))?;
            parse_message(session, payload).map(WebhookEvent::Message)
        }
        "session.status" => {
            let payload = payload.ok_or_else(|| PayloadError::MissingPayload(event.clone()))?;
            let raw: RawSessionStatus =
                serde_json::from_value(payload).map_err(|e| PayloadError::Malformed(e.to_string()))?;
            Ok(WebhookEvent::SessionStatus(SessionStatus { session, state: SessionState::parse(&raw.status) }))
        }
        "group.join" => {
            let payload = payload.ok_or_else(|| PayloadError::MissingPayload(event.clone()))?;
            let raw: RawGroupJoin =
                serde_json::from_value(payload).map_err(|e| PayloadError::Malformed(e.to_string()))?;
            let chat_id = raw
                .chat_id
                .filter(|c| !c.is_empty())
                .ok_or_else(|| PayloadError::Malformed("group.join without chatId".into()))?;
            let mut participants = raw.participants;
            if let Some(p) = raw.participant {
                if !participants.contains(&p) {
                    participants.push(p);
                }
            }
            Ok(WebhookEvent::GroupJoin(GroupJoin { session, chat_id, participants }))
        }
        other => Err(PayloadError::Unsupported(other.to_string())),
    }
}

fn parse_message(session: String, payload: Value) -> Result<InboundMessage, PayloadError> {
    let raw: RawMessage =
        serde_json::from_value(payload).map_err(|e| PayloadError::Malformed(e.to_string()))?;

    if raw.from_me {
        return Err(PayloadError::FromSelf);
    }
    let body = raw.body.filter(|b| !b.trim().is_empty()).ok_or(PayloadError::EmptyBody)?;
    let chat_id = raw.from.filter(|f| !f.is_empty()).ok_or(PayloadError::MissingSender)?;
    let sender = raw
        .participant
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| chat_id.clone());

    Ok(InboundMessage {
        session,
        id: raw.id.as_ref().and_then(message_id),
        chat_id,
        sender,
        body,
        sender_name: raw
            .data
            .and_then(|d| d.notify_name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        mentioned_ids: raw.mentioned_ids,
    })
}

fn message_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map.get("_serialized").and_then(Value::as_str).map(ToString::to_string),
        _ => None,
    }
}
