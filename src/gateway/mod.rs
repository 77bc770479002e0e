//! Messaging gateway abstraction.
//!
//! `GatewayClient` is an enum over concrete gateway backends. Add a new
//! variant + module in `providers/` for each additional backend.
//!
//! Gateway instances are shared immutable capabilities — clone them freely.
//! Every call is a single best-effort round-trip: no retries, no backoff.
//! Callers decide whether a failure is worth more than a log line.

pub mod providers;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown gateway provider: {0}")]
    UnknownProvider(String),
    #[error("gateway request failed: {0}")]
    Request(String),
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("gateway response could not be decoded: {0}")]
    Decode(String),
}

// ── Wire-neutral types ────────────────────────────────────────────────────────

/// A text message to deliver to one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundText {
    pub session: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    pub text: String,
    /// Message id this text quotes, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Chat ids tagged in `text`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
}

impl OutboundText {
    pub fn new(session: impl Into<String>, chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            chat_id: chat_id.into(),
            text: text.into(),
            reply_to: None,
            mentions: Vec::new(),
        }
    }

    pub fn replying_to(mut self, message_id: Option<&str>) -> Self {
        self.reply_to = message_id.map(ToString::to_string);
        self
    }

    pub fn with_mentions(mut self, mentions: Vec<String>) -> Self {
        self.mentions = mentions;
        self
    }
}

/// One member of a group chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub is_admin: bool,
}

/// Side-effecting gateway call, as recorded by the dry-run backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayAction {
    SendText(OutboundText),
    DeleteMessage { session: String, chat_id: String, message_id: String },
    RemoveParticipants { session: String, chat_id: String, participants: Vec<String> },
}

// ── Client enum ───────────────────────────────────────────────────────────────

/// All available gateway backends.
///
/// Enum dispatch keeps handlers free of trait objects; adding a backend =
/// new module + new variant + new arm in each method.
#[derive(Debug, Clone)]
pub enum GatewayClient {
    Waha(providers::waha::WahaClient),
    DryRun(providers::dry_run::DryRunGateway),
}

impl GatewayClient {
    /// Short backend name for log lines and the startup banner.
    pub fn provider_name(&self) -> &'static str {
        match self {
            GatewayClient::Waha(_) => "waha",
            GatewayClient::DryRun(_) => "dry_run",
        }
    }

    /// Deliver a text message.
    pub async fn send_text(&self, msg: &OutboundText) -> Result<(), GatewayError> {
        match self {
            GatewayClient::Waha(c) => c.send_text(msg).await,
            GatewayClient::DryRun(c) => c.send_text(msg),
        }
    }

    /// Delete `message_id` in `chat_id` for everyone.
    pub async fn delete_message(
        &self,
        session: &str,
        chat_id: &str,
        message_id: &str,
    ) -> Result<(), GatewayError> {
        match self {
            GatewayClient::Waha(c) => c.delete_message(session, chat_id, message_id).await,
            GatewayClient::DryRun(c) => c.delete_message(session, chat_id, message_id),
        }
    }

    /// Remove `participants` from the group `chat_id`.
    pub async fn remove_participants(
        &self,
        session: &str,
        chat_id: &str,
        participants: &[String],
    ) -> Result<(), GatewayError> {
        match self {
            GatewayClient::Waha(c) => c.remove_participants(session, chat_id, participants).await,
            GatewayClient::DryRun(c) => c.remove_participants(session, chat_id, participants),
        }
    }

    /// List the members of the group `chat_id` with their admin flag.
    pub async fn group_participants(
        &self,
        session: &str,
        chat_id: &str,
    ) -> Result<Vec<Participant>, GatewayError> {
        match self {
            GatewayClient::Waha(c) => c.group_participants(session, chat_id).await,
            GatewayClient::DryRun(c) => c.group_participants(chat_id),
        }
    }

    /// Chat id of the account the session is logged in as.
    pub async fn own_id(&self, session: &str) -> Result<String, GatewayError> {
        match self {
            GatewayClient::Waha(c) => c.own_id(session).await,
            GatewayClient::DryRun(c) => c.own_id(),
        }
    }

    /// Raw login QR payload for a session waiting to be paired.
    pub async fn login_qr(&self, session: &str) -> Result<String, GatewayError> {
        match self {
            GatewayClient::Waha(c) => c.login_qr(session).await,
            GatewayClient::DryRun(c) => c.login_qr(),
        }
    }
}
