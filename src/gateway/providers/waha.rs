//! WAHA (WhatsApp HTTP API) gateway client.
//!
//! REST paths used, relative to `base_url`:
//!
//! ```text
//! POST   /api/sendText                                   send text
//! DELETE /api/{session}/chats/{chatId}/messages/{id}     delete for everyone
//! POST   /api/{session}/groups/{id}/participants/remove  kick
//! GET    /api/{session}/groups/{id}/participants         member list + roles
//! GET    /api/sessions/{session}/me                      own account id
//! GET    /api/{session}/auth/qr?format=raw               login QR payload
//! ```
//!
//! All WAHA wire types are private to this module.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::gateway::{GatewayError, OutboundText, Participant};

/// Adapter for a WAHA instance. Constructed once at startup, then cheaply
/// cloned because `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct WahaClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RemoveParticipantsRequest<'a> {
    participants: Vec<ParticipantRef<'a>>,
}

#[derive(Serialize)]
struct ParticipantRef<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
struct ParticipantResponse {
    id: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default, rename = "isAdmin")]
    is_admin: bool,
    #[serde(default, rename = "isSuperAdmin")]
    is_super_admin: bool,
}

#[derive(Deserialize)]
struct MeResponse {
    id: String,
}

#[derive(Deserialize)]
struct QrResponse {
    value: String,
}

impl WahaClient {
    /// Build a client for `base_url` (no trailing slash).
    ///
    /// `api_key` is sent as `X-Api-Key` on every request when present.
    pub fn new(base_url: String, timeout_seconds: u64, api_key: Option<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_key })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("X-Api-Key", key),
            None => req,
        }
    }

    async fn execute(&self, req: RequestBuilder) -> Result<Response, GatewayError> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status: status.as_u16(), body });
        }
        Ok(resp)
    }

    pub async fn send_text(&self, msg: &OutboundText) -> Result<(), GatewayError> {
        debug!(chat_id = %msg.chat_id, session = %msg.session, "waha sendText");
        trace!(text = %msg.text, "waha sendText body");
        self.execute(self.client.post(self.url("/api/sendText")).json(msg)).await?;
        Ok(())
    }

    pub async fn delete_message(&self, session: &str, chat_id: &str, message_id: &str) -> Result<(), GatewayError> {
        let path = format!("/api/{session}/chats/{chat_id}/messages/{message_id}");
        self.execute(self.client.delete(self.url(&path))).await?;
        Ok(())
    }

    pub async fn remove_participants(
        &self,
        session: &str,
        chat_id: &str,
        participants: &[String],
    ) -> Result<(), GatewayError> {
        let path = format!("/api/{session}/groups/{chat_id}/participants/remove");
        let body = RemoveParticipantsRequest {
            participants: participants.iter().map(|id| ParticipantRef { id }).collect(),
        };
        self.execute(self.client.post(self.url(&path)).json(&body)).await?;
        Ok(())
    }

    pub async fn group_participants(&self, session: &str, chat_id: &str) -> Result<Vec<Participant>, GatewayError> {
        let path = format!("/api/{session}/groups/{chat_id}/participants");
        let resp = self.execute(self.client.get(self.url(&path))).await?;
        let raw: Vec<ParticipantResponse> =
            resp.json().await.map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(raw
            .into_iter()
            .map(|p| {
                let role_admin = matches!(p.role.as_deref(), Some("admin") | Some("superadmin"));
                Participant { id: p.id, is_admin: role_admin || p.is_admin || p.is_super_admin }
            })
            .collect())
    }

    pub async fn own_id(&self, session: &str) -> Result<String, GatewayError> {
        let path = format!("/api/sessions/{session}/me");
        let resp = self.execute(self.client.get(self.url(&path))).await?;
        let me: MeResponse = resp.json().await.map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(me.id)
    }

    pub async fn login_qr(&self, session: &str) -> Result<String, GatewayError> {
        let path = format!("/api/{session}/auth/qr");
        let req = self.client.get(self.url(&path)).query(&[("format", "raw")]);
        let resp = self.execute(req).await?;
        let qr: QrResponse = resp.json().await.map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(qr.value)
    }
}
