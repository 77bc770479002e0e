//! Dry-run gateway — logs and records every call instead of touching the network.
//! Used for local runs without a gateway and for the full webhook round-trip in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use crate::gateway::{GatewayAction, GatewayError, OutboundText, Participant};

const DEFAULT_OWN_ID: &str = "0000000000@c.us";

#[derive(Debug, Default)]
struct DryRunInner {
    actions: Vec<GatewayAction>,
    groups: HashMap<String, Vec<Participant>>,
    own_id: Option<String>,
    /// When set, every side-effecting call fails with this message.
    fail_with: Option<String>,
}

/// Recording gateway. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct DryRunGateway {
    inner: Arc<Mutex<DryRunInner>>,
}

impl DryRunGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DryRunInner> {
        // A poisoned log only means a test panicked mid-record; the data is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, action: GatewayAction) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        if let Some(msg) = &inner.fail_with {
            return Err(GatewayError::Request(msg.clone()));
        }
        info!(?action, "dry-run gateway call");
        inner.actions.push(action);
        Ok(())
    }

    // ── recorded calls ───────────────────────────────────────────────

    pub fn send_text(&self, msg: &OutboundText) -> Result<(), GatewayError> {
        self.record(GatewayAction::SendText(msg.clone()))
    }

    pub fn delete_message(&self, session: &str, chat_id: &str, message_id: &str) -> Result<(), GatewayError> {
        self.record(GatewayAction::DeleteMessage {
            session: session.to_string(),
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
        })
    }

    pub fn remove_participants(
        &self,
        session: &str,
        chat_id: &str,
        participants: &[String],
    ) -> Result<(), GatewayError> {
        self.record(GatewayAction::RemoveParticipants {
            session: session.to_string(),
            chat_id: chat_id.to_string(),
            participants: participants.to_vec(),
        })
    }

    // ── queries ──────────────────────────────────────────────────────

    pub fn group_participants(&self, chat_id: &str) -> Result<Vec<Participant>, GatewayError> {
        self.lock()
            .groups
            .get(chat_id)
            .cloned()
            .ok_or_else(|| GatewayError::Status { status: 404, body: format!("unknown group {chat_id}") })
    }

    pub fn own_id(&self) -> Result<String, GatewayError> {
        Ok(self.lock().own_id.clone().unwrap_or_else(|| DEFAULT_OWN_ID.to_string()))
    }

    pub fn login_qr(&self) -> Result<String, GatewayError> {
        Ok("dry-run-login-qr".to_string())
    }

    // ── inspection / setup ───────────────────────────────────────────

    /// All recorded calls in order.
    pub fn actions(&self) -> Vec<GatewayAction> {
        self.lock().actions.clone()
    }

    /// Only the recorded text messages, in order.
    pub fn sent_texts(&self) -> Vec<OutboundText> {
        self.lock()
            .actions
            .iter()
            .filter_map(|a| match a {
                GatewayAction::SendText(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn set_own_id(&self, id: impl Into<String>) {
        self.lock().own_id = Some(id.into());
    }

    pub fn set_group(&self, chat_id: impl Into<String>, participants: Vec<Participant>) {
        self.lock().groups.insert(chat_id.into(), participants);
    }

    /// Make every subsequent side-effecting call fail (`None` restores success).
    pub fn set_failure(&self, message: Option<&str>) {
        self.lock().fail_with = message.map(ToString::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_and_shares_between_clones() {
        let gw = DryRunGateway::new();
        let other = gw.clone();
        gw.send_text(&OutboundText::new("default", "1@c.us", "one")).unwrap();
        other.delete_message("default", "2@g.us", "m1").unwrap();

        let actions = gw.actions();
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[1], GatewayAction::DeleteMessage { message_id, .. } if message_id == "m1"));
        assert_eq!(gw.sent_texts()[0].text, "one");
    }

    #[test]
    fn configured_failure_is_returned_and_not_recorded() {
        let gw = DryRunGateway::new();
        gw.set_failure(Some("connection refused"));
        let err = gw.send_text(&OutboundText::new("default", "1@c.us", "x")).unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(gw.actions().is_empty());
    }

    #[test]
    fn unknown_group_is_an_error() {
        let gw = DryRunGateway::new();
        assert!(gw.group_participants("404@g.us").is_err());
        gw.set_group("1@g.us", vec![Participant { id: "a@c.us".into(), is_admin: true }]);
        assert_eq!(gw.group_participants("1@g.us").unwrap().len(), 1);
    }
}
