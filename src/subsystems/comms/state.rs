//! Shared state for the comms subsystem — the bot's message-handling service.
//!
//! The webhook channel receives an `Arc<CommsState>` and only talks to the
//! typed handlers below. The knowledge base, pause flag, dedup window and
//! gateway client are private; channels never touch them directly.
//!
//! # Intra-subsystem events
//!
//! [`CommsState::report_event`] lets a running channel signal the comms
//! subsystem manager (started, shut down) without a direct reference to it.
//! The manager owns the receiver end.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::gateway::{GatewayClient, OutboundText};
use crate::knowledge::{KnowledgeBase, KnowledgeStore};
use crate::subsystems::admin;
#[cfg(feature = "moderation")]
use crate::subsystems::moderation::{GroupGuard, GuardOutcome, WelcomeBook};

use super::dedup::DedupWindow;
use super::webhook::payload::{GroupJoin, InboundMessage, SessionState, SessionStatus};

// ── Events ────────────────────────────────────────────────────────────────────

/// Events a channel sends back to the comms subsystem manager.
#[derive(Debug)]
pub enum CommsEvent {
    /// Channel is bound and accepting requests.
    ChannelStarted { channel_id: String },
    /// Channel has stopped.
    ChannelShutdown { channel_id: String },
}

// ── State ─────────────────────────────────────────────────────────────────────

pub struct CommsState {
    knowledge: Mutex<KnowledgeBase>,
    store: KnowledgeStore,
    /// `false` while paused by the admin. Not persisted.
    active: AtomicBool,
    dedup: Arc<DedupWindow>,
    gateway: GatewayClient,
    admin_id: Option<String>,
    default_sender_name: String,
    #[cfg(feature = "moderation")]
    guard: Option<GroupGuard>,
    event_tx: mpsc::Sender<CommsEvent>,
}

impl CommsState {
    /// Build the service from a loaded knowledge base.
    ///
    /// With moderation enabled the welcome book is loaded here, so a corrupt
    /// welcome file fails startup like a corrupt knowledge file does.
    pub fn new(
        config: &Config,
        knowledge: KnowledgeBase,
        store: KnowledgeStore,
        gateway: GatewayClient,
        event_tx: mpsc::Sender<CommsEvent>,
    ) -> Result<Self, AppError> {
        #[cfg(feature = "moderation")]
        let guard = if config.moderation.enabled {
            let book = WelcomeBook::load(&config.moderation.welcome_file)?;
            Some(
                GroupGuard::new(gateway.clone(), book, config.moderation.welcome_message.clone())
                    .with_owner(config.admin_number.clone()),
            )
        } else {
            None
        };
        #[cfg(not(feature = "moderation"))]
        if config.moderation.enabled {
            warn!("[moderation] enabled = true but this binary was built without the `moderation` feature");
        }

        Ok(Self {
            knowledge: Mutex::new(knowledge),
            store,
            active: AtomicBool::new(true),
            dedup: Arc::new(DedupWindow::new(config.webhook.dedup_ttl)),
            gateway,
            admin_id: config.admin_number.clone(),
            default_sender_name: config.default_sender_name.clone(),
            #[cfg(feature = "moderation")]
            guard,
            event_tx,
        })
    }

    pub fn dedup(&self) -> Arc<DedupWindow> {
        Arc::clone(&self.dedup)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn entry_count(&self) -> usize {
        self.knowledge.lock().await.len()
    }

    /// Record `id` in the dedup window. `false` means it was already seen.
    pub fn register_message(&self, id: &str) -> bool {
        self.dedup.register(id)
    }

    /// Route one accepted message: group guard → admin commands → auto-reply.
    pub async fn handle_message(&self, msg: InboundMessage) {
        debug!(chat_id = %msg.chat_id, sender = %msg.sender, body = %msg.body, "message received");

        #[cfg(feature = "moderation")]
        if let Some(guard) = &self.guard {
            if guard.handle_message(&msg).await == GuardOutcome::Handled {
                return;
            }
        }

        if self.is_admin(&msg.sender) {
            if let Some(parsed) = admin::parse(&msg.body) {
                let reply = match parsed {
                    Ok(command) => {
                        let mut kb = self.knowledge.lock().await;
                        admin::execute(command, &mut kb, &self.store, &self.active)
                    }
                    Err(e) => e.to_string(),
                };
                self.send_reply(&msg, reply).await;
                return;
            }
        }

        if !self.is_active() {
            info!(chat_id = %msg.chat_id, "bot paused; message ignored");
            return;
        }

        let name = msg.sender_name.as_deref().unwrap_or(self.default_sender_name.as_str());
        let reply = self.knowledge.lock().await.find_reply(&msg.body, name);
        match reply {
            Some(reply) => self.send_reply(&msg, reply).await,
            None => debug!(chat_id = %msg.chat_id, "no keyword matched"),
        }
    }

    pub async fn handle_session_status(&self, status: SessionStatus) {
        let session = status.session.as_str();
        match status.state {
            SessionState::QrRequired => {
                info!(session, "session waiting for QR scan");
                self.show_login_qr(session).await;
            }
            SessionState::Ready => info!(session, "session authenticated and ready"),
            SessionState::AuthFailure => {
                error!(session, "session authentication failed; re-pair the device in the gateway");
            }
            SessionState::Disconnected => warn!(session, "session disconnected"),
            SessionState::Starting => debug!(session, "session starting"),
            SessionState::Other(ref state) => debug!(session, state = %state, "session status"),
        }
    }

    pub async fn handle_group_join(&self, join: GroupJoin) {
        #[cfg(feature = "moderation")]
        if let Some(guard) = &self.guard {
            guard.welcome(&join).await;
            return;
        }
        debug!(chat_id = %join.chat_id, members = join.participants.len(), "group join ignored");
    }

    /// Forward a lifecycle event to the comms manager.
    pub async fn report_event(&self, event: CommsEvent) {
        if let Err(e) = self.event_tx.send(event).await {
            warn!("comms event channel closed: {e}");
        }
    }

    fn is_admin(&self, sender: &str) -> bool {
        self.admin_id.as_deref() == Some(sender)
    }

    /// Best-effort text delivery to the chat `msg` arrived in.
    async fn send_reply(&self, msg: &InboundMessage, text: String) {
        let out = OutboundText::new(&msg.session, &msg.chat_id, text);
        match self.gateway.send_text(&out).await {
            Ok(()) => info!(chat_id = %msg.chat_id, provider = self.gateway.provider_name(), "reply sent"),
            Err(e) => error!(chat_id = %msg.chat_id, "reply delivery failed: {e}"),
        }
    }

    async fn show_login_qr(&self, session: &str) {
        let payload = match self.gateway.login_qr(session).await {
            Ok(p) => p,
            Err(e) => {
                warn!(session, "cannot fetch login QR: {e}");
                return;
            }
        };
        #[cfg(feature = "moderation")]
        match crate::subsystems::moderation::qr::render_terminal(&payload) {
            Ok(art) => {
                println!("{art}");
                println!("Scan this QR code with WhatsApp (Settings > Linked Devices).");
            }
            Err(e) => warn!("{e}"),
        }
        #[cfg(not(feature = "moderation"))]
        info!(session, qr = %payload, "login QR payload");
    }
}
