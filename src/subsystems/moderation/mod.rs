//! Group guard — moderation for group chats where the bot is an admin.
//!
//! Runs before admin commands and auto-replies. A message the guard acts on
//! is [`GuardOutcome::Handled`] and goes no further.
//!
//! | trigger | who | action |
//! |---|---|---|
//! | `!ping` | anyone, any chat | reply `Pong!` |
//! | link in text | non-admin member other than the bot owner | delete message, warn with mention |
//! | `!kick @…` | group admin | remove the mentioned members |
//! | `!setwelcome <text>` | group admin | store the group's welcome text |
//!
//! Group rules only apply when the bot itself is a group admin. Any
//! failure to look up roles skips moderation for that message.

pub mod patterns;
pub mod qr;
pub mod welcome;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use crate::gateway::{GatewayClient, GatewayError, OutboundText};
use crate::subsystems::comms::webhook::payload::{GroupJoin, InboundMessage};

pub use welcome::WelcomeBook;

const CMD_PING: &str = "!ping";
const CMD_KICK: &str = "!kick";
const CMD_SET_WELCOME: &str = "!setwelcome ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Handled,
    Continue,
}

struct Roles {
    bot_admin: bool,
    sender_admin: bool,
}

pub struct GroupGuard {
    gateway: GatewayClient,
    welcome: Mutex<WelcomeBook>,
    default_welcome: String,
    own_id: OnceCell<String>,
    owner_id: Option<String>,
}

impl GroupGuard {
    pub fn new(gateway: GatewayClient, welcome: WelcomeBook, default_welcome: impl Into<String>) -> Self {
        Self {
            gateway,
            welcome: Mutex::new(welcome),
            default_welcome: default_welcome.into(),
            own_id: OnceCell::new(),
            owner_id: None,
        }
    }

    /// Exempt the bot owner from link removal so their commands still reach
    /// the admin dispatcher.
    pub fn with_owner(mut self, owner_id: Option<String>) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub async fn handle_message(&self, msg: &InboundMessage) -> GuardOutcome {
        if msg.body == CMD_PING {
            self.reply(msg, "Pong!".to_string(), Vec::new()).await;
            return GuardOutcome::Handled;
        }
        if !msg.is_group() {
            return GuardOutcome::Continue;
        }

        let Some(roles) = self.roles(msg).await else {
            return GuardOutcome::Continue;
        };
        if !roles.bot_admin {
            debug!(chat_id = %msg.chat_id, "bot is not a group admin; moderation skipped");
            return GuardOutcome::Continue;
        }

        let text = msg.body.trim();
        let is_owner = self.owner_id.as_deref() == Some(msg.sender.as_str());
        if !roles.sender_admin && !is_owner && patterns::contains_link(text) {
            self.remove_link(msg).await;
            return GuardOutcome::Handled;
        }
        if !roles.sender_admin {
            return GuardOutcome::Continue;
        }

        if text == CMD_KICK || text.starts_with(&format!("{CMD_KICK} ")) {
            self.kick(msg, text).await;
            return GuardOutcome::Handled;
        }
        if let Some(welcome) = text.strip_prefix(CMD_SET_WELCOME) {
            self.set_welcome(msg, welcome.trim()).await;
            return GuardOutcome::Handled;
        }
        GuardOutcome::Continue
    }

    /// Greet every new member of `join.chat_id`, tagging each of them.
    pub async fn welcome(&self, join: &GroupJoin) {
        let welcome = {
            let book = self.welcome.lock().await;
            book.get(&join.chat_id).unwrap_or(self.default_welcome.as_str()).to_string()
        };
        for member in &join.participants {
            info!(chat_id = %join.chat_id, member = %member, "new group member");
            let text = format!("Halo @{}, {welcome}", patterns::user_part(member));
            let out = OutboundText::new(&join.session, &join.chat_id, text).with_mentions(vec![member.clone()]);
            if let Err(e) = self.gateway.send_text(&out).await {
                error!(chat_id = %join.chat_id, "welcome message failed: {e}");
            }
        }
    }

    async fn roles(&self, msg: &InboundMessage) -> Option<Roles> {
        let own_id = match self.own_id(&msg.session).await {
            Ok(id) => id,
            Err(e) => {
                warn!("cannot resolve bot account id: {e}");
                return None;
            }
        };
        let members = match self.gateway.group_participants(&msg.session, &msg.chat_id).await {
            Ok(m) => m,
            Err(e) => {
                warn!(chat_id = %msg.chat_id, "cannot fetch group participants: {e}");
                return None;
            }
        };
        let is_admin = |id: &str| members.iter().any(|p| p.is_admin && p.id == id);
        Some(Roles { bot_admin: is_admin(own_id), sender_admin: is_admin(msg.sender.as_str()) })
    }

    async fn own_id(&self, session: &str) -> Result<&str, GatewayError> {
        self.own_id
            .get_or_try_init(|| self.gateway.own_id(session))
            .await
            .map(String::as_str)
    }

    async fn remove_link(&self, msg: &InboundMessage) {
        let user = patterns::user_part(&msg.sender);
        info!(chat_id = %msg.chat_id, sender = %msg.sender, "link from non-admin");
        let mentions = vec![msg.sender.clone()];

        let deleted = match msg.id.as_deref() {
            Some(id) => self.gateway.delete_message(&msg.session, &msg.chat_id, id).await,
            None => Err(GatewayError::Request("message has no id".into())),
        };
        let text = match deleted {
            Ok(()) => format!("@{user} Link terdeteksi! Hanya admin yang diizinkan mengirim link di grup ini."),
            Err(e) => {
                error!(chat_id = %msg.chat_id, "failed to delete link message: {e}");
                format!("Peringatan: Link terdeteksi dari @{user}. Bot gagal menghapus pesan (izin?).")
            }
        };
        self.reply(msg, text, mentions).await;
    }

    async fn kick(&self, msg: &InboundMessage, text: &str) {
        let targets = if msg.mentioned_ids.is_empty() {
            patterns::mentions_in(text)
        } else {
            msg.mentioned_ids.clone()
        };
        if targets.is_empty() {
            self.reply(msg, "Sebutkan anggota yang ingin di-kick. Contoh: !kick @user".into(), Vec::new())
                .await;
            return;
        }

        let reply = match self.gateway.remove_participants(&msg.session, &msg.chat_id, &targets).await {
            Ok(()) => {
                info!(chat_id = %msg.chat_id, removed = targets.len(), by = %msg.sender, "members kicked");
                format!("Berhasil mengeluarkan {} anggota.", targets.len())
            }
            Err(e) => {
                error!(chat_id = %msg.chat_id, "kick failed: {e}");
                "Gagal mengeluarkan anggota. Pastikan saya memiliki izin admin yang cukup.".to_string()
            }
        };
        self.reply(msg, reply, Vec::new()).await;
    }

    async fn set_welcome(&self, msg: &InboundMessage, welcome: &str) {
        {
            let mut book = self.welcome.lock().await;
            if let Err(e) = book.set(&msg.chat_id, welcome) {
                error!("failed to persist welcome message: {e}");
            }
        }
        info!(chat_id = %msg.chat_id, by = %msg.sender, "welcome message updated");
        self.reply(msg, format!("Pesan sambutan telah diatur menjadi: \"{welcome}\"."), Vec::new())
            .await;
    }

    async fn reply(&self, msg: &InboundMessage, text: String, mentions: Vec<String>) {
        let out = OutboundText::new(&msg.session, &msg.chat_id, text)
            .replying_to(msg.id.as_deref())
            .with_mentions(mentions);
        if let Err(e) = self.gateway.send_text(&out).await {
            error!(chat_id = %msg.chat_id, "guard reply failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::providers::dry_run::DryRunGateway;
    use crate::gateway::{GatewayAction, Participant};
    use tempfile::TempDir;

    const BOT: &str = "6280000000000@c.us";
    const ADMIN: &str = "6281111111111@c.us";
    const MEMBER: &str = "6282222222222@c.us";
    const GROUP: &str = "120363000000@g.us";

    fn setup(bot_is_admin: bool) -> (TempDir, DryRunGateway, GroupGuard) {
        let tmp = TempDir::new().unwrap();
        let dry = DryRunGateway::new();
        dry.set_own_id(BOT);
        dry.set_group(
            GROUP,
            vec![
                Participant { id: BOT.into(), is_admin: bot_is_admin },
                Participant { id: ADMIN.into(), is_admin: true },
                Participant { id: MEMBER.into(), is_admin: false },
            ],
        );
        let book = WelcomeBook::load(tmp.path().join("welcome.json")).unwrap();
        let guard = GroupGuard::new(GatewayClient::DryRun(dry.clone()), book, "Selamat datang!");
        (tmp, dry, guard)
    }

    fn group_msg(sender: &str, body: &str) -> InboundMessage {
        InboundMessage {
            session: "default".into(),
            id: Some("m1".into()),
            chat_id: GROUP.into(),
            sender: sender.into(),
            body: body.into(),
            sender_name: None,
            mentioned_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn ping_works_in_direct_chat() {
        let (_tmp, dry, guard) = setup(true);
        let mut msg = group_msg(MEMBER, "!ping");
        msg.chat_id = MEMBER.into();
        assert_eq!(guard.handle_message(&msg).await, GuardOutcome::Handled);
        assert_eq!(dry.sent_texts()[0].text, "Pong!");
    }

    #[tokio::test]
    async fn link_from_bot_owner_passes_through() {
        let (_tmp, dry, guard) = setup(true);
        let guard = guard.with_owner(Some(MEMBER.into()));
        let outcome = guard.handle_message(&group_msg(MEMBER, "!tambah_balasan web|kunjungi tokoku.com")).await;
        assert_eq!(outcome, GuardOutcome::Continue);
        assert!(dry.actions().is_empty());
    }

    #[tokio::test]
    async fn link_from_member_is_deleted() {
        let (_tmp, dry, guard) = setup(true);
        let outcome = guard.handle_message(&group_msg(MEMBER, "promo di tokoku.com")).await;
        assert_eq!(outcome, GuardOutcome::Handled);

        let actions = dry.actions();
        assert!(matches!(&actions[0], GatewayAction::DeleteMessage { message_id, .. } if message_id == "m1"));
        let texts = dry.sent_texts();
        let warn = &texts[0];
        assert!(warn.text.starts_with("@6282222222222 Link terdeteksi!"));
        assert_eq!(warn.mentions, vec![MEMBER.to_string()]);
    }

    #[tokio::test]
    async fn link_from_admin_continues() {
        let (_tmp, dry, guard) = setup(true);
        let outcome = guard.handle_message(&group_msg(ADMIN, "baca https://aturan.example")).await;
        assert_eq!(outcome, GuardOutcome::Continue);
        assert!(dry.actions().is_empty());
    }

    #[tokio::test]
    async fn nothing_happens_when_bot_is_not_admin() {
        let (_tmp, dry, guard) = setup(false);
        let outcome = guard.handle_message(&group_msg(MEMBER, "www.spam.net")).await;
        assert_eq!(outcome, GuardOutcome::Continue);
        assert!(dry.actions().is_empty());
    }

    #[tokio::test]
    async fn kick_uses_text_mentions_when_payload_has_none() {
        let (_tmp, dry, guard) = setup(true);
        let outcome = guard.handle_message(&group_msg(ADMIN, "!kick @6282222222222")).await;
        assert_eq!(outcome, GuardOutcome::Handled);
        assert_eq!(
            dry.actions()[0],
            GatewayAction::RemoveParticipants {
                session: "default".into(),
                chat_id: GROUP.into(),
                participants: vec![MEMBER.into()],
            }
        );
        assert_eq!(dry.sent_texts()[0].text, "Berhasil mengeluarkan 1 anggota.");
    }

    #[tokio::test]
    async fn kick_without_mentions_shows_usage() {
        let (_tmp, dry, guard) = setup(true);
        guard.handle_message(&group_msg(ADMIN, "!kick")).await;
        assert!(dry.sent_texts()[0].text.starts_with("Sebutkan anggota"));
    }

    #[tokio::test]
    async fn kick_from_member_is_ignored() {
        let (_tmp, dry, guard) = setup(true);
        let outcome = guard.handle_message(&group_msg(MEMBER, "!kick @6281111111111")).await;
        assert_eq!(outcome, GuardOutcome::Continue);
        assert!(dry.actions().is_empty());
    }

    #[tokio::test]
    async fn set_welcome_is_used_for_new_members() {
        let (tmp, dry, guard) = setup(true);
        guard.handle_message(&group_msg(ADMIN, "!setwelcome Selamat ngopi!")).await;
        assert!(dry.sent_texts()[0].text.contains("Selamat ngopi!"));

        let reloaded = WelcomeBook::load(tmp.path().join("welcome.json")).unwrap();
        assert_eq!(reloaded.get(GROUP), Some("Selamat ngopi!"));

        let join = GroupJoin { session: "default".into(), chat_id: GROUP.into(), participants: vec![MEMBER.into()] };
        guard.welcome(&join).await;
        let texts = dry.sent_texts();
        let greeting = &texts[1];
        assert_eq!(greeting.text, "Halo @6282222222222, Selamat ngopi!");
        assert_eq!(greeting.mentions, vec![MEMBER.to_string()]);
    }

    #[tokio::test]
    async fn default_welcome_when_none_set() {
        let (_tmp, dry, guard) = setup(true);
        let join = GroupJoin { session: "default".into(), chat_id: GROUP.into(), participants: vec![MEMBER.into()] };
        guard.welcome(&join).await;
        assert_eq!(dry.sent_texts()[0].text, "Halo @6282222222222, Selamat datang!");
    }
}
