//! Admin commands — knowledge base editing and pause/resume over chat.
//!
//! Only the configured admin chat id reaches this module. Commands are
//! recognised on the trimmed, lowercased text; arguments are cut from the
//! trimmed original so reply texts keep their casing.
//!
//! ```text
//! !menu
//! !tambah_balasan <keyword>|<reply>
//! !tambah_kata <keyword>|<existing reply>
//! !hapus <keyword>
//! !pause | !start | !status
//! ```
//!
//! Anything else returns `None` from [`parse`] and falls through to the
//! ordinary auto-reply path.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{error, info};

use crate::knowledge::{AddKeywordOutcome, KnowledgeBase, KnowledgeStore};

const CMD_MENU: &str = "!menu";
const CMD_ADD_REPLY: &str = "!tambah_balasan";
const CMD_ADD_KEYWORD: &str = "!tambah_kata";
const CMD_REMOVE: &str = "!hapus";
const CMD_PAUSE: &str = "!pause";
const CMD_START: &str = "!start";
const CMD_STATUS: &str = "!status";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Menu,
    AddReply { keyword: String, reply: String },
    AddKeyword { keyword: String, reply: String },
    RemoveKeyword { keyword: String },
    Pause,
    Start,
    Status,
}

/// A recognised command with unusable arguments. The message is shown to the admin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Format salah. Gunakan:\n!tambah_balasan <kata kunci>|<balasan baru>")]
    AddReplyFormat,
    #[error("Format salah. Gunakan:\n!tambah_kata <kata kunci baru>|<balasan yang sudah ada>")]
    AddKeywordFormat,
    #[error("Format salah. Gunakan:\n!hapus <kata kunci>")]
    RemoveFormat,
}

/// Recognise an admin command in `text`.
///
/// `None` means "not a command"; `Some(Err(_))` means a known command whose
/// arguments are missing or malformed.
pub fn parse(text: &str) -> Option<Result<AdminCommand, CommandError>> {
    let trimmed = text.trim();
    let cleaned = trimmed.to_lowercase();

    let simple = match cleaned.as_str() {
        CMD_MENU => Some(AdminCommand::Menu),
        CMD_PAUSE => Some(AdminCommand::Pause),
        CMD_START => Some(AdminCommand::Start),
        CMD_STATUS => Some(AdminCommand::Status),
        _ => None,
    };
    if let Some(cmd) = simple {
        return Some(Ok(cmd));
    }

    if let Some(args) = command_args(trimmed, &cleaned, CMD_ADD_REPLY) {
        return Some(
            split_pair(args)
                .map(|(keyword, reply)| AdminCommand::AddReply { keyword, reply })
                .ok_or(CommandError::AddReplyFormat),
        );
    }
    if let Some(args) = command_args(trimmed, &cleaned, CMD_ADD_KEYWORD) {
        return Some(
            split_pair(args)
                .map(|(keyword, reply)| AdminCommand::AddKeyword { keyword, reply })
                .ok_or(CommandError::AddKeywordFormat),
        );
    }
    if let Some(args) = command_args(trimmed, &cleaned, CMD_REMOVE) {
        let keyword = args.trim().to_lowercase();
        if keyword.is_empty() {
            return Some(Err(CommandError::RemoveFormat));
        }
        return Some(Ok(AdminCommand::RemoveKeyword { keyword }));
    }

    None
}

/// Arguments following `name` when `cleaned` is exactly `name` or `name` + whitespace.
fn command_args<'a>(trimmed: &'a str, cleaned: &str, name: &str) -> Option<&'a str> {
    let rest = cleaned.strip_prefix(name)?;
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    // Lowercasing can change byte lengths for non-ASCII text; the command
    // name itself is ASCII, so the same prefix length applies to `trimmed`.
    trimmed.get(name.len()..)
}

/// Split `kw|reply` into two non-empty trimmed parts. The keyword is lowercased.
fn split_pair(args: &str) -> Option<(String, String)> {
    let mut parts = args.split('|');
    let keyword = parts.next()?.trim();
    let reply = parts.next()?.trim();
    if parts.next().is_some() || keyword.is_empty() || reply.is_empty() {
        return None;
    }
    Some((keyword.to_lowercase(), reply.to_string()))
}

/// Run `command` against the knowledge base and bot state, returning the
/// acknowledgement text for the admin.
///
/// Mutations are persisted before the acknowledgement is built. A failed
/// save is logged; the in-memory table stays authoritative.
pub fn execute(
    command: AdminCommand,
    kb: &mut KnowledgeBase,
    store: &KnowledgeStore,
    active: &AtomicBool,
) -> String {
    match command {
        AdminCommand::Menu => render_menu(kb),
        AdminCommand::AddReply { keyword, reply } => {
            kb.add_entry(&keyword, &reply);
            persist(kb, store);
            info!(%keyword, "admin added reply");
            format!("✅ Balasan baru untuk kata kunci \"{keyword}\" berhasil ditambahkan.")
        }
        AdminCommand::AddKeyword { keyword, reply } => match kb.add_keyword(&keyword, &reply) {
            AddKeywordOutcome::Added => {
                persist(kb, store);
                info!(%keyword, "admin added keyword");
                format!("✅ Kata kunci \"{keyword}\" berhasil ditambahkan.")
            }
            AddKeywordOutcome::AlreadyPresent => {
                format!("⚠️ Kata kunci \"{keyword}\" sudah ada untuk balasan tersebut.")
            }
            AddKeywordOutcome::ReplyNotFound => format!("❌ Balasan \"{reply}\" tidak ditemukan."),
        },
        AdminCommand::RemoveKeyword { keyword } => {
            if kb.remove_keyword(&keyword) {
                persist(kb, store);
                info!(%keyword, remaining = kb.len(), "admin removed keyword");
                format!("🗑️ Kata kunci \"{keyword}\" berhasil dihapus.")
            } else {
                format!("❌ Kata kunci \"{keyword}\" tidak ditemukan.")
            }
        }
        AdminCommand::Pause => {
            active.store(false, Ordering::SeqCst);
            info!("bot paused by admin");
            "⏸️ Bot telah dipause.".to_string()
        }
        AdminCommand::Start => {
            active.store(true, Ordering::SeqCst);
            info!("bot resumed by admin");
            "▶️ Bot telah diaktifkan kembali.".to_string()
        }
        AdminCommand::Status => {
            let status = if active.load(Ordering::SeqCst) { "✅ Aktif" } else { "⏸️ Paused" };
            format!(
                "📊 *Status Bot Saat Ini* 📊\n\n- Status: {status}\n- Jumlah Data Balasan: {}",
                kb.len()
            )
        }
    }
}

fn persist(kb: &KnowledgeBase, store: &KnowledgeStore) {
    if let Err(e) = store.save(kb) {
        error!("failed to persist knowledge base: {e}");
    }
}

fn render_menu(kb: &KnowledgeBase) -> String {
    if kb.is_empty() {
        return "Belum ada kata kunci yang terdaftar.".to_string();
    }
    let mut out = String::from("📖 *Daftar Kata Kunci & Balasan*\n\n");
    for (i, entry) in kb.entries().iter().enumerate() {
        out.push_str(&format!("*{}. Balasan:*\n_\"{}\"_\n", i + 1, entry.reply));
        out.push_str(&format!("* Kata Kunci:*\n`{}`\n\n", entry.keywords.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(kb: KnowledgeBase) -> (TempDir, KnowledgeStore, KnowledgeBase, AtomicBool) {
        let tmp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(tmp.path().join("knowledge.json"));
        store.save(&kb).unwrap();
        (tmp, store, kb, AtomicBool::new(true))
    }

    #[test]
    fn parses_simple_commands_case_insensitively() {
        assert_eq!(parse("!menu"), Some(Ok(AdminCommand::Menu)));
        assert_eq!(parse("  !PAUSE "), Some(Ok(AdminCommand::Pause)));
        assert_eq!(parse("!start"), Some(Ok(AdminCommand::Start)));
        assert_eq!(parse("!Status"), Some(Ok(AdminCommand::Status)));
    }

    #[test]
    fn non_commands_fall_through() {
        assert_eq!(parse("halo"), None);
        assert_eq!(parse("!menus"), None);
        assert_eq!(parse("!hapusan"), None);
        assert_eq!(parse("!unknown thing"), None);
    }

    #[test]
    fn add_reply_keeps_reply_case_and_lowercases_keyword() {
        assert_eq!(
            parse("!tambah_balasan Promo | Diskon 20% untuk {nama}!"),
            Some(Ok(AdminCommand::AddReply {
                keyword: "promo".into(),
                reply: "Diskon 20% untuk {nama}!".into()
            }))
        );
    }

    #[test]
    fn malformed_pairs_are_format_errors() {
        assert_eq!(parse("!tambah_balasan promo"), Some(Err(CommandError::AddReplyFormat)));
        assert_eq!(parse("!tambah_balasan |reply"), Some(Err(CommandError::AddReplyFormat)));
        assert_eq!(parse("!tambah_balasan a|b|c"), Some(Err(CommandError::AddReplyFormat)));
        assert_eq!(parse("!tambah_kata ongkos|"), Some(Err(CommandError::AddKeywordFormat)));
        assert_eq!(parse("!tambah_balasan"), Some(Err(CommandError::AddReplyFormat)));
        assert_eq!(parse("!hapus   "), Some(Err(CommandError::RemoveFormat)));
        assert!(CommandError::AddReplyFormat.to_string().starts_with("Format salah"));
    }

    #[test]
    fn add_reply_persists() {
        let (_tmp, store, mut kb, active) = setup(KnowledgeBase::default());
        let cmd = AdminCommand::AddReply { keyword: "promo".into(), reply: "Diskon!".into() };
        let ack = execute(cmd, &mut kb, &store, &active);
        assert!(ack.contains("berhasil ditambahkan"));
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn add_keyword_twice_reports_already_exists() {
        let mut seed = KnowledgeBase::default();
        seed.add_entry("harga", "Mulai Rp 50.000");
        let (_tmp, store, mut kb, active) = setup(seed);

        let cmd = || AdminCommand::AddKeyword { keyword: "ongkos".into(), reply: "mulai rp 50.000".into() };
        assert!(execute(cmd(), &mut kb, &store, &active).starts_with("✅"));
        let second = execute(cmd(), &mut kb, &store, &active);
        assert!(second.contains("sudah ada"));
        assert_eq!(store.load().unwrap().entries()[0].keywords, vec!["harga".to_string(), "ongkos".to_string()]);

        let missing = AdminCommand::AddKeyword { keyword: "x".into(), reply: "nope".into() };
        assert!(execute(missing, &mut kb, &store, &active).contains("tidak ditemukan"));
    }

    #[test]
    fn remove_prunes_and_persists() {
        let mut seed = KnowledgeBase::default();
        seed.add_entry("promo", "Diskon!");
        seed.add_entry("harga", "Murah");
        let (_tmp, store, mut kb, active) = setup(seed);

        let ack = execute(AdminCommand::RemoveKeyword { keyword: "promo".into() }, &mut kb, &store, &active);
        assert!(ack.contains("berhasil dihapus"));
        let persisted = store.load().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted.entries()[0].reply, "Murah");

        let ack = execute(AdminCommand::RemoveKeyword { keyword: "promo".into() }, &mut kb, &store, &active);
        assert!(ack.contains("tidak ditemukan"));
    }

    #[test]
    fn pause_start_and_status() {
        let (_tmp, store, mut kb, active) = setup(KnowledgeBase::seed());
        execute(AdminCommand::Pause, &mut kb, &store, &active);
        assert!(!active.load(Ordering::SeqCst));
        let status = execute(AdminCommand::Status, &mut kb, &store, &active);
        assert!(status.contains("Paused"));
        assert!(status.contains("Jumlah Data Balasan: 4"));
        execute(AdminCommand::Start, &mut kb, &store, &active);
        assert!(active.load(Ordering::SeqCst));
    }

    #[test]
    fn menu_lists_entries_or_empty_notice() {
        let (_tmp, store, mut kb, active) = setup(KnowledgeBase::seed());
        let menu = execute(AdminCommand::Menu, &mut kb, &store, &active);
        assert!(menu.contains("*1. Balasan:*"));
        assert!(menu.contains("`halo, hai, pagi, siang, sore, malam`"));

        let mut empty = KnowledgeBase::default();
        assert_eq!(execute(AdminCommand::Menu, &mut empty, &store, &active), "Belum ada kata kunci yang terdaftar.");
    }
}
