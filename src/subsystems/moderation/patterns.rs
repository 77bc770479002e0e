//! Text patterns used by the group guard.

use std::sync::LazyLock;

use regex::Regex;

/// Suffix of personal chat ids.
const CONTACT_SUFFIX: &str = "@c.us";

/// Plain URLs, `www.` hosts, and bare hosts on a handful of common TLDs.
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://[^\s]+|\bwww\.[^\s]+\b|\b\S+\.(com|org|net|id|co\.id|go\.id)\b)").unwrap()
});

/// `@` followed by a phone number, as typed when tagging someone.
static MENTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\d{5,})").unwrap());

pub fn contains_link(text: &str) -> bool {
    LINK_PATTERN.is_match(text)
}

/// Chat ids tagged in `text` via `@<digits>`, in order, without duplicates.
pub fn mentions_in(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for cap in MENTION_PATTERN.captures_iter(text) {
        let id = format!("{}{CONTACT_SUFFIX}", &cap[1]);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// The user part of a chat id (`62811@c.us` → `62811`).
pub fn user_part(chat_id: &str) -> &str {
    chat_id.split('@').next().unwrap_or(chat_id)
}
