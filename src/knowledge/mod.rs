//! Knowledge base — ordered keyword → reply-template table.
//!
//! Lookup is first-match-wins over insertion order. A keyword matches when
//! the lowercased, trimmed message contains it anywhere as a substring; no
//! token boundaries are enforced, so `"hai"` also matches `"chai"`.
//!
//! Persistence lives in [`store`]; this module is pure in-memory logic.

pub mod store;

use serde::{Deserialize, Serialize};

pub use store::KnowledgeStore;

/// Placeholders replaced by the sender's display name.
const NAME_PLACEHOLDERS: [&str; 2] = ["{nama}", "{name}"];

/// One keyword-set → reply mapping. Keywords are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub keywords: Vec<String>,
    pub reply: String,
}

impl KnowledgeEntry {
    pub fn new(keyword: &str, reply: impl Into<String>) -> Self {
        Self { keywords: vec![normalize_keyword(keyword)], reply: reply.into() }
    }

    fn matches(&self, cleaned: &str) -> bool {
        self.keywords
            .iter()
            .any(|kw| !kw.is_empty() && cleaned.contains(kw.to_lowercase().as_str()))
    }
}

/// Result of [`KnowledgeBase::add_keyword`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddKeywordOutcome {
    Added,
    AlreadyPresent,
    ReplyNotFound,
}

/// Ordered sequence of [`KnowledgeEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    /// Seed data written when no knowledge file exists yet.
    pub fn seed() -> Self {
        let entry = |keywords: &[&str], reply: &str| KnowledgeEntry {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            reply: reply.to_string(),
        };
        Self::new(vec![
            entry(
                &["halo", "hai", "pagi", "siang", "sore", "malam"],
                "Halo {nama}! Ada yang bisa saya bantu?",
            ),
            entry(&["harga", "berapa", "price", "biaya"], "Harga produk kami mulai dari Rp 50.000."),
            entry(
                &["lokasi", "alamat", "tempat", "dimana"],
                "Kantor pusat kami berlokasi di Jl. Merdeka No. 123, Jakarta.",
            ),
            entry(&["terima kasih", "makasih", "thanks"], "Sama-sama, {nama}! Senang bisa membantu."),
        ])
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the reply of the first entry matching `text`, with every name
    /// placeholder replaced by `sender_name`.
    pub fn find_reply(&self, text: &str, sender_name: &str) -> Option<String> {
        let cleaned = text.trim().to_lowercase();
        if cleaned.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| entry.matches(&cleaned))
            .map(|entry| render_reply(&entry.reply, sender_name))
    }

    /// Append a new single-keyword entry at the end of the table.
    pub fn add_entry(&mut self, keyword: &str, reply: &str) {
        self.entries.push(KnowledgeEntry::new(keyword, reply));
    }

    /// Add `keyword` to the first entry whose reply equals `reply`
    /// (case-insensitive exact match).
    pub fn add_keyword(&mut self, keyword: &str, reply: &str) -> AddKeywordOutcome {
        let keyword = normalize_keyword(keyword);
        let wanted = reply.to_lowercase();
        let Some(entry) = self.entries.iter_mut().find(|e| e.reply.to_lowercase() == wanted) else {
            return AddKeywordOutcome::ReplyNotFound;
        };
        if entry.keywords.iter().any(|k| k.to_lowercase() == keyword) {
            return AddKeywordOutcome::AlreadyPresent;
        }
        entry.keywords.push(keyword);
        AddKeywordOutcome::Added
    }

    /// Remove `keyword` from every entry and drop entries left without
    /// keywords. Returns `true` if at least one entry contained it.
    pub fn remove_keyword(&mut self, keyword: &str) -> bool {
        let keyword = normalize_keyword(keyword);
        let mut removed = false;
        self.entries.retain_mut(|entry| {
            let before = entry.keywords.len();
            entry.keywords.retain(|k| k.to_lowercase() != keyword);
            removed |= entry.keywords.len() < before;
            !entry.keywords.is_empty()
        });
        removed
    }

    /// Lowercase keywords, drop blank ones and entries left with none.
    /// Returns the number of entries dropped.
    pub(crate) fn normalize(&mut self) -> usize {
        let before = self.entries.len();
        for entry in &mut self.entries {
            let mut seen = Vec::with_capacity(entry.keywords.len());
            for kw in entry.keywords.drain(..) {
                let kw = normalize_keyword(&kw);
                if !kw.is_empty() && !seen.contains(&kw) {
                    seen.push(kw);
                }
            }
            entry.keywords = seen;
        }
        self.entries.retain(|e| !e.keywords.is_empty());
        before - self.entries.len()
    }
}

fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Replace all name placeholders in `template` in a single pass.
///
/// The inserted name is never rescanned, so a name that itself contains a
/// placeholder is emitted verbatim.
pub fn render_reply(template: &str, sender_name: &str) -> String {
    let mut out = String::with_capacity(template.len() + sender_name.len());
    let mut rest = template;
    loop {
        let next = NAME_PLACEHOLDERS
            .iter()
            .filter_map(|p| rest.find(p).map(|at| (at, p.len())))
            .min_by_key(|&(at, _)| at);
        let Some((at, len)) = next else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..at]);
        out.push_str(sender_name);
        rest = &rest[at + len..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb(entries: Vec<(Vec<&str>, &str)>) -> KnowledgeBase {
        KnowledgeBase::new(
            entries
                .into_iter()
                .map(|(kws, reply)| KnowledgeEntry {
                    keywords: kws.iter().map(|k| k.to_string()).collect(),
                    reply: reply.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn matches_substring_case_insensitive() {
        let kb = kb(vec![(vec!["halo"], "Hi {nama}!")]);
        assert_eq!(kb.find_reply("Halo gan", "Budi").as_deref(), Some("Hi Budi!"));
        assert_eq!(kb.find_reply("  eh HALOOO  ", "Ani").as_deref(), Some("Hi Ani!"));
        assert_eq!(kb.find_reply("bilang halo dong", "X").as_deref(), Some("Hi X!"));
        assert!(kb.find_reply("selamat datang", "Budi").is_none());
    }

    #[test]
    fn uppercase_stored_keyword_still_matches() {
        let kb = kb(vec![(vec!["HARGA"], "mulai 50rb")]);
        assert_eq!(kb.find_reply("berapa harga nya?", "x").as_deref(), Some("mulai 50rb"));
    }

    #[test]
    fn first_match_wins() {
        let kb = kb(vec![(vec!["pagi"], "first"), (vec!["selamat pagi"], "second")]);
        assert_eq!(kb.find_reply("selamat pagi", "x").as_deref(), Some("first"));
    }

    #[test]
    fn replaces_every_placeholder() {
        let out = render_reply("{nama}, {name} dan {nama} lagi", "Sari");
        assert_eq!(out, "Sari, Sari dan Sari lagi");
        assert_eq!(render_reply("tanpa nama", "Sari"), "tanpa nama");
    }

    #[test]
    fn placeholder_inside_sender_name_is_not_expanded() {
        assert_eq!(render_reply("Hi {nama}!", "x{name}y"), "Hi x{name}y!");
        assert_eq!(render_reply("{name} / {nama}", "{nama}"), "{nama} / {nama}");
    }

    #[test]
    fn blank_input_and_blank_keyword_never_match() {
        let kb = kb(vec![(vec![""], "everything")]);
        assert!(kb.find_reply("apa saja", "x").is_none());
        assert!(KnowledgeBase::seed().find_reply("   ", "x").is_none());
    }

    #[test]
    fn add_entry_appends_lowercase() {
        let mut kb = KnowledgeBase::default();
        kb.add_entry("  Promo ", "Ada diskon {nama}!");
        assert_eq!(kb.entries()[0].keywords, vec!["promo".to_string()]);
        assert_eq!(kb.find_reply("PROMO?", "Budi").as_deref(), Some("Ada diskon Budi!"));
    }

    #[test]
    fn add_keyword_is_idempotent() {
        let mut kb = kb(vec![(vec!["harga"], "Mulai Rp 50.000")]);
        assert_eq!(kb.add_keyword("Ongkos", "mulai rp 50.000"), AddKeywordOutcome::Added);
        assert_eq!(kb.add_keyword("ongkos", "Mulai Rp 50.000"), AddKeywordOutcome::AlreadyPresent);
        assert_eq!(kb.entries()[0].keywords, vec!["harga".to_string(), "ongkos".to_string()]);
        assert_eq!(kb.add_keyword("x", "tidak ada"), AddKeywordOutcome::ReplyNotFound);
    }

    #[test]
    fn remove_keyword_prunes_empty_entries() {
        let mut kb = kb(vec![(vec!["a", "b"], "one"), (vec!["b"], "two"), (vec!["c"], "three")]);
        assert!(kb.remove_keyword("B"));
        assert_eq!(kb.len(), 2);
        assert_eq!(kb.entries()[0].keywords, vec!["a".to_string()]);
        assert_eq!(kb.entries()[1].reply, "three");
        assert!(!kb.remove_keyword("zzz"));
        assert_eq!(kb.len(), 2);
    }

    #[test]
    fn normalize_drops_blank_and_duplicate_keywords() {
        let mut kb = kb(vec![(vec![" Halo ", "halo", ""], "hi"), (vec!["  "], "dead")]);
        assert_eq!(kb.normalize(), 1);
        assert_eq!(kb.entries()[0].keywords, vec!["halo".to_string()]);
    }

    #[test]
    fn seed_answers_greeting() {
        let kb = KnowledgeBase::seed();
        assert_eq!(kb.len(), 4);
        assert_eq!(
            kb.find_reply("selamat pagi", "Rina").as_deref(),
            Some("Halo Rina! Ada yang bisa saya bantu?")
        );
    }
}
