//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or an explicit `-f` path), then applies
//! `KATA_WORK_DIR`, `KATA_LOG_LEVEL`, `KATA_ADMIN_NUMBER` and
//! `KATA_GATEWAY_URL` env overrides. The gateway API key is read from
//! `GATEWAY_API_KEY` only and is never sourced from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::AppError;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Webhook listener configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Socket address the webhook listener binds to.
    pub bind: String,
    /// How long a delivered message id suppresses redeliveries.
    pub dedup_ttl: Duration,
}

/// Messaging gateway configuration (`[gateway]`).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Which gateway backend is active (`"waha"` or `"dry_run"`).
    pub provider: String,
    /// Base URL of the gateway, e.g. `http://localhost:3000`.
    pub base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Group guard configuration (`[moderation]`).
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub enabled: bool,
    /// Greeting used for groups that have no `!setwelcome` text.
    pub welcome_message: String,
    /// Where per-group welcome texts are persisted (already resolved against `work_dir`).
    pub welcome_file: PathBuf,
}

/// Fully-resolved bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Optional log file; stderr when unset.
    pub log_file: Option<PathBuf>,
    /// Knowledge base JSON file (already resolved against `work_dir`).
    pub knowledge_file: PathBuf,
    /// Chat identifier allowed to run admin commands, e.g. `628123@c.us`.
    /// `None` disables admin commands entirely.
    pub admin_number: Option<String>,
    /// Display name substituted for `{nama}` when the sender has none.
    pub default_sender_name: String,
    pub webhook: WebhookConfig,
    pub gateway: GatewayConfig,
    pub moderation: ModerationConfig,
    /// API key from `GATEWAY_API_KEY` env var, sent as `X-Api-Key`.
    pub gateway_api_key: Option<String>,
}

/// Env-var overrides applied on top of the TOML values.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub admin_number: Option<String>,
    pub gateway_url: Option<String>,
    pub gateway_api_key: Option<String>,
}

impl Overrides {
    /// Collect overrides from the process environment.
    pub fn from_env() -> Self {
        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            work_dir: non_empty("KATA_WORK_DIR"),
            log_level: non_empty("KATA_LOG_LEVEL"),
            admin_number: non_empty("KATA_ADMIN_NUMBER"),
            gateway_url: non_empty("KATA_GATEWAY_URL"),
            gateway_api_key: non_empty("GATEWAY_API_KEY"),
        }
    }
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    supervisor: RawSupervisor,
    #[serde(default)]
    knowledge: RawKnowledge,
    #[serde(default)]
    admin: RawAdmin,
    #[serde(default)]
    webhook: RawWebhook,
    #[serde(default)]
    gateway: RawGateway,
    #[serde(default)]
    autoreply: RawAutoreply,
    #[serde(default)]
    moderation: RawModeration,
}

#[derive(Deserialize)]
struct RawSupervisor {
    #[serde(default = "default_bot_name")]
    bot_name: String,
    #[serde(default = "default_work_dir")]
    work_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

impl Default for RawSupervisor {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            work_dir: default_work_dir(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

#[derive(Deserialize)]
struct RawKnowledge {
    #[serde(default = "default_knowledge_file")]
    file: String,
}

impl Default for RawKnowledge {
    fn default() -> Self {
        Self { file: default_knowledge_file() }
    }
}

#[derive(Deserialize, Default)]
struct RawAdmin {
    #[serde(default)]
    number: Option<String>,
}

#[derive(Deserialize)]
struct RawWebhook {
    #[serde(default = "default_webhook_bind")]
    bind: String,
    #[serde(default = "default_dedup_ttl_seconds")]
    dedup_ttl_seconds: u64,
}

impl Default for RawWebhook {
    fn default() -> Self {
        Self { bind: default_webhook_bind(), dedup_ttl_seconds: default_dedup_ttl_seconds() }
    }
}

#[derive(Deserialize)]
struct RawGateway {
    /// Maps to `default = "..."` in `[gateway]`.
    #[serde(rename = "default", default = "default_gateway_provider")]
    provider: String,
    #[serde(default = "default_gateway_base_url")]
    base_url: String,
    #[serde(default = "default_gateway_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawGateway {
    fn default() -> Self {
        Self {
            provider: default_gateway_provider(),
            base_url: default_gateway_base_url(),
            timeout_seconds: default_gateway_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawAutoreply {
    #[serde(default = "default_sender_name")]
    default_sender_name: String,
}

impl Default for RawAutoreply {
    fn default() -> Self {
        Self { default_sender_name: default_sender_name() }
    }
}

#[derive(Deserialize)]
struct RawModeration {
    #[serde(default = "default_false")]
    enabled: bool,
    #[serde(default = "default_welcome_message")]
    welcome_message: String,
    #[serde(default = "default_welcome_file")]
    welcome_file: String,
}

impl Default for RawModeration {
    fn default() -> Self {
        Self {
            enabled: false,
            welcome_message: default_welcome_message(),
            welcome_file: default_welcome_file(),
        }
    }
}

fn default_bot_name() -> String { "kata-bot".to_string() }
fn default_work_dir() -> String { "~/.kata-bot".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_knowledge_file() -> String { "knowledge.json".to_string() }
fn default_webhook_bind() -> String { "0.0.0.0:5000".to_string() }
fn default_dedup_ttl_seconds() -> u64 { 60 }
fn default_gateway_provider() -> String { "waha".to_string() }
fn default_gateway_base_url() -> String { "http://localhost:3000".to_string() }
fn default_gateway_timeout_seconds() -> u64 { 15 }
fn default_sender_name() -> String { "Kak".to_string() }
fn default_welcome_message() -> String {
    "Selamat datang di grup! Pastikan untuk membaca peraturan dan bersikap sopan.".to_string()
}
fn default_welcome_file() -> String { "welcome.json".to_string() }

fn default_false() -> bool {
    false
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = Overrides::from_env();
    match config_path {
        Some(path) => load_from(Path::new(path), &overrides),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_from(default_path, &overrides)
            } else {
                resolve(RawConfig::default(), &overrides)
            }
        }
    }
}

/// Internal loader — accepts an explicit path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    resolve(parsed, overrides)
}

fn resolve(parsed: RawConfig, overrides: &Overrides) -> Result<Config, AppError> {
    let s = parsed.supervisor;

    let work_dir = expand_home(overrides.work_dir.as_deref().unwrap_or(&s.work_dir));
    let log_level = overrides.log_level.clone().unwrap_or(s.log_level);
    let log_file = s.log_file.map(|p| resolve_in(&work_dir, &p));

    if parsed.webhook.dedup_ttl_seconds == 0 {
        return Err(AppError::Config("[webhook].dedup_ttl_seconds must be > 0".into()));
    }

    let admin_number = overrides
        .admin_number
        .clone()
        .or(parsed.admin.number)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let base_url = overrides
        .gateway_url
        .clone()
        .unwrap_or(parsed.gateway.base_url)
        .trim_end_matches('/')
        .to_string();
    if base_url.is_empty() {
        return Err(AppError::Config("[gateway].base_url must not be empty".into()));
    }

    Ok(Config {
        bot_name: s.bot_name,
        knowledge_file: resolve_in(&work_dir, &parsed.knowledge.file),
        log_level,
        log_file,
        admin_number,
        default_sender_name: parsed.autoreply.default_sender_name,
        webhook: WebhookConfig {
            bind: parsed.webhook.bind,
            dedup_ttl: Duration::from_secs(parsed.webhook.dedup_ttl_seconds),
        },
        gateway: GatewayConfig {
            provider: parsed.gateway.provider,
            base_url,
            timeout_seconds: parsed.gateway.timeout_seconds,
        },
        moderation: ModerationConfig {
            enabled: parsed.moderation.enabled,
            welcome_message: parsed.moderation.welcome_message,
            welcome_file: resolve_in(&work_dir, &parsed.moderation.welcome_file),
        },
        gateway_api_key: overrides.gateway_api_key.clone(),
        work_dir,
    })
}

/// Resolve `path` against `base` unless it is absolute or `~`-prefixed.
fn resolve_in(base: &Path, path: &str) -> PathBuf {
    let p = expand_home(path);
    if p.is_absolute() { p } else { base.join(p) }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// Safe `Config` for tests — dry-run gateway, no API keys, no external calls.
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            bot_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            knowledge_file: work_dir.join("knowledge.json"),
            admin_number: Some("6281100000000@c.us".into()),
            default_sender_name: default_sender_name(),
            webhook: WebhookConfig {
                bind: "127.0.0.1:0".into(),
                dedup_ttl: Duration::from_secs(default_dedup_ttl_seconds()),
            },
            gateway: GatewayConfig {
                provider: "dry_run".into(),
                base_url: "http://localhost:0".into(),
                timeout_seconds: 1,
            },
            moderation: ModerationConfig {
                enabled: false,
                welcome_message: default_welcome_message(),
                welcome_file: work_dir.join("welcome.json"),
            },
            gateway_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[supervisor]
bot_name = "test-bot"
work_dir = "/tmp/kata-test"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), &Overrides::default()).unwrap();
        assert_eq!(cfg.bot_name, "test-bot");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.knowledge_file, PathBuf::from("/tmp/kata-test/knowledge.json"));
        assert_eq!(cfg.webhook.dedup_ttl, Duration::from_secs(60));
        assert_eq!(cfg.gateway.provider, "waha");
        assert_eq!(cfg.default_sender_name, "Kak");
        assert!(cfg.admin_number.is_none());
        assert!(!cfg.moderation.enabled);
    }

    #[test]
    fn full_config_sections() {
        let f = write_toml(
            r#"
[supervisor]
work_dir = "/srv/kata"

[knowledge]
file = "/data/kb.json"

[admin]
number = " 6281330639240@c.us "

[webhook]
bind = "127.0.0.1:5001"
dedup_ttl_seconds = 30

[gateway]
default = "dry_run"
base_url = "http://gateway:3000/"

[moderation]
enabled = true
welcome_file = "groups/welcome.json"
"#,
        );
        let cfg = load_from(f.path(), &Overrides::default()).unwrap();
        assert_eq!(cfg.knowledge_file, PathBuf::from("/data/kb.json"));
        assert_eq!(cfg.admin_number.as_deref(), Some("6281330639240@c.us"));
        assert_eq!(cfg.webhook.bind, "127.0.0.1:5001");
        assert_eq!(cfg.webhook.dedup_ttl, Duration::from_secs(30));
        assert_eq!(cfg.gateway.provider, "dry_run");
        assert_eq!(cfg.gateway.base_url, "http://gateway:3000");
        assert!(cfg.moderation.enabled);
        assert_eq!(cfg.moderation.welcome_file, PathBuf::from("/srv/kata/groups/welcome.json"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.kata-bot");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".kata-bot"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), &Overrides::default());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn zero_dedup_ttl_rejected() {
        let f = write_toml("[webhook]\ndedup_ttl_seconds = 0\n");
        assert!(load_from(f.path(), &Overrides::default()).is_err());
    }

    #[test]
    fn env_overrides_win() {
        let f = write_toml(MINIMAL_TOML);
        let overrides = Overrides {
            work_dir: Some("/tmp/test-override".into()),
            log_level: Some("debug".into()),
            admin_number: Some("628999@c.us".into()),
            gateway_url: Some("http://waha:3000".into()),
            gateway_api_key: Some("secret".into()),
        };
        let cfg = load_from(f.path(), &overrides).unwrap();
        assert_eq!(cfg.work_dir, PathBuf::from("/tmp/test-override"));
        assert_eq!(cfg.knowledge_file, PathBuf::from("/tmp/test-override/knowledge.json"));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.admin_number.as_deref(), Some("628999@c.us"));
        assert_eq!(cfg.gateway.base_url, "http://waha:3000");
        assert_eq!(cfg.gateway_api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn empty_admin_number_disables_admin() {
        let f = write_toml("[admin]\nnumber = \"\"\n");
        let cfg = load_from(f.path(), &Overrides::default()).unwrap();
        assert!(cfg.admin_number.is_none());
    }
}
