//! Kata Bot — WhatsApp keyword auto-reply entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Load the knowledge base (seeded on first run)
//!   6. Build the gateway client
//!   7. Spawn Ctrl-C → shutdown signal watcher
//!   8. Run comms subsystem until shutdown

use tokio_util::sync::CancellationToken;
use tracing::info;

use kata_bot::config::{self, Config};
use kata_bot::error::AppError;
use kata_bot::gateway::providers;
use kata_bot::knowledge::KnowledgeStore;
use kata_bot::logger;
use kata_bot::subsystems::comms;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();

    logger::init(effective_log_level, force_cli_level, config.log_file.as_deref())?;

    info!(
        bot_name = %config.bot_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    std::fs::create_dir_all(&config.work_dir)?;

    let store = KnowledgeStore::new(&config.knowledge_file);
    let knowledge = store.load()?;

    let gateway = providers::build(&config.gateway, config.gateway_api_key.clone())
        .map_err(|e| AppError::Config(e.to_string()))?;

    if config.admin_number.is_none() {
        tracing::warn!("no admin number configured; admin commands are disabled");
    }

    // Shared shutdown token — Ctrl-C cancels it, all tasks watch it.
    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    print_startup_summary(&config, knowledge.len(), gateway.provider_name());

    let handle = comms::start(&config, knowledge, store, gateway, shutdown.clone())?;
    let result = handle.join().await;

    shutdown.cancel();
    let _ = { use std::io::Write as _; std::io::stderr().flush() };

    result
}

fn print_startup_summary(config: &Config, entries: usize, provider: &str) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 58;
        let char_count = text.chars().count();
        if char_count >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let admin = config.admin_number.as_deref().unwrap_or("not configured");
    let moderation = if !config.moderation.enabled {
        "disabled"
    } else if cfg!(feature = "moderation") {
        "enabled"
    } else {
        "configured but not compiled in"
    };

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ 🤖 Kata Bot Status                                           ║");
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 🧾 Bot: {:<52}║", config.bot_name);
    println!("║ 🧠 PID: {:<52}║", std::process::id());
    println!("║ 👤 Admin: {:<50}║", admin);
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 📚 Knowledge                                                 ║");
    println!("║   {}║", fit(format!("{entries} entries in {}", config.knowledge_file.display())));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 📡 Comms                                                     ║");
    println!("║   {}║", fit(format!("🌐 webhook: POST http://{}/webhook", config.webhook.bind)));
    println!("║   {}║", fit(format!("♻️  dedup ttl: {}s", config.webhook.dedup_ttl.as_secs())));
    println!("║   {}║", fit(format!("📤 gateway: {provider} @ {}", config.gateway.base_url)));
    println!("║   {}║", fit(format!("🛡️  moderation: {moderation}")));
    println!("╚══════════════════════════════════════════════════════════════╝");
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: kata-bot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    // Each -v raises verbosity one tier from the config default:
    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug  (routing, dedup, ignored events)
    //   -vvvv+  → trace  (outbound message bodies)
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
