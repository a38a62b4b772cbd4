//! `wallgrid-cli` – WallGrid Command Line Interface
//!
//! This binary is the operator's entry point to the climbing-wall tracker.
//! It:
//!
//! 1. Loads `~/.wallgrid/config.toml` (writing the defaults on first run) and
//!    applies `WALLGRID_*` environment overrides.
//! 2. Opens the SQLite session database.
//! 3. Drops the user into an **interactive REPL** that replays recorded
//!    input streams through a live session (`/load`, `/moves`, `/replay`, …).
//! 4. Intercepts **Ctrl-C** to leave the REPL cleanly.

mod config;
mod input;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use wallgrid_memory::SessionStore;
use wallgrid_runtime::Session;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); WALLGRID_LOG_FORMAT=json
    // switches to newline-delimited JSON.  User-facing output stays on
    // println!.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("WALLGRID_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – leaving WallGrid …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let session = match cfg.session_config().and_then(Session::new) {
        Ok(session) => session,
        Err(e) => {
            println!("{}: {}", "Invalid configuration".red(), e);
            println!("  Using default configuration.");
            match Session::new(wallgrid_runtime::SessionConfig::default()) {
                Ok(session) => session,
                Err(e) => {
                    eprintln!("{}: {}", "Fatal".red().bold(), e);
                    std::process::exit(1);
                }
            }
        }
    };
    println!(
        "  Grid {}×{} tracking {} (hold {} ms, confidence ≥ {:.2})",
        session.config().grid_size.get(),
        session.config().grid_size.get(),
        session.config().limb_set.to_string().bold(),
        session.config().hold_duration_ms,
        session.config().confidence_threshold
    );

    // ── Session database ──────────────────────────────────────────────────
    let store = open_store(&cfg);

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(repl::Shell::new(session, store), shutdown);
}

fn open_store(cfg: &config::Config) -> Option<SessionStore> {
    let path = cfg.database_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        // Only the default location under ~/.wallgrid is locked down.
        let prepared = if cfg.database_path.is_none() {
            config::ensure_private_dir(parent)
        } else {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())
        };
        if let Err(e) = prepared {
            warn!(error = %e, "session database directory unavailable");
        }
    }

    match SessionStore::open(&path.to_string_lossy()) {
        Ok(store) => {
            println!(
                "  Session database {}",
                path.display().to_string().bold()
            );
            Some(store)
        }
        Err(e) => {
            println!(
                "  {} {} ({}); /save and /sessions are disabled.",
                "Session database unavailable:".yellow(),
                path.display(),
                e
            );
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#" _      __     ____  _____     _    __"#.bold().cyan());
    println!("{}", r#"| | /| / /__ _/ / / / ___/____(_)__/ /"#.bold().cyan());
    println!("{}", r#"| |/ |/ / _ `/ / / / (_ / __/ / _  / "#.bold().cyan());
    println!("{}", r#"|__/|__/\_,_/_/_/  \___/_/ /_/\_,_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "WallGrid".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Climbing-wall limb tracker");
    println!();
}
