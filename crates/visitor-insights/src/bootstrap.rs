use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// `~/.visitor-insights/`, or `./.visitor-insights/` without a home directory.
pub fn app_dir() -> PathBuf {
    app_dir_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
}

pub fn app_dir_in(home: &Path) -> PathBuf {
    home.join(".visitor-insights")
}

/// Ensure the standard `~/.visitor-insights/` directory hierarchy exists.
///
/// Creates the following directories if absent (including any missing parents):
/// - `~/.visitor-insights/`
/// - `~/.visitor-insights/logs/`
/// - `~/.visitor-insights/cache/`
pub fn ensure_directories() -> anyhow::Result<()> {
    ensure_directories_at(&app_dir())
}

pub fn ensure_directories_at(app_dir: &Path) -> anyhow::Result<()> {
    for dir in [app_dir.to_path_buf(), app_dir.join("logs"), app_dir.join("cache")] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// Log file used by the dashboard view when `--log-file` is not given.
pub fn default_log_path() -> PathBuf {
    app_dir().join("logs").join("visitor-insights.log")
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Where log output is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// The dashboard owns the terminal, so it logs to a file; the json view
/// keeps stdout clean and logs to stderr unless a file was requested.
pub fn log_target(view: &str, log_file: Option<&PathBuf>) -> LogTarget {
    match (view, log_file) {
        (_, Some(path)) => LogTarget::File(path.clone()),
        ("dashboard", None) => LogTarget::File(default_log_path()),
        _ => LogTarget::Stderr,
    }
}

/// Map a `--log-level` name to a tracing filter directive.
///
/// Unrecognised names fall back to `"info"`.
pub fn level_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber.
///
/// `RUST_LOG`, when set, overrides `log_level`.
pub fn setup_logging(log_level: &str, target: LogTarget) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(log_level)));

    match target {
        LogTarget::Stderr => {
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
