//! Global `tracing` subscriber setup for the binary.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_PATH_ENV: &str = "RUNSTREAM_LOG_PATH";
pub const DEFAULT_FILTER: &str = "runstream=info";

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Logs go to stderr so they never interleave with the chat on stdout, or are
/// appended to `RUNSTREAM_LOG_PATH` without colours when that is set.
pub fn init() -> Result<()> {
    let log_path = std::env::var(LOG_PATH_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty());
    match log_path {
        Some(path) => init_with_file(Path::new(&path)),
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .try_init();
            Ok(())
        }
    }
}

fn init_with_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .try_init();
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
