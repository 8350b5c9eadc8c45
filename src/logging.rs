//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over `[logging].level` when set. Audit records that could
//! not be persisted are logged under the `audit` target, so the log file
//! doubles as their fallback store.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{DropgateError, Result};

fn parse_level(level: &str) -> Level {
    level
        .trim()
        .to_ascii_lowercase()
        .replace("warning", "warn")
        .parse()
        .unwrap_or(Level::INFO)
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(parse_level(level).into()))
}

fn already_installed(e: impl std::fmt::Display) -> DropgateError {
    DropgateError::Config(format!("logging already initialized: {e}"))
}

/// Log to stdout and, unless `file` is empty, append to `file`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if config.file.trim().is_empty() {
        return install_console(&config.level);
    }

    let path = Path::new(&config.file);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let log_file = Arc::new(OpenOptions::new().create(true).append(true).open(path)?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout.and(log_file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter(&config.level))
        .try_init()
        .map_err(already_installed)
}

/// Log to stdout only. Used when the log file cannot be opened.
pub fn init_console_only(level: &str) {
    if let Err(e) = install_console(level) {
        eprintln!("{e}");
    }
}

fn install_console(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter(level))
        .try_init()
        .map_err(already_installed)
}
