//! Tracing subscriber setup.
//!
//! Components log under their own target (`sortie::store`, `sortie::pipeline`,
//! ...). `RUST_LOG` overrides the configured level when set.
//!
//! Errors that end a run are logged under [`FATAL_TARGET`], which stays
//! enabled at ERROR whatever the filter says.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Target for errors that abort a run.
pub const FATAL_TARGET: &str = "sortie::fatal";

/// Install the global subscriber for a run.
///
/// Logs go to stderr, and additionally to the configured file when
/// `log_to_file` is set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let file_layer = match config.file()? {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(file_layer)
        .with(filter)
        .try_init()
        .map_err(|e| Error::config(format!("failed to install log subscriber: {e}")))
}

/// Stderr-only logging for failures that happen before the config is loaded.
///
/// A no-op when a subscriber is already installed.
pub fn init_fallback() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let level = config.level_filter()?;
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&level.to_string())).map_err(|e| {
            Error::config(format!("invalid logging level '{}': {e}", config.level))
        })?,
    };
    with_fatal_channel(filter)
}

/// Keep [`FATAL_TARGET`] at ERROR even under `RUST_LOG=off` or `sortie=off`.
///
/// The directive is more specific than any `sortie` or global one, so it
/// wins without touching the user's other directives.
fn with_fatal_channel(filter: EnvFilter) -> Result<EnvFilter> {
    let directive: Directive = format!("{FATAL_TARGET}=error")
        .parse()
        .map_err(|e| Error::config(format!("invalid fatal log directive: {e}")))?;
    Ok(filter.add_directive(directive))
}

/// Dependencies stay at warn; sortie's own targets follow the configured level.
fn default_directives(level: &str) -> String {
    format!("warn,sortie={}", level.to_ascii_lowercase())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::filesystem(path, e))
}
