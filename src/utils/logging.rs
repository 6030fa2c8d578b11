//! Tracing setup for the `loopclaw` binary.
//!
//! The agent file's `logging` section picks the output shape:
//! - `component` (default): one compact line per event with its target, so a
//!   cycle can be followed with plain `grep`. Events sent through
//!   [`log_component!`] also carry a `component` field such as `scheduler`.
//! - `pretty`: multi-line, coloured output for watching an agent by hand.
//! - `json`: one JSON object per line, on stdout or appended to `file`.
//!
//! A non-empty `RUST_LOG` replaces the configured level entirely.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{LoopError, Result};

/// Filter directives in effect: `RUST_LOG` when set, else the agent's level.
fn directives(cfg: &LoggingConfig, from_env: Option<String>) -> String {
    from_env
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| cfg.level.clone())
}

fn build_filter(cfg: &LoggingConfig, from_env: Option<String>) -> Result<EnvFilter> {
    let directives = directives(cfg, from_env);
    EnvFilter::try_new(&directives)
        .map_err(|e| LoopError::Config(format!("invalid log filter '{}': {}", directives, e)))
}

/// Open `path` for appending, creating it when missing.
fn open_log_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber described by `cfg`.
///
/// Must run once, before the engine emits anything. Fails on a malformed
/// filter or a log file that cannot be opened.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = build_filter(cfg, std::env::var("RUST_LOG").ok())?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (cfg.format, cfg.file.as_deref()) {
        (LogFormat::Json, Some(path)) => {
            let file = open_log_file(Path::new(path))?;
            builder.json().with_writer(Mutex::new(file)).init();
        }
        (LogFormat::Json, None) => builder.json().init(),
        (LogFormat::Pretty, _) => builder.pretty().init(),
        (LogFormat::Component, _) => builder.with_target(true).compact().init(),
    }
    Ok(())
}

/// Emit a tracing event tagged with the subsystem that produced it.
///
/// The first token is the level macro to call:
///
/// ```
/// # use loopclaw::log_component;
/// log_component!(info, "scheduler", "No eligible task; idling");
/// log_component!(warn, "engine", "dispatch failed", task = "post-tweet", attempt = 2u64);
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($key:ident = $val:expr),+ $(,)?) => {
        tracing::$level!(component = $component, $($key = $val,)+ $msg)
    };
}
