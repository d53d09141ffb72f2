//! Tracing setup for the `buildmode` binary.
//!
//! Log lines go to stderr; stdout belongs to the tools being run and to
//! `--dry-run` output.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Shape of emitted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines for interactive CI logs.
    #[default]
    Text,

    /// One JSON object per line for log collectors.
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Filter used when `RUST_LOG` is unset or unparseable.
fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, in which case
/// the existing one keeps running.
pub fn init_tracing(format: LogFormat, level: Level) -> bool {
    let base = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let output = match format {
        LogFormat::Text => base.boxed(),
        LogFormat::Json => base.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(output.with_filter(build_filter(level)))
        .try_init()
        .is_ok()
}
