//! # Replay Logging
//!
//! Stdout carries receipts, summaries and metrics, so every log line goes
//! to stderr. `RUST_LOG` overrides [`DEFAULT_FILTER`] when set.
//!
//! Receipts already carry the host time of each call, so the pretty format
//! drops the wall-clock timestamp. The JSON format keeps it and flattens
//! event fields to the top level, one object per line.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Host and contract activity at `info`; the primitives only when they
/// complain.
pub const DEFAULT_FILTER: &str = "tessera_node=info,tessera_contracts=info,tessera_protocol=warn";

/// Filter used by `init`, which only reports what it wrote.
pub const QUIET_FILTER: &str = "tessera_node=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `"json"` in any case selects JSON; anything else is pretty.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// `RUST_LOG` if it parses, otherwise `fallback`.
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(fallback: &str, format: LogFormat) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(fallback));
    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .without_time()
                    .with_target(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }
    tracing::debug!(?format, "replay logging ready");
    Ok(())
}
