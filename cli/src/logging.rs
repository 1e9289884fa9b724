//! # Structured Logging
//!
//! Sets up the `tracing` subscriber: pretty or JSON lines, filtered by
//! `RUST_LOG` when set. Logs go to stderr; stdout carries command output
//! only, so it can be piped.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Installs the global subscriber. Call once, first thing in `main`.
///
/// `default_directives` applies when `RUST_LOG` is unset, e.g.
/// `"donatrade_cli=info,donatrade_protocol=warn"`.
pub fn init_logging(default_directives: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .init();
        }
    }

    tracing::debug!(?format, "logging initialized");
}
