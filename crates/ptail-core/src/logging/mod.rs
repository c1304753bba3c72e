//! Diagnostic logging for ptail.
//!
//! - stdout is reserved for the tail stream and the show report
//! - stderr receives all diagnostics (human or JSONL)
//!
//! # Usage
//!
//! ```ignore
//! use ptail_core::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//! tracing::info!(path = "/var/log/app.log", "following");
//! ```

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel, LOG_FORMAT_ENV, LOG_LEVEL_ENV};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events are shown at the configured level.
const LOG_TARGETS: [&str; 3] = ["ptail", "ptail_core", "ptail_config"];

fn env_filter(level: LogLevel) -> EnvFilter {
    let directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    EnvFilter::new(directives.join(","))
}

/// Initialize the logging subsystem.
///
/// Call once at startup. Later calls are ignored.
pub fn init_logging(config: &LogConfig) {
    let filter = env_filter(config.level);

    let result = match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Jsonl => {
            let json_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init()
        }
    };

    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_directives() {
        let filter = env_filter(LogLevel::Debug).to_string();
        assert!(filter.contains("ptail_core=debug"));
        assert!(filter.contains("ptail_config=debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(&LogConfig::default());
        init_logging(&LogConfig::default().with_format(LogFormat::Jsonl));
    }
}
