//! Logging setup shared by the plugin daemon and the CLI.
//!
//! ```ignore
//! use calexport_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::daemon())?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

const CRATE_TARGETS: [&str; 4] = [
    "calexport_core",
    "calexport_protocol",
    "calexport_server",
    "calexport_client",
];

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// The level directive did not parse.
    #[error("failed to parse log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
}

/// How log lines look. Built through one of the presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level for this workspace's crates when `RUST_LOG` is unset.
    pub level: Level,
    /// Timestamped JSON lines instead of compact untimed text.
    pub json: bool,
    /// Target, file and line on every event.
    pub source: bool,
    /// Log span open and close.
    pub spans: bool,
}

impl TracingConfig {
    /// Debug output for `--debug` CLI runs.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            json: false,
            source: true,
            spans: false,
        }
    }

    /// Warnings only, without source locations.
    #[must_use]
    pub fn cli() -> Self {
        Self {
            level: Level::WARN,
            json: false,
            source: false,
            spans: false,
        }
    }

    /// JSON output for the plugin daemon.
    #[must_use]
    pub fn daemon() -> Self {
        Self {
            level: Level::INFO,
            json: true,
            source: true,
            spans: true,
        }
    }

    fn directive(&self) -> String {
        let level = self.level.to_string().to_lowercase();
        CRATE_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Installs the global subscriber, writing to stderr. `RUST_LOG` overrides
/// the configured level.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directive()))?;

    let spans = if config.spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.source)
        .with_line_number(config.source)
        .with_target(config.source)
        .with_span_events(spans);
    let layer = if config.json {
        layer.json().boxed()
    } else {
        layer.compact().without_time().boxed()
    };

    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(filter).with(layer))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_presets_stay_quiet_unless_debugging() {
        assert_eq!(TracingConfig::cli().level, Level::WARN);
        assert!(!TracingConfig::cli().source);

        let debug = TracingConfig::cli_debug();
        assert_eq!(debug.level, Level::DEBUG);
        assert!(debug.source);
        assert!(!debug.json);
    }

    #[test]
    fn daemon_logs_json_with_spans() {
        let config = TracingConfig::daemon();
        assert!(config.json);
        assert!(config.spans);
        assert_eq!(config.level, Level::INFO);
    }

    #[test]
    fn directive_covers_workspace_crates() {
        let directive = TracingConfig::cli().directive();
        assert!(directive.contains("calexport_core=warn"));
        assert!(directive.contains("calexport_client=warn"));
        assert!(EnvFilter::try_new(&directive).is_ok());
    }
}
