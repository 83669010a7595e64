//! Structured logging initialisation for the agent.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use replicator_config::{Config, LogLevel, LogLevelParseError};

static LOGGING_GUARD: OnceCell<LogLevel> = OnceCell::new();

/// Handle returned once logging has been initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    level: LogLevel,
}

impl TelemetryHandle {
    /// Level the process-wide subscriber was installed with.
    #[must_use]
    pub const fn level(self) -> LogLevel {
        self.level
    }
}

/// Errors encountered while configuring logging or the metrics sink.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log level is not recognised.
    #[error("invalid log level '{value}': {source}")]
    Level {
        /// Offending configuration value.
        value: String,
        /// Underlying parse error.
        #[source]
        source: LogLevelParseError,
    },
    /// Failed to build the log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
    /// The statsd sink could not be constructed.
    #[error("unable to set up telemetry for statsd address '{address}': {source}")]
    Sink {
        /// Configured statsd address.
        address: String,
        /// Underlying sink error.
        #[source]
        source: crate::statsd::StatsdError,
    },
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// The level is validated on every call so a reload with a malformed level is
/// still reported, but only the first successful invocation installs the
/// subscriber. Later calls return the handle of the installed subscriber.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let level = config
        .parse_log_level()
        .map_err(|source| TelemetryError::Level {
            value: config.log_level.clone(),
            source,
        })?;
    LOGGING_GUARD
        .get_or_try_init(|| install_subscriber(level).map(|()| level))
        .map(|installed| TelemetryHandle { level: *installed })
}

fn install_subscriber(level: LogLevel) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(level.filter_directive())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_levels_are_rejected_before_installation() {
        let config = Config {
            log_level: "chatty".to_owned(),
            ..Config::production()
        };
        let error = initialise(&config).expect_err("level should be rejected");
        assert!(matches!(error, TelemetryError::Level { .. }), "{error:?}");
        assert!(error.to_string().contains("chatty"));
    }

    #[test]
    fn repeated_initialisation_is_idempotent() {
        let first = initialise(&Config::production()).expect("first initialisation");
        let second = initialise(&Config::development()).expect("second initialisation");
        assert_eq!(first, second);
        assert_eq!(second.level(), first.level());
    }
}
