use strum::{Display, EnumString};

use crate::model::Config;

/// Log verbosity accepted by `-log-level` and the `log_level` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum LogLevel {
    /// Everything, including per-iteration detail.
    #[strum(serialize = "TRACE")]
    Trace,
    /// Diagnostic output for development agents.
    #[strum(serialize = "DEBUG")]
    Debug,
    /// Lifecycle and scaling summaries.
    #[default]
    #[strum(serialize = "INFO")]
    Info,
    /// Recoverable problems.
    #[strum(to_string = "WARN", serialize = "WARNING")]
    Warn,
    /// Failures only.
    #[strum(to_string = "ERROR", serialize = "ERR")]
    Error,
}

impl LogLevel {
    /// Returns the directive understood by `tracing` filters.
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Errors encountered while parsing a [`LogLevel`] from text.
pub type LogLevelParseError = strum::ParseError;

impl Config {
    /// Parses the configured log level.
    pub fn parse_log_level(&self) -> Result<LogLevel, LogLevelParseError> {
        self.log_level.trim().parse()
    }
}
