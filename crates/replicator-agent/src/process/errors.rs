//! Defines the unified error surface for agent launch and supervision.

use thiserror::Error;

use replicator_config::ResolveError;

use crate::bootstrap::BootstrapError;
use crate::signals::SignalError;
use crate::supervisor::SupervisorError;
use crate::telemetry::TelemetryError;

/// Errors that end the agent process with a failure status.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the agent failed.
    #[error("agent bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// Starting or stopping the runner failed.
    #[error("runner supervision failed: {source}")]
    Supervisor {
        /// Underlying supervisor error.
        #[source]
        source: SupervisorError,
    },
    /// Waiting for signals failed.
    #[error("failed to await signals: {source}")]
    Signals {
        /// Underlying signal error.
        #[source]
        source: SignalError,
    },
    /// Configuration could not be resolved again after a reload request.
    #[error("failed to reload configuration: {source}")]
    Reload {
        /// Underlying resolver error.
        #[source]
        source: ResolveError,
    },
    /// Telemetry could not be refreshed after a reload request.
    #[error("failed to refresh telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

impl LaunchError {
    /// The resolver error behind this failure, if any.
    #[must_use]
    pub fn resolve_error(&self) -> Option<&ResolveError> {
        match self {
            Self::Bootstrap { source } => source.resolve_error(),
            Self::Reload { source } => Some(source),
            Self::Supervisor { .. } | Self::Signals { .. } | Self::Telemetry { .. } => None,
        }
    }
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<SupervisorError> for LaunchError {
    fn from(source: SupervisorError) -> Self {
        Self::Supervisor { source }
    }
}

impl From<SignalError> for LaunchError {
    fn from(source: SignalError) -> Self {
        Self::Signals { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}
