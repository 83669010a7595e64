//! Agent bootstrap orchestration.

use std::ffi::OsString;
use std::sync::Arc;

use thiserror::Error;

use replicator_config::{Config, ResolveError};

use crate::metrics_handle::{MetricsHandle, install_metrics};
use crate::reporter::LifecycleReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration resolution for testability.
pub trait ConfigResolver {
    /// Resolves the effective configuration from every layer.
    fn resolve(&self) -> Result<Config, ResolveError>;
}

/// Resolver that re-reads the command line and configuration files.
///
/// The arguments are captured once, so a reload sees the same flags while any
/// `-config` files are read afresh.
#[derive(Debug, Clone, Default)]
pub struct CliConfigResolver {
    args: Vec<OsString>,
}

impl CliConfigResolver {
    /// Captures `args`, excluding the program name.
    pub fn new<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Captures the arguments of the current process.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::args_os().skip(1))
    }
}

impl ConfigResolver for CliConfigResolver {
    fn resolve(&self) -> Result<Config, ResolveError> {
        replicator_config::resolve(self.args.iter().cloned())
    }
}

/// Resolver returning a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigResolver {
    config: Config,
}

impl StaticConfigResolver {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigResolver for StaticConfigResolver {
    fn resolve(&self) -> Result<Config, ResolveError> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to resolve.
    #[error("failed to resolve configuration: {source}")]
    Configuration {
        /// Underlying resolver error.
        #[source]
        source: ResolveError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

impl BootstrapError {
    /// The resolver error, when configuration was the cause.
    #[must_use]
    pub fn resolve_error(&self) -> Option<&ResolveError> {
        match self {
            Self::Configuration { source } => Some(source),
            Self::Telemetry { .. } => None,
        }
    }
}

/// Result of a successful bootstrap invocation.
#[derive(Debug)]
pub struct Bootstrapped {
    config: Arc<Config>,
    metrics: MetricsHandle,
    telemetry: TelemetryHandle,
}

impl Bootstrapped {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Accessor for the metrics handle.
    #[must_use]
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Splits the result into the configuration and metrics handle.
    #[must_use]
    pub fn into_parts(self) -> (Arc<Config>, MetricsHandle) {
        (self.config, self.metrics)
    }
}

/// Resolves configuration and brings up logging and metrics.
pub fn bootstrap_with(
    resolver: &dyn ConfigResolver,
    reporter: &dyn LifecycleReporter,
) -> Result<Bootstrapped, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match resolver.resolve() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let initialised =
        telemetry::initialise(&config).and_then(|handle| Ok((handle, install_metrics(&config)?)));
    let (telemetry, metrics) = match initialised {
        Ok(parts) => parts,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    reporter.bootstrap_succeeded(&config);
    Ok(Bootstrapped {
        config: Arc::new(config),
        metrics,
        telemetry,
    })
}
