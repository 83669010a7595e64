//! Explicit metrics handle passed to runners instead of a global recorder.

use std::fmt;
use std::sync::Arc;

use metrics::{NoopRecorder, Recorder};
use tracing::info;

use replicator_config::Config;

use crate::statsd::StatsdSink;
use crate::telemetry::TelemetryError;

const METRICS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::metrics");

/// Prefix applied to every emitted metric name.
pub const METRIC_PREFIX: &str = "replicator";

/// Shared recorder together with the address it reports to.
#[derive(Clone)]
pub struct MetricsHandle {
    recorder: Arc<dyn Recorder + Send + Sync>,
    address: Option<String>,
}

impl MetricsHandle {
    /// Handle that discards every update.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            recorder: Arc::new(NoopRecorder),
            address: None,
        }
    }

    /// Wraps an arbitrary recorder; useful for tests and alternative sinks.
    #[must_use]
    pub fn from_recorder(recorder: Arc<dyn Recorder + Send + Sync>) -> Self {
        Self {
            recorder,
            address: None,
        }
    }

    /// Statsd address this handle reports to, if any.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Returns true when `config` would produce a sink equivalent to this one.
    #[must_use]
    pub fn matches(&self, config: &Config) -> bool {
        self.address() == config.statsd_address()
    }

    /// Runs `f` with this handle installed as the thread-local recorder, so the
    /// `metrics` macros inside `f` report through it.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(self.recorder.as_ref(), f)
    }
}

impl fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsHandle")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Builds the metrics handle described by `config`.
///
/// An empty statsd address yields a handle that discards updates. A
/// configured address that cannot be resolved or bound is an error.
pub fn install_metrics(config: &Config) -> Result<MetricsHandle, TelemetryError> {
    let Some(address) = config.statsd_address() else {
        info!(target: METRICS_TARGET, "statsd address not configured; metrics disabled");
        return Ok(MetricsHandle::noop());
    };
    let sink = StatsdSink::connect(address, METRIC_PREFIX).map_err(|source| {
        TelemetryError::Sink {
            address: address.to_owned(),
            source,
        }
    })?;
    info!(target: METRICS_TARGET, address, "statsd sink configured");
    Ok(MetricsHandle {
        recorder: Arc::new(sink),
        address: Some(address.to_owned()),
    })
}
