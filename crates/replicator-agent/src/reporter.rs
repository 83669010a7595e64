//! Structured reporting of agent lifecycle events.

use std::sync::Arc;

use replicator_config::Config;

use crate::bootstrap::BootstrapError;
use crate::process::LaunchError;
use crate::supervisor::SupervisorError;

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Observer notified as the agent moves through its lifecycle.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked before configuration is resolved at startup.
    fn bootstrap_starting(&self);

    /// Invoked after configuration and telemetry are in place.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once a runner thread has been spawned.
    fn runner_started(&self, generation: u64);

    /// Invoked once a runner has been joined.
    fn runner_stopped(&self, generation: u64);

    /// Invoked when starting or stopping a runner fails.
    fn runner_failed(&self, error: &SupervisorError);

    /// Invoked when a reload signal is handled.
    fn reload_requested(&self);

    /// Invoked when a reload cannot complete.
    fn reload_failed(&self, error: &LaunchError);

    /// Invoked when a termination signal is handled.
    fn shutdown_requested(&self);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn runner_started(&self, generation: u64) {
        (**self).runner_started(generation);
    }

    fn runner_stopped(&self, generation: u64) {
        (**self).runner_stopped(generation);
    }

    fn runner_failed(&self, error: &SupervisorError) {
        (**self).runner_failed(error);
    }

    fn reload_requested(&self) {
        (**self).reload_requested();
    }

    fn reload_failed(&self, error: &LaunchError) {
        (**self).reload_failed(error);
    }

    fn shutdown_requested(&self) {
        (**self).shutdown_requested();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "bootstrap_starting",
            "starting agent bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "bootstrap_succeeded",
            nomad = %config.nomad,
            consul = %config.consul,
            log_level = %config.log_level,
            scaling_interval = config.scaling_interval,
            statsd = config.statsd_address().unwrap_or("disabled"),
            "agent bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "agent bootstrap failed"
        );
    }

    fn runner_started(&self, generation: u64) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "runner_started",
            generation,
            "runner started"
        );
    }

    fn runner_stopped(&self, generation: u64) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "runner_stopped",
            generation,
            "runner stopped"
        );
    }

    fn runner_failed(&self, error: &SupervisorError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "runner_failed",
            error = %error,
            "runner supervision failed"
        );
    }

    fn reload_requested(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "reload_requested",
            "reload signal received; restarting runner"
        );
    }

    fn reload_failed(&self, error: &LaunchError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "reload_failed",
            error = %error,
            "reload failed"
        );
    }

    fn shutdown_requested(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "shutdown_requested",
            "termination signal received; shutting down"
        );
    }
}
