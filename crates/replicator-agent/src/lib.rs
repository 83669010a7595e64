//! Lifecycle supervision for the Replicator autoscaling agent.
//!
//! The agent resolves its configuration once at startup, brings up structured
//! logging and the optional statsd sink, and then runs a single scaling runner
//! on a dedicated thread. From then on the process is driven by signals:
//! `SIGINT`, `SIGTERM` and `SIGQUIT` stop the runner and exit cleanly, while
//! `SIGHUP` stops the runner, resolves the configuration again and starts a
//! fresh runner from it.
//!
//! Metrics are passed to runners as an explicit [`MetricsHandle`] rather than
//! through a process-wide recorder, so a reload with a new statsd address can
//! swap the sink without touching global state.

mod bootstrap;
mod dispatch;
mod metrics_handle;
mod process;
mod reporter;
mod runner;
mod signals;
mod statsd;
mod supervisor;
mod telemetry;

pub use bootstrap::{
    BootstrapError, Bootstrapped, CliConfigResolver, ConfigResolver, StaticConfigResolver,
    bootstrap_with,
};
pub use dispatch::SignalDispatcher;
pub use metrics_handle::{METRIC_PREFIX, MetricsHandle, install_metrics};
pub use process::{LaunchError, run_agent};
pub use reporter::{LifecycleReporter, StructuredLifecycleReporter};
pub use runner::{
    Runner, RunnerError, RunnerFactory, ScalingLoopFactory, ScalingLoopRunner, StopToken,
};
pub use signals::{
    HANDLED_SIGNALS, LifecycleSignal, PendingSignals, SignalError, SignalSource,
    SystemSignalSource,
};
pub use statsd::{StatsdError, StatsdSink};
pub use supervisor::{RunnerSupervisor, SupervisorError};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
