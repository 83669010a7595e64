//! Sequences agent startup and hands control to the signal dispatcher.

use std::sync::Arc;

use tracing::info;

use crate::bootstrap::{CliConfigResolver, ConfigResolver, bootstrap_with};
use crate::dispatch::SignalDispatcher;
use crate::reporter::{LifecycleReporter, StructuredLifecycleReporter};
use crate::runner::{RunnerFactory, ScalingLoopFactory};
use crate::signals::{SignalSource, SystemSignalSource};
use crate::supervisor::RunnerSupervisor;

use super::PROCESS_TARGET;
use super::errors::LaunchError;

/// Collaborators required to run the agent.
pub(crate) struct LaunchPlan<R, F, S> {
    pub(crate) resolver: R,
    pub(crate) factory: F,
    pub(crate) signals: S,
    pub(crate) reporter: Arc<dyn LifecycleReporter>,
}

/// Runs the agent with the production collaborators until it is told to exit.
///
/// Signal handlers are installed before anything else so a signal arriving
/// during bootstrap is queued rather than killing the process.
pub fn run_agent() -> Result<(), LaunchError> {
    let signals = SystemSignalSource::install()?;
    run_agent_with(LaunchPlan {
        resolver: CliConfigResolver::from_env(),
        factory: ScalingLoopFactory,
        signals,
        reporter: Arc::new(StructuredLifecycleReporter::new()),
    })
}

pub(crate) fn run_agent_with<R, F, S>(plan: LaunchPlan<R, F, S>) -> Result<(), LaunchError>
where
    R: ConfigResolver,
    F: RunnerFactory,
    S: SignalSource,
{
    let LaunchPlan {
        resolver,
        factory,
        signals,
        reporter,
    } = plan;

    let (config, metrics) = bootstrap_with(&resolver, reporter.as_ref())?.into_parts();
    info!(
        target: PROCESS_TARGET,
        version = env!("CARGO_PKG_VERSION"),
        "starting replicator agent"
    );

    let mut supervisor = RunnerSupervisor::new(factory, Arc::clone(&reporter));
    supervisor.start(config, metrics.clone())?;

    SignalDispatcher::new(resolver, supervisor, signals, metrics, reporter).run()
}
