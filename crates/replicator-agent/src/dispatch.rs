//! Routes lifecycle signals to the runner supervisor.

use std::sync::Arc;

use tracing::{debug, info};

use crate::bootstrap::ConfigResolver;
use crate::metrics_handle::{MetricsHandle, install_metrics};
use crate::process::{LaunchError, PROCESS_TARGET};
use crate::reporter::LifecycleReporter;
use crate::runner::RunnerFactory;
use crate::signals::{LifecycleSignal, SignalSource};
use crate::supervisor::RunnerSupervisor;
use crate::telemetry;

/// Outcome of handling a single signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Drives the supervisor from a [`SignalSource`] until termination.
pub struct SignalDispatcher<R, F, S> {
    resolver: R,
    supervisor: RunnerSupervisor<F>,
    signals: S,
    metrics: MetricsHandle,
    reporter: Arc<dyn LifecycleReporter>,
}

impl<R, F, S> SignalDispatcher<R, F, S>
where
    R: ConfigResolver,
    F: RunnerFactory,
    S: SignalSource,
{
    /// Wires the dispatcher around an already started supervisor.
    pub fn new(
        resolver: R,
        supervisor: RunnerSupervisor<F>,
        signals: S,
        metrics: MetricsHandle,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Self {
        Self {
            resolver,
            supervisor,
            signals,
            metrics,
            reporter,
        }
    }

    /// Handles signals until a termination request or a failed reload.
    ///
    /// Returns `Ok` after a clean termination. Any error means the process
    /// should exit with a failure status; the runner has been stopped by then.
    pub fn run(mut self) -> Result<(), LaunchError> {
        loop {
            let signal = self.signals.next_signal()?;
            debug!(target: PROCESS_TARGET, ?signal, "dispatching signal");
            let flow = match signal {
                LifecycleSignal::Terminate => self.terminate()?,
                LifecycleSignal::Reload => self.reload()?,
            };
            if flow == Flow::Exit {
                return Ok(());
            }
        }
    }

    fn terminate(&mut self) -> Result<Flow, LaunchError> {
        self.reporter.shutdown_requested();
        self.stop_runner()?;
        info!(target: PROCESS_TARGET, "agent stopped");
        Ok(Flow::Exit)
    }

    fn reload(&mut self) -> Result<Flow, LaunchError> {
        self.reporter.reload_requested();
        self.stop_runner()?;
        match self.restart() {
            Ok(()) => Ok(Flow::Continue),
            Err(error) => {
                self.reporter.reload_failed(&error);
                Err(error)
            }
        }
    }

    fn restart(&mut self) -> Result<(), LaunchError> {
        let config = self
            .resolver
            .resolve()
            .map_err(|source| LaunchError::Reload { source })?;
        telemetry::initialise(&config)?;
        if !self.metrics.matches(&config) {
            self.metrics = install_metrics(&config)?;
        }
        self.supervisor
            .start(Arc::new(config), self.metrics.clone())?;
        Ok(())
    }

    fn stop_runner(&mut self) -> Result<(), LaunchError> {
        if self.supervisor.is_running() {
            self.supervisor.stop()?;
        }
        Ok(())
    }
}
