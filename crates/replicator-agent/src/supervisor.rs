//! Owns at most one running runner and its thread.

use std::io;
use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tracing::{debug, warn};

use replicator_config::Config;

use crate::metrics_handle::MetricsHandle;
use crate::reporter::LifecycleReporter;
use crate::runner::{Runner, RunnerError, RunnerFactory, StopToken};

const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");

/// Errors surfaced by [`RunnerSupervisor`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A runner is already active.
    #[error("runner generation {generation} is already running")]
    AlreadyRunning {
        /// Generation of the active runner.
        generation: u64,
    },
    /// Stop was requested with no active runner.
    #[error("no runner is running")]
    NotRunning,
    /// The factory refused the configuration.
    #[error("failed to construct runner: {source}")]
    Construction {
        /// Underlying factory error.
        #[source]
        source: RunnerError,
    },
    /// The runner thread could not be spawned.
    #[error("failed to spawn runner thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The runner thread panicked before it could be joined.
    #[error("runner generation {generation} panicked")]
    RunnerPanicked {
        /// Generation of the runner that panicked.
        generation: u64,
    },
}

struct ActiveRunner {
    generation: u64,
    stop: StopToken,
    handle: thread::JoinHandle<()>,
}

impl ActiveRunner {
    fn shutdown(self) -> Result<u64, SupervisorError> {
        let generation = self.generation;
        self.stop.request_stop();
        self.handle
            .join()
            .map(|()| generation)
            .map_err(|_| SupervisorError::RunnerPanicked { generation })
    }
}

/// Supervisor states. `Running` always owns exactly one runner thread.
enum State {
    Stopped,
    Running(ActiveRunner),
}

/// Starts, stops and tracks the single active runner.
///
/// `start` returns as soon as the runner thread has been spawned; `stop`
/// signals the runner and blocks until its thread has finished.
pub struct RunnerSupervisor<F> {
    factory: F,
    reporter: Arc<dyn LifecycleReporter>,
    state: State,
    generation: u64,
}

impl<F> RunnerSupervisor<F> {
    /// Creates a stopped supervisor.
    pub fn new(factory: F, reporter: Arc<dyn LifecycleReporter>) -> Self {
        Self {
            factory,
            reporter,
            state: State::Stopped,
            generation: 0,
        }
    }

    /// Returns true while a runner thread is owned.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    /// Number of runners started so far; the active runner carries this value.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Signals the active runner and waits for its thread to finish.
    pub fn stop(&mut self) -> Result<u64, SupervisorError> {
        let State::Running(active) = std::mem::replace(&mut self.state, State::Stopped) else {
            return Err(SupervisorError::NotRunning);
        };
        debug!(
            target: SUPERVISOR_TARGET,
            generation = active.generation,
            "stopping runner"
        );
        match active.shutdown() {
            Ok(generation) => {
                self.reporter.runner_stopped(generation);
                Ok(generation)
            }
            Err(error) => {
                self.reporter.runner_failed(&error);
                Err(error)
            }
        }
    }
}

impl<F> RunnerSupervisor<F>
where
    F: RunnerFactory,
{
    /// Builds a runner from `config` and runs it on a dedicated thread.
    pub fn start(
        &mut self,
        config: Arc<Config>,
        metrics: MetricsHandle,
    ) -> Result<u64, SupervisorError> {
        if let State::Running(active) = &self.state {
            return Err(SupervisorError::AlreadyRunning {
                generation: active.generation,
            });
        }

        let runner = match self.factory.build(config, metrics) {
            Ok(runner) => runner,
            Err(source) => return Err(self.fail(SupervisorError::Construction { source })),
        };

        let generation = self.generation + 1;
        let stop = StopToken::new();
        let runner_stop = stop.clone();
        let spawned = thread::Builder::new()
            .name(format!("runner-{generation}"))
            .spawn(move || runner.run(runner_stop));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(source) => return Err(self.fail(SupervisorError::Spawn { source })),
        };

        self.generation = generation;
        self.state = State::Running(ActiveRunner {
            generation,
            stop,
            handle,
        });
        self.reporter.runner_started(generation);
        Ok(generation)
    }

    fn fail(&self, error: SupervisorError) -> SupervisorError {
        self.reporter.runner_failed(&error);
        error
    }
}

impl<F> Drop for RunnerSupervisor<F> {
    fn drop(&mut self) {
        if let State::Running(active) = std::mem::replace(&mut self.state, State::Stopped) {
            if let Err(error) = active.shutdown() {
                warn!(target: SUPERVISOR_TARGET, %error, "runner failed during teardown");
            }
        }
    }
}
