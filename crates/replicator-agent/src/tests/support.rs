//! Test doubles shared by the agent unit and behavioural suites.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use replicator_config::{Config, ResolveError, resolve};

use crate::bootstrap::{BootstrapError, ConfigResolver};
use crate::metrics_handle::MetricsHandle;
use crate::process::LaunchError;
use crate::process::launch::{LaunchPlan, run_agent_with};
use crate::reporter::LifecycleReporter;
use crate::runner::{Runner, RunnerError, RunnerFactory, StopToken};
use crate::signals::{LifecycleSignal, SignalError, SignalSource};
use crate::supervisor::SupervisorError;

/// Observable step in the agent's interaction with its collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Resolved,
    Built(u64),
    Started(u64),
    Stopped(u64),
}

/// Ordered record of events across threads.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn push(&self, event: Event) {
        self.events.lock().expect("event log mutex poisoned").push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("event log mutex poisoned").clone()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|event| matches(event)).count()
    }
}

/// Factory whose runners log their lifecycle and track concurrency.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunnerFactory {
    log: EventLog,
    builds: Arc<AtomicU64>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    fail_from: Arc<AtomicU64>,
    configs: Arc<Mutex<Vec<Arc<Config>>>>,
}

impl RecordingRunnerFactory {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Fails every build after the first `builds` successful ones.
    pub fn fail_after(&self, builds: u64) {
        self.fail_from.store(builds + 1, Ordering::SeqCst);
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn configs(&self) -> Vec<Arc<Config>> {
        self.configs.lock().expect("config mutex poisoned").clone()
    }
}

impl RunnerFactory for RecordingRunnerFactory {
    type Runner = RecordingRunner;

    fn build(
        &self,
        config: Arc<Config>,
        _metrics: MetricsHandle,
    ) -> Result<RecordingRunner, RunnerError> {
        let attempt = self.builds.load(Ordering::SeqCst) + 1;
        let fail_from = self.fail_from.load(Ordering::SeqCst);
        if fail_from != 0 && attempt >= fail_from {
            return Err(RunnerError::Rejected {
                reason: format!("build {attempt} refused"),
            });
        }
        self.builds.store(attempt, Ordering::SeqCst);
        self.configs
            .lock()
            .expect("config mutex poisoned")
            .push(config);
        self.log.push(Event::Built(attempt));
        Ok(RecordingRunner {
            id: attempt,
            log: self.log.clone(),
            active: Arc::clone(&self.active),
            max_active: Arc::clone(&self.max_active),
        })
    }
}

pub struct RecordingRunner {
    id: u64,
    log: EventLog,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl Runner for RecordingRunner {
    fn run(self, stop: StopToken) {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.log.push(Event::Started(self.id));
        stop.wait();
        self.log.push(Event::Stopped(self.id));
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Resolver that logs each call and fails once its budget is spent.
#[derive(Debug, Clone)]
pub struct RecordingResolver {
    log: EventLog,
    config: Config,
    remaining: Option<Arc<AtomicUsize>>,
}

impl RecordingResolver {
    pub fn new(log: EventLog, config: Config) -> Self {
        Self {
            log,
            config,
            remaining: None,
        }
    }

    /// Succeeds `successes` times, then reports a load error.
    pub fn failing_after(log: EventLog, config: Config, successes: usize) -> Self {
        Self {
            log,
            config,
            remaining: Some(Arc::new(AtomicUsize::new(successes))),
        }
    }
}

impl ConfigResolver for RecordingResolver {
    fn resolve(&self) -> Result<Config, ResolveError> {
        if let Some(remaining) = &self.remaining {
            let exhausted = remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_err();
            if exhausted {
                return Err(load_failure());
            }
        }
        self.log.push(Event::Resolved);
        Ok(self.config.clone())
    }
}

/// Produces a genuine resolver error by naming a missing file.
pub fn load_failure() -> ResolveError {
    match resolve(["-config=/nonexistent/replicator/agent.toml"]) {
        Err(error) => error,
        Ok(config) => panic!("missing configuration file resolved: {config:?}"),
    }
}

/// Signal source replaying a fixed script, then reporting closure.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSignalSource {
    script: VecDeque<LifecycleSignal>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSignalSource {
    pub fn new(script: impl IntoIterator<Item = LifecycleSignal>) -> Self {
        Self {
            script: script.into_iter().collect(),
            reads: Arc::default(),
        }
    }

    /// Shared counter of `next_signal` calls.
    pub fn reads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl SignalSource for ScriptedSignalSource {
    fn next_signal(&mut self) -> Result<LifecycleSignal, SignalError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.script.pop_front().ok_or(SignalError::Closed)
    }
}

/// Lifecycle notifications captured by [`RecordingLifecycleReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    RunnerStarted(u64),
    RunnerStopped(u64),
    RunnerFailed(String),
    ReloadRequested,
    ReloadFailed(String),
    ShutdownRequested,
}

/// Records lifecycle events for assertions.
#[derive(Debug, Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycleReporter {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn bootstrap_starting(&self) {
        self.record(LifecycleEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(LifecycleEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(LifecycleEvent::BootstrapFailed(error.to_string()));
    }

    fn runner_started(&self, generation: u64) {
        self.record(LifecycleEvent::RunnerStarted(generation));
    }

    fn runner_stopped(&self, generation: u64) {
        self.record(LifecycleEvent::RunnerStopped(generation));
    }

    fn runner_failed(&self, error: &SupervisorError) {
        self.record(LifecycleEvent::RunnerFailed(error.to_string()));
    }

    fn reload_requested(&self) {
        self.record(LifecycleEvent::ReloadRequested);
    }

    fn reload_failed(&self, error: &LaunchError) {
        self.record(LifecycleEvent::ReloadFailed(error.to_string()));
    }

    fn shutdown_requested(&self) {
        self.record(LifecycleEvent::ShutdownRequested);
    }
}

/// Everything a test needs to drive one agent run and inspect it afterwards.
pub struct AgentRun {
    pub log: EventLog,
    pub factory: RecordingRunnerFactory,
    pub reporter: Arc<RecordingLifecycleReporter>,
    pub reads: Arc<AtomicUsize>,
    pub outcome: Result<(), LaunchError>,
}

/// Runs the agent with recording doubles.
pub fn run_with<R>(
    resolver: R,
    log: EventLog,
    factory: RecordingRunnerFactory,
    script: impl IntoIterator<Item = LifecycleSignal>,
) -> AgentRun
where
    R: ConfigResolver,
{
    let signals = ScriptedSignalSource::new(script);
    let reads = signals.reads();
    let reporter = Arc::new(RecordingLifecycleReporter::default());
    let outcome = run_agent_with(LaunchPlan {
        resolver,
        factory: factory.clone(),
        signals,
        reporter: reporter.clone(),
    });
    AgentRun {
        log,
        factory,
        reporter,
        reads,
        outcome,
    }
}

/// Configuration used by the lifecycle suites: valid and without statsd.
pub fn test_config() -> Config {
    Config::development()
}
