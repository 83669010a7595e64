//! The scaling runner: the long-lived unit of work the supervisor manages.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use replicator_config::Config;

use crate::metrics_handle::MetricsHandle;

pub(crate) const RUNNER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runner");

/// Cooperative cancellation flag shared between the supervisor and a runner.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopToken {
    /// Creates a token that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the runner owning this token to return.
    pub fn request_stop(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        condvar.notify_all();
    }

    /// Returns true once a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a stop is requested.
    pub fn wait(&self) {
        let (flag, condvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let _stopped = condvar
            .wait_while(guard, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks for at most `timeout`; returns true if a stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = condvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

/// A unit of work executed on its own thread until asked to stop.
pub trait Runner: Send + 'static {
    /// Runs until `stop` is triggered. Must return promptly afterwards.
    fn run(self, stop: StopToken);
}

/// Builds runners from a resolved configuration.
pub trait RunnerFactory {
    /// Runner type produced by this factory.
    type Runner: Runner;

    /// Constructs a runner. Failing here leaves the supervisor stopped.
    fn build(
        &self,
        config: Arc<Config>,
        metrics: MetricsHandle,
    ) -> Result<Self::Runner, RunnerError>;
}

/// Reasons a runner could not be constructed.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A service address did not parse as a URL.
    #[error("invalid {field} address '{address}': {source}")]
    InvalidAddress {
        /// Configuration field holding the address.
        field: &'static str,
        /// Offending value.
        address: String,
        /// Underlying URL parse error.
        #[source]
        source: url::ParseError,
    },
    /// The evaluation interval was zero.
    #[error("scaling interval must be greater than zero")]
    ZeroInterval,
    /// The cluster bounds were inverted.
    #[error("cluster minimum size {min} exceeds maximum size {max}")]
    SizeBounds {
        /// Configured minimum.
        min: u32,
        /// Configured maximum.
        max: u32,
    },
    /// The cool-down was negative or not a number.
    #[error("cluster cool down {value} is not a non-negative number of seconds")]
    CoolDown {
        /// Configured value.
        value: f64,
    },
    /// A custom factory refused to build a runner.
    #[error("runner rejected configuration: {reason}")]
    Rejected {
        /// Human readable explanation.
        reason: String,
    },
}

/// Factory for the production scaling loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScalingLoopFactory;

impl RunnerFactory for ScalingLoopFactory {
    type Runner = ScalingLoopRunner;

    fn build(
        &self,
        config: Arc<Config>,
        metrics: MetricsHandle,
    ) -> Result<ScalingLoopRunner, RunnerError> {
        let nomad = parse_address("nomad", &config.nomad)?;
        let consul = parse_address("consul", &config.consul)?;
        if config.scaling_interval == 0 {
            return Err(RunnerError::ZeroInterval);
        }
        let cluster = &config.cluster_scaling;
        if cluster.min_size > cluster.max_size {
            return Err(RunnerError::SizeBounds {
                min: cluster.min_size,
                max: cluster.max_size,
            });
        }
        if !cluster.cool_down.is_finite() || cluster.cool_down < 0.0 {
            return Err(RunnerError::CoolDown {
                value: cluster.cool_down,
            });
        }
        Ok(ScalingLoopRunner {
            interval: Duration::from_secs(config.scaling_interval),
            nomad,
            consul,
            config,
            metrics,
        })
    }
}

/// Consul is conventionally configured as `host:port`; accept that form.
fn parse_address(field: &'static str, address: &str) -> Result<Url, RunnerError> {
    let candidate = if address.contains("://") {
        address.to_owned()
    } else {
        format!("http://{address}")
    };
    Url::parse(&candidate).map_err(|source| RunnerError::InvalidAddress {
        field,
        address: address.to_owned(),
        source,
    })
}

/// Periodic evaluation loop driven by the resolved configuration.
#[derive(Debug)]
pub struct ScalingLoopRunner {
    config: Arc<Config>,
    metrics: MetricsHandle,
    interval: Duration,
    nomad: Url,
    consul: Url,
}

impl ScalingLoopRunner {
    /// Interval between evaluations.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn evaluate(&self, iteration: u64) {
        let cluster = &self.config.cluster_scaling;
        self.metrics.scope(|| {
            metrics::counter!("runner.evaluation").increment(1);
            metrics::gauge!("runner.cluster_min_size").set(f64::from(cluster.min_size));
            metrics::gauge!("runner.cluster_max_size").set(f64::from(cluster.max_size));
        });
        debug!(
            target: RUNNER_TARGET,
            iteration,
            cluster_scaling = cluster.enabled,
            job_scaling = self.config.job_scaling.enabled,
            "scaling evaluation completed"
        );
    }
}

impl Runner for ScalingLoopRunner {
    fn run(self, stop: StopToken) {
        info!(
            target: RUNNER_TARGET,
            nomad = %self.nomad,
            consul = %self.consul,
            interval_secs = self.interval.as_secs(),
            cluster_scaling = self.config.cluster_scaling.enabled,
            job_scaling = self.config.job_scaling.enabled,
            "scaling loop running"
        );
        let mut iteration = 0_u64;
        loop {
            iteration += 1;
            self.evaluate(iteration);
            if stop.wait_timeout(self.interval) {
                break;
            }
        }
        info!(target: RUNNER_TARGET, iterations = iteration, "scaling loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::net::UdpSocket;
    use std::thread;
    use std::time::Instant;

    use rstest::rstest;

    use crate::metrics_handle::METRIC_PREFIX;
    use crate::statsd::StatsdSink;

    use super::*;

    fn build(config: Config) -> Result<ScalingLoopRunner, RunnerError> {
        ScalingLoopFactory.build(Arc::new(config), MetricsHandle::noop())
    }

    #[test]
    fn stop_token_wakes_waiters() {
        let token = StopToken::new();
        let waiter = token.clone();
        let handle = thread::spawn(move || waiter.wait());
        token.request_stop();
        handle.join().expect("waiter thread");
        assert!(token.is_stopped());
    }

    #[test]
    fn wait_timeout_reports_expiry() {
        let token = StopToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
        token.request_stop();
        assert!(token.wait_timeout(Duration::from_secs(5)));
    }

    #[rstest]
    #[case::production(Config::production())]
    #[case::development(Config::development())]
    fn profiles_build_runners(#[case] config: Config) {
        let interval = config.scaling_interval;
        let runner = build(config).expect("profile should be runnable");
        assert_eq!(runner.interval(), Duration::from_secs(interval));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = Config {
            scaling_interval: 0,
            ..Config::production()
        };
        assert!(matches!(build(config), Err(RunnerError::ZeroInterval)));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut config = Config::production();
        config.cluster_scaling.min_size = 12;
        let error = build(config).expect_err("bounds inverted");
        assert!(
            matches!(error, RunnerError::SizeBounds { min: 12, max: 10 }),
            "{error:?}"
        );
    }

    #[test]
    fn negative_cool_down_is_rejected() {
        let mut config = Config::production();
        config.cluster_scaling.cool_down = -1.0;
        assert!(matches!(build(config), Err(RunnerError::CoolDown { .. })));
    }

    #[test]
    fn malformed_nomad_address_is_rejected() {
        let config = Config {
            nomad: "http://[::1".to_owned(),
            ..Config::production()
        };
        let error = build(config).expect_err("address invalid");
        assert!(
            matches!(error, RunnerError::InvalidAddress { field: "nomad", .. }),
            "{error:?}"
        );
    }

    #[test]
    fn running_loop_returns_promptly_after_stop() {
        let runner = build(Config::production()).expect("runner");
        let token = StopToken::new();
        let worker_token = token.clone();
        let handle = thread::spawn(move || runner.run(worker_token));
        let requested = Instant::now();
        token.request_stop();
        handle.join().expect("runner thread");
        assert!(requested.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn evaluations_report_through_the_runner_metrics_handle() {
        let collector = UdpSocket::bind("127.0.0.1:0").expect("bind collector");
        collector
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        let address = collector.local_addr().expect("collector address").to_string();
        let sink = StatsdSink::connect(&address, METRIC_PREFIX).expect("connect sink");
        let metrics = MetricsHandle::from_recorder(Arc::new(sink));
        let runner = ScalingLoopFactory
            .build(Arc::new(Config::production()), metrics)
            .expect("runner");

        let token = StopToken::new();
        let worker_token = token.clone();
        let handle = thread::spawn(move || runner.run(worker_token));
        let mut received = Vec::new();
        let mut buffer = [0_u8; 512];
        for _ in 0..3 {
            let read = collector.recv(&mut buffer).expect("receive datagram");
            received.push(String::from_utf8_lossy(&buffer[..read]).into_owned());
        }
        token.request_stop();
        handle.join().expect("runner thread");

        assert_eq!(
            received,
            vec![
                "replicator.runner.evaluation:1|c",
                "replicator.runner.cluster_min_size:5|g",
                "replicator.runner.cluster_max_size:10|g",
            ]
        );
    }
}
