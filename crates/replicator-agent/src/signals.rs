//! Translation of POSIX signals into lifecycle requests.

use std::collections::VecDeque;
use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{debug, info};

const SIGNALS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::signals");

/// Signals the agent handles.
pub const HANDLED_SIGNALS: [i32; 4] = [SIGHUP, SIGINT, SIGTERM, SIGQUIT];

/// Lifecycle request carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// `SIGINT`, `SIGTERM` or `SIGQUIT`: stop the runner and exit.
    Terminate,
    /// `SIGHUP`: stop the runner, re-resolve configuration and start again.
    Reload,
}

impl LifecycleSignal {
    /// Maps a raw signal number; unhandled signals map to `None`.
    #[must_use]
    pub fn from_raw(signal: i32) -> Option<Self> {
        match signal {
            SIGINT | SIGTERM | SIGQUIT => Some(Self::Terminate),
            SIGHUP => Some(Self::Reload),
            _ => None,
        }
    }
}

/// Blocking source of lifecycle signals.
pub trait SignalSource {
    /// Blocks until the next lifecycle signal is available.
    fn next_signal(&mut self) -> Result<LifecycleSignal, SignalError>;
}

/// Errors reported by signal sources.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The source will never deliver another signal.
    #[error("signal source closed")]
    Closed,
}

/// Queue of signals received but not yet handled.
///
/// A queued terminate absorbs every later signal, and a reload arriving
/// directly behind a queued reload is merged into it. The queue therefore never
/// holds more than two entries.
#[derive(Debug, Default)]
pub struct PendingSignals {
    queue: VecDeque<LifecycleSignal>,
}

impl PendingSignals {
    /// Enqueues `signal`; returns false if it was absorbed.
    pub fn push(&mut self, signal: LifecycleSignal) -> bool {
        match (self.queue.back(), signal) {
            (Some(LifecycleSignal::Terminate), _)
            | (Some(LifecycleSignal::Reload), LifecycleSignal::Reload) => false,
            _ => {
                self.queue.push_back(signal);
                true
            }
        }
    }

    /// Removes the oldest queued signal.
    pub fn pop(&mut self) -> Option<LifecycleSignal> {
        self.queue.pop_front()
    }

    /// Number of queued signals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Signal source backed by process signal handlers.
pub struct SystemSignalSource {
    signals: Signals,
    pending: PendingSignals,
}

impl SystemSignalSource {
    /// Registers handlers for [`HANDLED_SIGNALS`].
    ///
    /// Once installed the default disposition of those signals is replaced, so
    /// this should happen before any long-running work begins.
    pub fn install() -> Result<Self, SignalError> {
        let signals =
            Signals::new(HANDLED_SIGNALS).map_err(|source| SignalError::Install { source })?;
        Ok(Self {
            signals,
            pending: PendingSignals::default(),
        })
    }

    fn enqueue(pending: &mut PendingSignals, raw: i32) {
        let Some(signal) = LifecycleSignal::from_raw(raw) else {
            return;
        };
        if pending.push(signal) {
            info!(target: SIGNALS_TARGET, signal = raw, ?signal, "signal received");
        } else {
            debug!(target: SIGNALS_TARGET, signal = raw, ?signal, "signal coalesced");
        }
    }
}

impl SignalSource for SystemSignalSource {
    fn next_signal(&mut self) -> Result<LifecycleSignal, SignalError> {
        loop {
            for raw in self.signals.pending() {
                Self::enqueue(&mut self.pending, raw);
            }
            if let Some(signal) = self.pending.pop() {
                return Ok(signal);
            }
            match self.signals.forever().next() {
                Some(raw) => Self::enqueue(&mut self.pending, raw),
                None => return Err(SignalError::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use super::LifecycleSignal::{Reload, Terminate};

    #[rstest]
    #[case(SIGINT, Some(Terminate))]
    #[case(SIGTERM, Some(Terminate))]
    #[case(SIGQUIT, Some(Terminate))]
    #[case(SIGHUP, Some(Reload))]
    #[case(signal_hook::consts::signal::SIGUSR1, None)]
    fn raw_signals_map_to_lifecycle_requests(
        #[case] raw: i32,
        #[case] expected: Option<LifecycleSignal>,
    ) {
        assert_eq!(LifecycleSignal::from_raw(raw), expected);
    }

    fn drain(pending: &mut PendingSignals) -> Vec<LifecycleSignal> {
        std::iter::from_fn(|| pending.pop()).collect()
    }

    #[rstest]
    #[case::reloads_coalesce(vec![Reload, Reload, Reload], vec![Reload])]
    #[case::terminate_absorbs_later(vec![Terminate, Reload, Terminate], vec![Terminate])]
    #[case::reload_then_terminate(vec![Reload, Terminate, Reload], vec![Reload, Terminate])]
    #[case::single_reload(vec![Reload], vec![Reload])]
    fn pending_queue_policy(
        #[case] arrivals: Vec<LifecycleSignal>,
        #[case] expected: Vec<LifecycleSignal>,
    ) {
        let mut pending = PendingSignals::default();
        for signal in arrivals {
            pending.push(signal);
            assert!(pending.len() <= 2);
        }
        assert_eq!(drain(&mut pending), expected);
        assert!(pending.is_empty());
    }

    #[test]
    fn push_reports_absorbed_signals() {
        let mut pending = PendingSignals::default();
        assert!(pending.push(Reload));
        assert!(!pending.push(Reload));
        assert!(pending.push(Terminate));
        assert!(!pending.push(Reload));
    }

    #[test]
    fn system_source_delivers_raised_hangup() {
        let mut source = SystemSignalSource::install().expect("install handlers");
        signal_hook::low_level::raise(SIGHUP).expect("raise SIGHUP");
        assert_eq!(source.next_signal().expect("signal"), Reload);
    }
}
