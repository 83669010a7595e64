//! Minimal statsd recorder speaking the plain-text UDP line protocol.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};
use thiserror::Error;
use tracing::trace;

const STATSD_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::statsd");

/// Errors raised while preparing a statsd sink.
#[derive(Debug, Error)]
pub enum StatsdError {
    /// The address could not be resolved.
    #[error("failed to resolve '{address}': {source}")]
    Resolve {
        /// Address as configured.
        address: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// The address resolved to nothing.
    #[error("'{address}' did not resolve to any socket address")]
    NoAddress {
        /// Address as configured.
        address: String,
    },
    /// Binding or connecting the local UDP socket failed.
    #[error("failed to open a UDP socket towards {peer}: {source}")]
    Socket {
        /// Resolved statsd peer.
        peer: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Recorder forwarding every metric update to a statsd daemon.
#[derive(Debug, Clone)]
pub struct StatsdSink {
    emitter: Arc<Emitter>,
}

#[derive(Debug)]
struct Emitter {
    socket: UdpSocket,
    prefix: String,
}

impl StatsdSink {
    /// Resolves `address` and connects a UDP socket to it.
    ///
    /// Metric names are emitted as `<prefix>.<name>`.
    pub fn connect(address: &str, prefix: &str) -> Result<Self, StatsdError> {
        let peer = address
            .to_socket_addrs()
            .map_err(|source| StatsdError::Resolve {
                address: address.to_owned(),
                source,
            })?
            .next()
            .ok_or_else(|| StatsdError::NoAddress {
                address: address.to_owned(),
            })?;
        let local: SocketAddr = if peer.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local)
            .and_then(|socket| socket.connect(peer).map(|()| socket))
            .map_err(|source| StatsdError::Socket { peer, source })?;
        Ok(Self {
            emitter: Arc::new(Emitter {
                socket,
                prefix: prefix.trim_end_matches('.').to_owned(),
            }),
        })
    }

    fn metric(&self, key: &Key) -> Arc<StatsdMetric> {
        Arc::new(StatsdMetric {
            emitter: Arc::clone(&self.emitter),
            name: self.emitter.qualify(key),
        })
    }
}

impl Emitter {
    fn qualify(&self, key: &Key) -> String {
        let mut name = String::with_capacity(self.prefix.len() + key.name().len() + 1);
        if !self.prefix.is_empty() {
            name.push_str(&self.prefix);
            name.push('.');
        }
        name.push_str(key.name());
        for label in key.labels() {
            name.push('.');
            name.push_str(label.value());
        }
        sanitise(&name)
    }

    fn send(&self, name: &str, value: &str, kind: &str) {
        let line = format!("{name}:{value}|{kind}");
        if let Err(error) = self.socket.send(line.as_bytes()) {
            // Telemetry delivery is best effort.
            trace!(target: STATSD_TARGET, %error, metric = name, "statsd send failed");
        }
    }
}

/// The line protocol reserves `:`, `|` and `@`; whitespace breaks parsers.
fn sanitise(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            ':' | '|' | '@' => '_',
            ch if ch.is_whitespace() => '_',
            ch => ch,
        })
        .collect()
}

struct StatsdMetric {
    emitter: Arc<Emitter>,
    name: String,
}

impl CounterFn for StatsdMetric {
    fn increment(&self, value: u64) {
        self.emitter.send(&self.name, &value.to_string(), "c");
    }

    fn absolute(&self, value: u64) {
        self.emitter.send(&self.name, &value.to_string(), "g");
    }
}

impl GaugeFn for StatsdMetric {
    fn increment(&self, value: f64) {
        self.emitter.send(&self.name, &signed_delta(value), "g");
    }

    fn decrement(&self, value: f64) {
        self.emitter.send(&self.name, &signed_delta(-value), "g");
    }

    fn set(&self, value: f64) {
        // A leading sign means "adjust", so negative values need a reset first.
        if value < 0.0 {
            self.emitter.send(&self.name, "0", "g");
        }
        self.emitter.send(&self.name, &value.to_string(), "g");
    }
}

fn signed_delta(value: f64) -> String {
    if value.is_sign_negative() {
        format!("-{}", value.abs())
    } else {
        format!("+{value}")
    }
}

impl HistogramFn for StatsdMetric {
    fn record(&self, value: f64) {
        self.emitter.send(&self.name, &value.to_string(), "ms");
    }
}

impl Recorder for StatsdSink {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.metric(key))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.metric(key))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.metric(key))
    }
}
