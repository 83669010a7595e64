//! The configuration tree consumed by the agent and its runner.
//!
//! Every section is an owned field rather than an `Option`, so a
//! configuration always carries all of its sections and merging never has to
//! special-case an absent one. A field holding its type's default value is
//! considered unset; see [`crate::Merge`].

use serde::{Deserialize, Serialize};

/// Effective configuration for one resolution pass of the agent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address of the Consul agent, for example `localhost:8500`.
    pub consul: String,
    /// Address of the Nomad API, for example `http://localhost:4646`.
    pub nomad: String,
    /// Verbosity of the agent's logs; see [`crate::LogLevel`].
    pub log_level: String,
    /// Seconds between scaling checks.
    pub scaling_interval: u64,
    /// Cloud region the cluster runs in. Empty means "discover at runtime".
    #[serde(alias = "aws_region")]
    pub region: String,
    /// Worker-pool scaling settings.
    pub cluster_scaling: ClusterScaling,
    /// Job-group scaling settings.
    pub job_scaling: JobScaling,
    /// Metrics sink settings.
    pub telemetry: Telemetry,
    /// Operator alerting settings.
    pub notification: Notification,
}

/// Settings governing worker-node scaling.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterScaling {
    /// Whether scaling actions are performed or only reported.
    pub enabled: bool,
    /// Largest permitted number of worker nodes.
    pub max_size: u32,
    /// Smallest permitted number of worker nodes.
    pub min_size: u32,
    /// Seconds to wait between cluster scaling actions.
    pub cool_down: f64,
    /// Worker nodes the cluster can lose while keeping enough capacity.
    pub node_fault_tolerance: u32,
    /// Autoscaling group holding the worker nodes.
    pub autoscaling_group: String,
}

/// Settings governing job-group scaling.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobScaling {
    /// Whether scaling actions are performed or only reported.
    pub enabled: bool,
    /// ACL token used against an ACL-protected Consul cluster.
    pub consul_token: String,
    /// Key/value prefix holding job scaling policies.
    pub consul_key_location: String,
}

/// Settings for the metrics sink.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Telemetry {
    /// `host:port` of a statsd server. Empty disables metrics.
    pub statsd_address: String,
}

/// Settings for operator notifications.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Notification {
    /// Run book identifier attached to cluster scaling alerts.
    pub cluster_scaling_uid: String,
    /// Human readable cluster name used in alerts.
    pub cluster_identifier: String,
    /// Integration key for the alerting service.
    #[serde(alias = "pagerduty_service_key")]
    pub pager_duty_service_key: String,
}

impl Config {
    /// Parses a TOML document into a configuration overlay.
    ///
    /// Omitted sections and fields stay unset so the result can be merged
    /// onto a profile.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Parses a JSON document into a configuration overlay.
    pub fn from_json_str(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Returns the statsd address when one is configured.
    #[must_use]
    pub fn statsd_address(&self) -> Option<&str> {
        let address = self.telemetry.statsd_address.trim();
        (!address.is_empty()).then_some(address)
    }
}
