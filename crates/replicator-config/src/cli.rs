//! Command-line flags understood by the agent.
//!
//! Operators pass flags in the single-dash long form (`-cluster-max-size=20`).
//! [`normalise_flag_style`] rewrites them into the double-dash form clap
//! expects, so both spellings are accepted. Every flag is optional; an absent
//! flag leaves the corresponding field unset in the overlay produced by
//! [`AgentArgs::overlay`].

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use clap::builder::BoolishValueParser;

use crate::model::{ClusterScaling, Config, JobScaling, Notification, Telemetry};

/// Name used in usage output and as `argv[0]` when parsing.
pub const PROGRAM_NAME: &str = "replicator-agent";

const GENERAL: &str = "General Options";
const CLUSTER: &str = "Cluster Scaling Options";
const JOBS: &str = "Job Scaling Options";
const TELEMETRY: &str = "Telemetry Options";
const NOTIFICATIONS: &str = "Notification Options";

/// Flags accepted by the agent.
#[derive(Debug, Clone, Default, PartialEq, Parser)]
#[command(
    name = PROGRAM_NAME,
    version,
    about = "Runs a Replicator agent",
    long_about = "Starts the Replicator agent and runs until an interrupt is received. \
                  Configuration comes from the built-in profile, then the files passed \
                  with -config, then these flags. SIGHUP reloads the configuration."
)]
pub struct AgentArgs {
    /// Path to a config file or a directory of config files, processed in
    /// lexicographic order.
    #[arg(long = "config", value_name = "PATH", help_heading = GENERAL)]
    pub config_path: Option<Utf8PathBuf>,

    /// Start with the development profile.
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new(),
        help_heading = GENERAL
    )]
    pub dev: Option<bool>,

    /// Address and port of the Nomad API. The default is
    /// http://localhost:4646.
    #[arg(long, value_name = "ADDRESS:PORT", help_heading = GENERAL)]
    pub nomad: Option<String>,

    /// Address and port of the Consul agent. The default is localhost:8500.
    #[arg(long, value_name = "ADDRESS:PORT", help_heading = GENERAL)]
    pub consul: Option<String>,

    /// Verbosity of the agent's logs. The default is INFO.
    #[arg(long, value_name = "LEVEL", help_heading = GENERAL)]
    pub log_level: Option<String>,

    /// Seconds between scaling checks. The default is 10.
    #[arg(long, value_name = "SECONDS", help_heading = GENERAL)]
    pub scaling_interval: Option<u64>,

    /// Region the cluster runs in. When unset the agent determines it
    /// at runtime.
    #[arg(long = "aws-region", value_name = "REGION", help_heading = GENERAL)]
    pub region: Option<String>,

    /// Perform cluster scaling actions instead of only reporting them.
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new(),
        help_heading = CLUSTER
    )]
    pub cluster_scaling_enabled: Option<bool>,

    /// Maximum number of worker nodes. The default is 10.
    #[arg(long, value_name = "NUM", help_heading = CLUSTER)]
    pub cluster_max_size: Option<u32>,

    /// Minimum number of worker nodes. The default is 5.
    #[arg(
        long,
        alias = "cluster-mix-size",
        value_name = "NUM",
        help_heading = CLUSTER
    )]
    pub cluster_min_size: Option<u32>,

    /// Seconds to wait between cluster scaling actions. The default is 600.
    #[arg(
        long,
        value_name = "SECONDS",
        value_parser = parse_finite_seconds,
        help_heading = CLUSTER
    )]
    pub cluster_scaling_cool_down: Option<f64>,

    /// Worker nodes the cluster can lose while keeping enough capacity.
    /// The default is 1.
    #[arg(long, value_name = "NUM", help_heading = CLUSTER)]
    pub cluster_node_fault_tolerance: Option<u32>,

    /// Autoscaling group containing the worker nodes. Keep it separate
    /// from the group running the server nodes.
    #[arg(long, value_name = "NAME", help_heading = CLUSTER)]
    pub cluster_autoscaling_group: Option<String>,

    /// Perform job scaling actions instead of only reporting them.
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new(),
        help_heading = JOBS
    )]
    pub job_scaling_enabled: Option<bool>,

    /// Consul ACL token.
    #[arg(long, value_name = "TOKEN", help_heading = JOBS)]
    pub consul_token: Option<String>,

    /// Consul key/value location of job scaling policies. The default is
    /// replicator/config/jobs.
    #[arg(long, value_name = "KEY", help_heading = JOBS)]
    pub consul_key_location: Option<String>,

    /// Address and port of a statsd server. Metrics are discarded when
    /// unset.
    #[arg(long, value_name = "ADDRESS:PORT", help_heading = TELEMETRY)]
    pub statsd_address: Option<String>,

    /// Run book identifier attached to cluster scaling alerts.
    #[arg(long, value_name = "UID", help_heading = NOTIFICATIONS)]
    pub cluster_scaling_uid: Option<String>,

    /// Human readable cluster name used in alerts.
    #[arg(long, value_name = "NAME", help_heading = NOTIFICATIONS)]
    pub cluster_identifier: Option<String>,

    /// Integration key of the alerting service.
    #[arg(long, value_name = "KEY", help_heading = NOTIFICATIONS)]
    pub pagerduty_service_key: Option<String>,
}

impl AgentArgs {
    /// Parses agent flags, excluding the program name.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let argv = std::iter::once(OsString::from(PROGRAM_NAME))
            .chain(normalise_flag_style(args))
            .collect::<Vec<_>>();
        Self::try_parse_from(argv)
    }

    /// Returns `true` when the development profile was requested.
    #[must_use]
    pub fn development(&self) -> bool {
        self.dev.unwrap_or(false)
    }

    /// Returns the configuration path, if a non-blank one was supplied.
    ///
    /// `-config=` with an empty value means no configuration files.
    #[must_use]
    pub fn config_path(&self) -> Option<&Utf8Path> {
        self.config_path
            .as_deref()
            .filter(|path| !path.as_str().trim().is_empty())
    }

    /// Synthesises a configuration overlay from the recognised flags.
    ///
    /// Flags that were not passed stay at their unset default.
    #[must_use]
    pub fn overlay(&self) -> Config {
        Config {
            consul: self.consul.clone().unwrap_or_default(),
            nomad: self.nomad.clone().unwrap_or_default(),
            log_level: self.log_level.clone().unwrap_or_default(),
            scaling_interval: self.scaling_interval.unwrap_or_default(),
            region: self.region.clone().unwrap_or_default(),
            cluster_scaling: ClusterScaling {
                enabled: self.cluster_scaling_enabled.unwrap_or_default(),
                max_size: self.cluster_max_size.unwrap_or_default(),
                min_size: self.cluster_min_size.unwrap_or_default(),
                cool_down: self.cluster_scaling_cool_down.unwrap_or_default(),
                node_fault_tolerance: self.cluster_node_fault_tolerance.unwrap_or_default(),
                autoscaling_group: self.cluster_autoscaling_group.clone().unwrap_or_default(),
            },
            job_scaling: JobScaling {
                enabled: self.job_scaling_enabled.unwrap_or_default(),
                consul_token: self.consul_token.clone().unwrap_or_default(),
                consul_key_location: self.consul_key_location.clone().unwrap_or_default(),
            },
            telemetry: Telemetry {
                statsd_address: self.statsd_address.clone().unwrap_or_default(),
            },
            notification: Notification {
                cluster_scaling_uid: self.cluster_scaling_uid.clone().unwrap_or_default(),
                cluster_identifier: self.cluster_identifier.clone().unwrap_or_default(),
                pager_duty_service_key: self.pagerduty_service_key.clone().unwrap_or_default(),
            },
        }
    }
}

fn parse_finite_seconds(value: &str) -> Result<f64, String> {
    let seconds = value
        .parse::<f64>()
        .map_err(|error| format!("'{value}' is not a number: {error}"))?;
    if seconds.is_finite() {
        Ok(seconds)
    } else {
        Err(format!("'{value}' is not a finite number of seconds"))
    }
}

/// Rewrites single-dash long flags (`-dev`, `-log-level=debug`) into the
/// double-dash form.
///
/// Single-character flags such as `-h`, values that do not start with a dash
/// and everything after a bare `--` are passed through untouched.
pub fn normalise_flag_style<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(Into::into)
        .map(|argument| {
            if passthrough {
                return argument;
            }
            let Some(text) = argument.to_str() else {
                return argument;
            };
            if text == "--" {
                passthrough = true;
                return argument;
            }
            if is_single_dash_long_flag(text) {
                let mut rewritten = OsString::from("-");
                rewritten.push(text);
                rewritten
            } else {
                argument
            }
        })
        .collect()
}

fn is_single_dash_long_flag(text: &str) -> bool {
    let Some(rest) = text.strip_prefix('-') else {
        return false;
    };
    if rest.starts_with('-') {
        return false;
    }
    let name = rest.split('=').next().unwrap_or_default();
    name.chars().count() > 1 && name.starts_with(|c: char| c.is_ascii_alphabetic())
}
