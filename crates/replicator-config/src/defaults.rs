use crate::model::{ClusterScaling, Config, JobScaling, Notification, Telemetry};

/// Default address of the local Consul agent.
pub const DEFAULT_CONSUL_ADDRESS: &str = "localhost:8500";

/// Default address of the local Nomad API.
pub const DEFAULT_NOMAD_ADDRESS: &str = "http://localhost:4646";

/// Default log level for production agents.
pub const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Default number of seconds between scaling checks.
pub const DEFAULT_SCALING_INTERVAL: u64 = 10;

/// Default key/value prefix holding job scaling policies.
pub const DEFAULT_CONSUL_KEY_LOCATION: &str = "replicator/config/jobs";

const DEFAULT_CLUSTER_MAX_SIZE: u32 = 10;
const DEFAULT_CLUSTER_MIN_SIZE: u32 = 5;
const DEFAULT_CLUSTER_COOL_DOWN: f64 = 600.0;
const DEFAULT_NODE_FAULT_TOLERANCE: u32 = 1;

const DEVELOPMENT_LOG_LEVEL: &str = "DEBUG";
const DEVELOPMENT_SCALING_INTERVAL: u64 = 5;
const DEVELOPMENT_CLUSTER_COOL_DOWN: f64 = 60.0;

impl Config {
    /// Baseline configuration used when the agent runs without `-dev`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            consul: DEFAULT_CONSUL_ADDRESS.to_owned(),
            nomad: DEFAULT_NOMAD_ADDRESS.to_owned(),
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
            scaling_interval: DEFAULT_SCALING_INTERVAL,
            region: String::new(),
            cluster_scaling: ClusterScaling {
                enabled: false,
                max_size: DEFAULT_CLUSTER_MAX_SIZE,
                min_size: DEFAULT_CLUSTER_MIN_SIZE,
                cool_down: DEFAULT_CLUSTER_COOL_DOWN,
                node_fault_tolerance: DEFAULT_NODE_FAULT_TOLERANCE,
                autoscaling_group: String::new(),
            },
            job_scaling: JobScaling {
                enabled: false,
                consul_token: String::new(),
                consul_key_location: DEFAULT_CONSUL_KEY_LOCATION.to_owned(),
            },
            telemetry: Telemetry::default(),
            notification: Notification::default(),
        }
    }

    /// Baseline configuration used when the agent runs with `-dev`.
    ///
    /// Logs verbosely and checks more often; scaling stays disabled so a
    /// development agent only reports what it would do.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::production();
        config.log_level = DEVELOPMENT_LOG_LEVEL.to_owned();
        config.scaling_interval = DEVELOPMENT_SCALING_INTERVAL;
        config.cluster_scaling.cool_down = DEVELOPMENT_CLUSTER_COOL_DOWN;
        config
    }
}
