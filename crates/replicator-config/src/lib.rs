//! Configuration for the Replicator agent.
//!
//! The effective configuration is layered: a built-in profile (production, or
//! development with `-dev`), then optional files named by `-config`, then the
//! command-line flags. Each layer is a full [`Config`] whose unset fields hold
//! their type's default value, and layers are combined with [`Merge`], so the
//! outcome of [`resolve`] is always `profile.merge(&files).merge(&flags)`.

mod cli;
mod defaults;
mod file;
mod logging;
mod merge;
mod model;
mod resolve;

pub use cli::{AgentArgs, PROGRAM_NAME, normalise_flag_style};
pub use defaults::{
    DEFAULT_CONSUL_ADDRESS, DEFAULT_CONSUL_KEY_LOCATION, DEFAULT_LOG_LEVEL, DEFAULT_NOMAD_ADDRESS,
    DEFAULT_SCALING_INTERVAL,
};
pub use file::{ConfigLoadError, load_path};
pub use logging::{LogLevel, LogLevelParseError};
pub use merge::Merge;
pub use model::{ClusterScaling, Config, JobScaling, Notification, Telemetry};
pub use resolve::{ResolveError, resolve, resolve_args};
