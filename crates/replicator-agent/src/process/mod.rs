mod errors;
pub(crate) mod launch;

pub use errors::LaunchError;
pub use launch::run_agent;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
