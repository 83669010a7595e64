//! Resolution of the effective configuration from its layers.

use std::ffi::OsString;

use camino::Utf8PathBuf;
use clap::error::ErrorKind;
use thiserror::Error;

use crate::cli::AgentArgs;
use crate::file::{ConfigLoadError, load_path};
use crate::merge::Merge;
use crate::model::Config;

/// Errors surfaced while resolving the effective configuration.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The command-line flags were malformed, or help was requested.
    #[error("{source}")]
    Flags {
        /// Usage-bearing parser error.
        #[source]
        source: clap::Error,
    },
    /// The configuration file or directory could not be loaded.
    #[error("Error loading configuration from {path}: {source}")]
    Load {
        /// Path passed with `-config`.
        path: Utf8PathBuf,
        /// Underlying loader error.
        #[source]
        source: ConfigLoadError,
    },
}

impl ResolveError {
    /// Returns `true` when parsing stopped because help or version output was
    /// requested rather than because the flags were wrong.
    #[must_use]
    pub fn is_informational(&self) -> bool {
        match self {
            Self::Flags { source } => matches!(
                source.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ),
            Self::Load { .. } => false,
        }
    }
}

/// Resolves the effective configuration from command-line arguments.
///
/// `args` excludes the program name. The layers apply in order: the
/// development or production profile, then the files at `-config` (if any),
/// then the flags themselves.
pub fn resolve<I, T>(args: I) -> Result<Config, ResolveError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args = AgentArgs::try_parse_args(args).map_err(|source| ResolveError::Flags { source })?;
    resolve_args(&args)
}

/// Resolves the effective configuration from already parsed flags.
pub fn resolve_args(args: &AgentArgs) -> Result<Config, ResolveError> {
    let base = if args.development() {
        Config::development()
    } else {
        Config::production()
    };

    let layered = match args.config_path() {
        Some(path) => {
            let file = load_path(path).map_err(|source| ResolveError::Load {
                path: path.to_path_buf(),
                source,
            })?;
            base.merge(&file)
        }
        None => base,
    };

    Ok(layered.merge(&args.overlay()))
}
