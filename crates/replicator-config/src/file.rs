//! Loading configuration overlays from disk.

use std::fs;
use std::io;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::merge::Merge;
use crate::model::Config;

const TOML_EXTENSION: &str = "toml";
const JSON_EXTENSION: &str = "json";

/// Errors raised while reading configuration files.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The file or directory could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Listing the directory failed.
    #[error("failed to list directory '{path}': {source}")]
    ReadDirectory {
        /// Offending directory.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A directory entry's name was not valid UTF-8.
    #[error("config path '{}' is not valid UTF-8", path.display())]
    NonUtf8Path {
        /// Offending path.
        path: PathBuf,
    },
    /// A TOML file failed to parse.
    #[error("failed to parse '{path}': {source}")]
    Toml {
        /// Offending file.
        path: Utf8PathBuf,
        /// Underlying parser error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// A JSON file failed to parse.
    #[error("failed to parse '{path}': {source}")]
    Json {
        /// Offending file.
        path: Utf8PathBuf,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },
    /// A numeric field held NaN or an infinity.
    #[error("'{path}' sets {field} to {value}, which is not a finite number")]
    NonFinite {
        /// Offending file.
        path: Utf8PathBuf,
        /// Dotted name of the field.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },
}

impl ConfigLoadError {
    /// Returns the path that triggered the failure.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Read { path, .. }
            | Self::ReadDirectory { path, .. }
            | Self::Toml { path, .. }
            | Self::Json { path, .. }
            | Self::NonFinite { path, .. } => path.to_string(),
            Self::NonUtf8Path { path } => path.display().to_string(),
        }
    }
}

/// Loads a configuration overlay from a file or a directory of files.
///
/// Directories are read non-recursively. Files ending in `.toml` or `.json`
/// are merged in lexicographic filename order, so later files override
/// earlier ones; hidden files and other extensions are skipped.
pub fn load_path(path: &Utf8Path) -> Result<Config, ConfigLoadError> {
    let metadata = fs::metadata(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.is_dir() {
        load_directory(path)
    } else {
        load_file(path)
    }
}

fn load_directory(directory: &Utf8Path) -> Result<Config, ConfigLoadError> {
    let read_error = |source| ConfigLoadError::ReadDirectory {
        path: directory.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(directory).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(|path| ConfigLoadError::NonUtf8Path { path })?;
        if is_config_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|left, right| left.file_name().cmp(&right.file_name()));

    files
        .iter()
        .try_fold(Config::default(), |accumulated, path| {
            load_file(path).map(|overlay| accumulated.merge(&overlay))
        })
}

fn is_config_file(path: &Utf8Path) -> bool {
    let hidden = path.file_name().is_none_or(|name| name.starts_with('.'));
    let supported = matches!(path.extension(), Some(TOML_EXTENSION | JSON_EXTENSION));
    !hidden && supported && path.is_file()
}

fn load_file(path: &Utf8Path) -> Result<Config, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = if path.extension() == Some(JSON_EXTENSION) {
        Config::from_json_str(&contents).map_err(|source| ConfigLoadError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        Config::from_toml_str(&contents).map_err(|source| ConfigLoadError::Toml {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?
    };
    ensure_finite(path, &config)?;
    Ok(config)
}

// NaN never equals the default, so it would survive every merge.
fn ensure_finite(path: &Utf8Path, config: &Config) -> Result<(), ConfigLoadError> {
    let cool_down = config.cluster_scaling.cool_down;
    if cool_down.is_finite() {
        Ok(())
    } else {
        Err(ConfigLoadError::NonFinite {
            path: path.to_path_buf(),
            field: "cluster_scaling.cool_down",
            value: cool_down,
        })
    }
}
