//! TOML config persistence and the server directory layout.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::WrapperConfig;

/// File name of the per-server wrapper settings.
const WRAPPER_CONFIG_NAME: &str = "wrapper.toml";

/// Errors that can occur reading or writing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Load a TOML config from `path`, creating the file with defaults when
/// it does not exist yet.
///
/// # Errors
///
/// Returns an error if an existing file cannot be read or parsed, or if
/// the defaults cannot be written out.
pub fn load_or_init<T>(path: &Path) -> Result<T, ConfigError>
where
    T: Serialize + DeserializeOwned + Default,
{
    if !path.exists() {
        tracing::info!(path = %path.display(), "Config missing, writing defaults");
        let value = T::default();
        save(path, &value)?;
        return Ok(value);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write a TOML config to `path` with a timestamped header.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let body = toml::to_string_pretty(value)?;
    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let content = format!("# Managed by mcsw. Edits are kept, comments are not.\n# Last updated: {stamp}\n\n{body}");
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load `wrapper.toml` from a server directory, creating it with
/// defaults when missing.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or initialized.
pub fn load_wrapper_config(directory: &Path) -> Result<WrapperConfig, ConfigError> {
    load_or_init(&directory.join(WRAPPER_CONFIG_NAME))
}

/// Persist `wrapper.toml` in a server directory.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_wrapper_config(directory: &Path, config: &WrapperConfig) -> Result<(), ConfigError> {
    save(&directory.join(WRAPPER_CONFIG_NAME), config)
}

/// Root under which all managed server directories live:
/// `<user data dir>/mcsw`, falling back to the working directory.
#[must_use]
pub fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mcsw")
}

/// Resolve (and create if needed) the directory for a named server.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn server_directory(name: &str) -> Result<PathBuf, ConfigError> {
    let path = data_root().join(name);
    std::fs::create_dir_all(&path).map_err(|e| ConfigError::WriteError {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}
