use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::config::ClientConfig;

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "FOLIO_API_URL";

/// Error type for config file operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not edit {path}: {source}")]
    EditError {
        path: PathBuf,
        source: toml_edit::TomlError,
    },
    #[error("unknown config key: {0} (expected one of: api.base_url, api.timeout_secs)")]
    UnknownKey(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
}

/// Directory holding config and session, respecting XDG_CONFIG_HOME
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| dirs_home().join(".config"));
    base.join("folio")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Read the config file. A missing file yields the defaults.
pub fn read_config_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ClientConfig::default()),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Effective config: `flag_url` beats `env_url`, which beats the file.
pub fn resolve_config(
    path: &Path,
    env_url: Option<String>,
    flag_url: Option<&str>,
) -> Result<ClientConfig, ConfigError> {
    let mut config = read_config_from(path)?;
    let overridden = flag_url
        .map(str::to_string)
        .or(env_url)
        .filter(|url| !url.trim().is_empty());
    if let Some(url) = overridden {
        config.api.base_url = url;
    }
    Ok(config)
}

/// Set one key in the config file, keeping the rest of its formatting.
pub fn set_config_value(path: &Path, key: &str, value: &str) -> Result<(), ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    let mut doc: toml_edit::DocumentMut = text.parse().map_err(|e| ConfigError::EditError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let field = match key {
        "api.base_url" => {
            let url = value.trim().trim_end_matches('/');
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "must start with http:// or https://".to_string(),
                });
            }
            ("base_url", toml_edit::value(url))
        }
        "api.timeout_secs" => {
            let secs: i64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("expected a whole number of seconds, got {:?}", value),
            })?;
            if secs <= 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            ("timeout_secs", toml_edit::value(secs))
        }
        other => return Err(ConfigError::UnknownKey(other.to_string())),
    };

    if !doc.contains_key("api") {
        doc["api"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["api"][field.0] = field.1;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, doc.to_string())?;
    Ok(())
}
