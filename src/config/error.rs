//! Configuration error types for the config module.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur during configuration loading and saving.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write the configuration file.
    #[error("Failed to write config file {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the TOML content.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize configuration to TOML.
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// An environment variable override could not be parsed.
    #[error("Invalid environment override {variable}: {message}")]
    EnvParse { variable: String, message: String },

    /// A required value was missing.
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl ConfigError {
    /// Create an EnvParse error.
    pub fn env_parse(variable: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvParse {
            variable: variable.into(),
            message: message.into(),
        }
    }
}
