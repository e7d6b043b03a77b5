//! Configuration loading errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KDL parse error: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed configuration: {0}")]
    MalformedConfig(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("playbook not found: {}", .0.display())]
    PlaybookNotFound(PathBuf),

    #[error("duplicate definition: {0}")]
    Duplicate(String),

    #[error("cycle detected in inheritance: {0}")]
    CycleDetected(String),

    #[error("missing required setting: {0}")]
    MissingSetting(String),

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<jobdef_core::Error> for ConfigError {
    fn from(err: jobdef_core::Error) -> Self {
        match err {
            jobdef_core::Error::InvalidField { field, message } => {
                ConfigError::InvalidValue { field, message }
            }
            jobdef_core::Error::InvalidInput(message) => ConfigError::MalformedConfig(message),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
