//! Error types for the configuration system

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// File exists but holds nothing but whitespace
    #[error("Config file at {path} is empty")]
    Empty { path: PathBuf },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Refused to save a config that fails validation
    #[error("Config validation failed: {}", join(.0))]
    Invalid(Vec<ValidationError>),

    #[error("Failed to create config directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No home directory to derive platform paths from
    #[error("Could not determine config directory: {0}")]
    NoConfigDir(String),

    #[error("Failed to back up config to {path}: {source}")]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file was written by a newer version
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validation error for a specific config field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Field '{field}': {message}{}", .value.as_ref().map(|v| format!(" (got: {})", v)).unwrap_or_default())]
pub struct ValidationError {
    /// Dotted path to the field, e.g. `sync.max_retries`
    pub field: String,
    pub message: String,
    /// The rejected value, when it is worth echoing back
    pub value: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Creates a validation error that echoes the rejected value
    pub fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(field, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("sync.max_retries", "must be between 1 and 10");
        assert_eq!(
            err.to_string(),
            "Field 'sync.max_retries': must be between 1 and 10"
        );
    }

    #[test]
    fn test_validation_error_with_value() {
        let err = ValidationError::with_value("sync.max_retries", "must be between 1 and 10", 0);
        assert_eq!(
            err.to_string(),
            "Field 'sync.max_retries': must be between 1 and 10 (got: 0)"
        );
    }

    #[test]
    fn test_invalid_lists_every_field() {
        let err = ConfigError::Invalid(vec![
            ValidationError::new("app.data_dir", "must not be empty when set"),
            ValidationError::with_value("sync.max_retries", "must be between 1 and 10", 0),
        ]);

        let message = err.to_string();
        assert!(message.contains("app.data_dir"));
        assert!(message.contains("sync.max_retries"));
        assert!(message.contains("; "));
    }
}
