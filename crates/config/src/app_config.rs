//! The `[app]` table

use crate::validation::{Checks, ConfigSection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default verbosity, used when `RUST_LOG` is unset
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Filter directive understood by `env_logger`
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "warning" {
            return Ok(LogLevel::Warn);
        }
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| format!("unknown log level '{}'", s.trim()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Queue directory; the platform data directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    pub log_level: LogLevel,
}

impl ConfigSection for AppConfig {
    const NAME: &'static str = "app";

    fn check(&self, checks: &mut Checks) {
        let blank_dir = matches!(&self.data_dir, Some(dir) if dir.as_os_str().is_empty());
        checks.ensure(!blank_dir, "data_dir", "must not be empty when set");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let app = AppConfig::default();
        assert!(app.validate().is_ok());
        assert_eq!(app.data_dir, None);
        assert_eq!(app.log_level, LogLevel::Info);
    }

    #[test]
    fn test_blank_data_dir_rejected() {
        let app = AppConfig {
            data_dir: Some(PathBuf::new()),
            ..AppConfig::default()
        };

        let errors = app.validate().unwrap_err();
        assert_eq!(errors[0].field, "app.data_dir");
    }

    #[test]
    fn test_unset_data_dir_is_not_written() {
        let toml = toml::to_string(&AppConfig::default()).unwrap();
        assert!(!toml.contains("data_dir"));
        assert!(toml.contains("log_level = \"info\""));
    }

    #[test]
    fn test_log_level_text_forms() {
        for level in LogLevel::ALL {
            assert_eq!(level.to_string().parse::<LogLevel>(), Ok(level));
        }
        assert_eq!(" DEBUG ".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
