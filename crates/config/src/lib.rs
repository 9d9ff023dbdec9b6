//! Configuration for Heirloom
//!
//! One TOML document with an `[app]` and a `[sync]` table, stored under the
//! platform config directory. Loading is lenient: a file with out-of-range
//! values still loads, with a warning per field. Saving is strict and
//! atomic. `HEIRLOOM_<TABLE>_<FIELD>` environment variables take precedence
//! over the file.
//!
//! ```rust,no_run
//! use heirloom_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("no config directory");
//! let config = manager.load().unwrap_or_else(|e| {
//!     eprintln!("{}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Attempts before abandoning: {}", config.sync.max_retries);
//! ```

mod app_config;
mod error;
mod manager;
mod persistence;
mod sync_config;
mod validation;

pub use app_config::{AppConfig, LogLevel};
pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{apply_env_overrides, ConfigManager, ENV_PREFIX};
pub use sync_config::SyncSettings;
pub use validation::{Checks, ConfigSection};

use serde::{Deserialize, Serialize};

/// Newest file format this build reads
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub app: AppConfig,
    pub sync: SyncSettings,
}

impl Config {
    /// Checks every table, returning all failures together
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = [self.app.validate(), self.sync.validate()]
            .into_iter()
            .filter_map(Result::err)
            .flatten()
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            sync: SyncSettings::default(),
        }
    }
}
