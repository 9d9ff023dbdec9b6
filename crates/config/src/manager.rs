//! Locating, loading, and saving the config file

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult, LogLevel, ValidationError};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "HEIRLOOM";

const CONFIG_FILE: &str = "config.toml";

/// Owns where configuration and queue data live
///
/// | Platform | Config | Queue data |
/// |----------|--------|------------|
/// | Linux    | `~/.config/heirloom/` | `~/.local/share/heirloom/` |
/// | macOS    | `~/Library/Application Support/heirloom/` | same |
/// | Windows  | `%APPDATA%\heirloom\config\` | `%APPDATA%\heirloom\data\` |
pub struct ConfigManager {
    dir: PathBuf,
    fallback_data_dir: PathBuf,
    file: ConfigPersistence,
}

impl ConfigManager {
    /// Uses the platform directories shown above
    pub fn new() -> ConfigResult<Self> {
        let dirs = ProjectDirs::from("", "", "heirloom").ok_or_else(|| {
            ConfigError::NoConfigDir("no home directory for this user".to_string())
        })?;
        Ok(Self::at(dirs.config_dir(), dirs.data_dir().to_path_buf()))
    }

    /// Keeps everything under `dir`; queue data goes to `dir/data`
    pub fn with_directory(dir: PathBuf) -> ConfigResult<Self> {
        let data = dir.join("data");
        Ok(Self::at(&dir, data))
    }

    fn at(dir: &Path, fallback_data_dir: PathBuf) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fallback_data_dir,
            file: ConfigPersistence::new(dir.join(CONFIG_FILE)),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Queue directory: `app.data_dir` if set, else the platform default
    pub fn data_dir(&self, config: &Config) -> PathBuf {
        match &config.app.data_dir {
            Some(dir) => dir.clone(),
            None => self.fallback_data_dir.clone(),
        }
    }

    /// Reads the file; a missing file yields defaults
    pub fn load(&self) -> ConfigResult<Config> {
        self.file.load()
    }

    /// Never fails; unreadable files are logged and replaced by defaults
    pub fn load_or_default(&self) -> Config {
        self.load().unwrap_or_else(|e| {
            log::warn!("{}; falling back to defaults", e);
            Config::default()
        })
    }

    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.file.save(config)
    }

    /// Load, modify, save
    ///
    /// ```rust,no_run
    /// # use heirloom_config::ConfigManager;
    /// # fn main() -> heirloom_config::ConfigResult<()> {
    /// let manager = ConfigManager::new()?;
    /// manager.update(|config| config.sync.max_retries = 5)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn update(&self, edit: impl FnOnce(&mut Config)) -> ConfigResult<()> {
        let mut config = self.load()?;
        edit(&mut config);
        self.save(&config)
    }

    /// Writes a default file unless one exists; true if it wrote one
    pub fn initialize(&self) -> ConfigResult<bool> {
        let path = self.config_path();
        if path.exists() {
            log::debug!("Keeping existing {}", path.display());
            Ok(false)
        } else {
            self.file.generate_default()?;
            Ok(true)
        }
    }

    /// Overwrites the file with defaults; the old one stays as the backup
    pub fn reset(&self) -> ConfigResult<()> {
        self.file.generate_default()
    }

    /// Out-of-range values in the file as it stands on disk
    pub fn validate(&self) -> ConfigResult<Vec<ValidationError>> {
        Ok(self.load()?.validate().err().unwrap_or_default())
    }

    /// [`load`](Self::load), then `HEIRLOOM_<TABLE>_<FIELD>` overrides from
    /// the process environment
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());

        for error in config.validate().err().unwrap_or_default() {
            log::warn!("After environment overrides: {}", error);
        }
        Ok(config)
    }
}

/// Applies `HEIRLOOM_*` overrides found through `lookup`
///
/// Unparseable values are logged and ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        let key = format!("{}_{}", ENV_PREFIX, name);
        lookup(&key).map(|value| (key, value))
    };

    if let Some((_, dir)) = var("APP_DATA_DIR") {
        if !dir.trim().is_empty() {
            config.app.data_dir = Some(PathBuf::from(dir));
        }
    }

    if let Some((key, level)) = var("APP_LOG_LEVEL") {
        match level.parse::<LogLevel>() {
            Ok(level) => config.app.log_level = level,
            Err(e) => log::warn!("Ignoring {}: {}", key, e),
        }
    }

    if let Some((key, retries)) = var("SYNC_MAX_RETRIES") {
        match retries.trim().parse::<u32>() {
            Ok(n) => config.sync.max_retries = n,
            Err(e) => log::warn!("Ignoring {}={}: {}", key, retries, e),
        }
    }

    if let Some((key, secs)) = var("SYNC_CALL_TIMEOUT_SECS") {
        match secs.trim().parse::<u64>() {
            Ok(n) => config.sync.call_timeout_secs = n,
            Err(e) => log::warn!("Ignoring {}={}: {}", key, secs, e),
        }
    }

    if let Some((key, flag)) = var("SYNC_AUTO_SYNC") {
        match flag.trim().parse::<bool>() {
            Ok(b) => config.sync.auto_sync = b,
            Err(e) => log::warn!("Ignoring {}={}: {}", key, flag, e),
        }
    }
}
