//! Sync engine configuration section

use crate::validation::{Checks, ConfigSection};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the offline sync queue and connectivity probing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    /// Attempts before a queued item is abandoned
    pub max_retries: u32,

    /// Upper bound on a single remote call, in seconds
    pub call_timeout_secs: u64,

    /// First delay between automatic retry passes, in milliseconds
    pub backoff_initial_ms: u64,

    /// Cap on the delay between automatic retry passes, in milliseconds
    pub backoff_max_ms: u64,

    /// Drain automatically on reconnect and on new work
    pub auto_sync: bool,

    /// Seconds between connectivity probes
    pub probe_interval_secs: u64,

    /// Seconds before a single probe request gives up
    pub probe_timeout_secs: u64,

    /// URLs probed to decide whether the device is online
    pub probe_urls: Vec<String>,
}

impl SyncSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            call_timeout_secs: 30,
            backoff_initial_ms: 500,
            backoff_max_ms: 30_000,
            auto_sync: true,
            probe_interval_secs: 15,
            probe_timeout_secs: 5,
            probe_urls: vec![
                "https://www.cloudflare.com".to_string(),
                "https://www.google.com".to_string(),
            ],
        }
    }
}

impl ConfigSection for SyncSettings {
    const NAME: &'static str = "sync";

    fn check(&self, checks: &mut Checks) {
        checks
            .range("max_retries", self.max_retries, 1..=10)
            .range("call_timeout_secs", self.call_timeout_secs, 1..=600)
            .range("backoff_initial_ms", self.backoff_initial_ms, 10..=60_000)
            .range(
                "backoff_max_ms",
                self.backoff_max_ms,
                self.backoff_initial_ms..=3_600_000,
            )
            .range("probe_interval_secs", self.probe_interval_secs, 1..=3600)
            .range("probe_timeout_secs", self.probe_timeout_secs, 1..=60)
            .ensure(
                !self.probe_urls.is_empty(),
                "probe_urls",
                "must list at least one URL",
            );

        for (i, url) in self.probe_urls.iter().enumerate() {
            checks.http_url(&format!("probe_urls[{}]", i), url);
        }
    }
}
