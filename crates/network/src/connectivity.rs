// crates/network/src/connectivity.rs
//! Online/offline detection by probing well-known URLs

use crate::client::Client;
use crate::error::{NetworkError, NetworkResult};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

/// Probed when no URLs are configured
pub const DEFAULT_PROBE_URLS: [&str; 2] = ["https://www.cloudflare.com", "https://www.google.com"];

#[derive(Clone)]
pub struct ConnectivityChecker {
    client: Client,
    urls: Vec<String>,
}

impl ConnectivityChecker {
    pub fn new(client: Client) -> Self {
        let urls = DEFAULT_PROBE_URLS.map(String::from).to_vec();
        Self::with_urls(client, urls)
    }

    pub fn with_urls(client: Client, urls: Vec<String>) -> Self {
        Self { client, urls }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Probes every URL at once; online as soon as any of them answers
    ///
    /// With no URLs configured this always reports offline.
    pub async fn is_online(&self) -> bool {
        let mut probes = JoinSet::new();
        for url in &self.urls {
            let client = self.client.clone();
            let url = url.clone();
            probes.spawn(async move { client.is_accessible(&url).await });
        }

        while let Some(answered) = probes.join_next().await {
            if matches!(answered, Ok(true)) {
                probes.abort_all();
                return true;
            }
        }
        false
    }

    /// Like [`is_online`](Self::is_online), as a `Result`
    pub async fn check(&self) -> NetworkResult<()> {
        match self.is_online().await {
            true => Ok(()),
            false => Err(NetworkError::NetworkUnavailable),
        }
    }

    /// Spawns a task that probes every `interval` and hands each result to
    /// `report`
    ///
    /// The first probe runs immediately. A probe slower than `interval`
    /// delays the next one rather than bunching them up. Runs until the
    /// handle is aborted.
    pub fn spawn_probe<F>(self, interval: Duration, report: F) -> JoinHandle<()>
    where
        F: Fn(bool) + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let online = self.is_online().await;
                log::trace!("probe: {}", if online { "online" } else { "offline" });
                report(online);
            }
        })
    }
}
