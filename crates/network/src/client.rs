// crates/network/src/client.rs
//! HTTP client used for reachability probes

use crate::error::{NetworkError, NetworkResult};
use reqwest::redirect::Policy;
use reqwest::{Response, Url};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Whole-request deadline, connect included
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
    /// Honor `HTTP_PROXY` and friends
    pub use_system_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            user_agent: concat!("Heirloom/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 10,
            use_system_proxy: true,
        }
    }
}

/// Cheap to clone; clones share one connection pool
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    config: ClientConfig,
}

impl Client {
    pub fn new() -> NetworkResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> NetworkResult<Self> {
        let builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .redirect(Policy::limited(config.max_redirects));
        let builder = if config.use_system_proxy {
            builder
        } else {
            builder.no_proxy()
        };

        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends a HEAD request; anything but 2xx is an error
    pub async fn head(&self, url: &str) -> NetworkResult<Response> {
        let target = Url::parse(url).map_err(|e| NetworkError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = match self.http.head(target).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(NetworkError::Timeout {
                    url: url.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(NetworkError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            })
        }
    }

    /// True when `url` answers a HEAD request with 2xx
    pub async fn is_accessible(&self, url: &str) -> bool {
        self.head(url)
            .await
            .map_err(|e| log::debug!("{} unreachable: {}", url, e))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.use_system_proxy);
        assert!(config.user_agent.starts_with("Heirloom/"));
    }

    #[test]
    fn test_config_is_kept() {
        let client = Client::with_config(ClientConfig {
            max_redirects: 0,
            use_system_proxy: false,
            ..ClientConfig::default()
        })
        .unwrap();

        assert_eq!(client.config().max_redirects, 0);
        assert!(!client.config().use_system_proxy);
    }

    #[tokio::test]
    async fn test_unparseable_url_fails_before_sending() {
        let client = Client::new().unwrap();

        match client.head("not a url").await {
            Err(NetworkError::InvalidUrl { url, .. }) => assert_eq!(url, "not a url"),
            other => panic!("expected InvalidUrl, got {:?}", other.map(|r| r.status())),
        }
        assert!(!client.is_accessible("not a url").await);
    }
}
