// crates/network/src/error.rs

use thiserror::Error;

pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Debug, Error)]
pub enum NetworkError {
    /// Transport failure: DNS, refused connection, TLS, reset
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered, but not with 2xx
    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("'{url}' is not a usable URL: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// No probe URL answered
    #[error("no network connection")]
    NetworkUnavailable,

    #[error("{url} did not answer in time")]
    Timeout { url: String },
}

impl NetworkError {
    /// Transient failures worth probing again later
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Request(e) => !e.is_builder(),
            NetworkError::Status { status, .. } => *status >= 500 || *status == 429,
            NetworkError::NetworkUnavailable | NetworkError::Timeout { .. } => true,
            NetworkError::InvalidUrl { .. } => false,
        }
    }

    /// The HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answered(status: u16) -> NetworkError {
        NetworkError::Status {
            url: "https://example.com".to_string(),
            status,
        }
    }

    #[test]
    fn test_display_names_the_url() {
        assert_eq!(answered(404).to_string(), "https://example.com answered 404");
        assert_eq!(
            NetworkError::Timeout {
                url: "https://example.com".to_string()
            }
            .to_string(),
            "https://example.com did not answer in time"
        );
    }

    #[test]
    fn test_server_side_statuses_are_retryable() {
        assert!(answered(502).is_retryable());
        assert!(answered(429).is_retryable());
        assert!(!answered(404).is_retryable());
        assert_eq!(answered(404).status(), Some(404));
    }

    #[test]
    fn test_offline_is_retryable_bad_url_is_not() {
        assert!(NetworkError::NetworkUnavailable.is_retryable());
        assert_eq!(NetworkError::NetworkUnavailable.status(), None);

        let bad = NetworkError::InvalidUrl {
            url: "nope".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert!(!bad.is_retryable());
    }
}
