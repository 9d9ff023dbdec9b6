// crates/resilience/src/timeout.rs
//! Deadlines for single async calls

use crate::error::{ResilienceError, ResilienceResult};
use std::future::Future;
use std::time::Duration;

/// Awaits `fut` for at most `limit`
///
/// On expiry the future is dropped, cancelling whatever it was doing at its
/// current await point.
pub async fn with_timeout<F>(limit: Duration, fut: F) -> ResilienceResult<F::Output>
where
    F: Future,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(output) => Ok(output),
        Err(_) => Err(ResilienceError::Elapsed { limit }),
    }
}

/// A reusable call deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    limit: Duration,
}

impl Timeout {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn duration(&self) -> Duration {
        self.limit
    }

    /// Runs `fut` under this deadline
    pub async fn run<F>(&self, fut: F) -> ResilienceResult<F::Output>
    where
        F: Future,
    {
        with_timeout(self.limit, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_future_passes_through() {
        let out = with_timeout(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            "done"
        })
        .await;

        assert_eq!(out, Ok("done"));
    }

    #[tokio::test]
    async fn test_slow_future_is_cut_off() {
        let out = Timeout::new(Duration::from_millis(10))
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;

        assert_eq!(
            out,
            Err(ResilienceError::Elapsed {
                limit: Duration::from_millis(10)
            })
        );
    }

    #[tokio::test]
    async fn test_inner_result_is_not_flattened() {
        let out: ResilienceResult<Result<u8, &str>> =
            Timeout::new(Duration::from_secs(1)).run(async { Err("nope") }).await;

        assert_eq!(out, Ok(Err("nope")));
    }
}
