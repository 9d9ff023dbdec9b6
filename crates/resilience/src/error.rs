// crates/resilience/src/error.rs

use std::time::Duration;
use thiserror::Error;

pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Failure raised by a resilience wrapper rather than by the wrapped call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResilienceError {
    /// The wrapped future was still pending when the limit ran out
    #[error("no result within {limit:?}")]
    Elapsed { limit: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_names_the_limit() {
        let err = ResilienceError::Elapsed {
            limit: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "no result within 1.5s");
    }
}
