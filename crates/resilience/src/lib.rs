// crates/resilience/src/lib.rs
//! Backoff schedules and call deadlines for the sync stack
//!
//! ```rust
//! use heirloom_resilience::{RetryPolicy, Timeout};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3)
//!     .with_initial_delay(Duration::from_millis(100))
//!     .with_jitter(false);
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
//!
//! let deadline = Timeout::new(Duration::from_secs(30));
//! assert_eq!(deadline.duration(), Duration::from_secs(30));
//! ```

mod error;
mod retry;
mod timeout;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::RetryPolicy;
pub use timeout::{with_timeout, Timeout};
