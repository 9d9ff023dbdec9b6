// crates/resilience/tests/resilience_tests.rs

use heirloom_resilience::{with_timeout, ResilienceError, RetryPolicy, Timeout};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A flaky call retried under the policy, each try bounded by a deadline
#[tokio::test]
async fn test_flaky_call_succeeds_on_second_try() {
    let policy = RetryPolicy::new(3)
        .with_initial_delay(Duration::from_millis(1))
        .with_jitter(false);
    let deadline = Timeout::new(Duration::from_millis(200));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut attempts = 0;
    let mut outcome: Result<usize, &str> = Err("never ran");
    while policy.allows_another(attempts) {
        tokio::time::sleep(policy.delay_for_attempt(attempts)).await;
        attempts += 1;

        let calls = Arc::clone(&calls);
        outcome = deadline
            .run(async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err("connection reset"),
                    n => Ok(n + 1),
                }
            })
            .await
            .unwrap_or(Err("deadline"));

        if outcome.is_ok() {
            break;
        }
    }

    assert_eq!(outcome, Ok(2));
    assert_eq!(attempts, 2);
}

#[tokio::test]
async fn test_hung_call_is_released() {
    let started = Instant::now();

    let result = with_timeout(Duration::from_millis(20), std::future::pending::<()>()).await;

    assert_eq!(
        result,
        Err(ResilienceError::Elapsed {
            limit: Duration::from_millis(20)
        })
    );
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_schedule_never_shrinks_without_jitter() {
    let policy = RetryPolicy::new(8)
        .with_initial_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(2))
        .with_jitter(false);

    let delays: Vec<Duration> = (0..12).map(|a| policy.delay_for_attempt(a)).collect();

    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(delays[11], Duration::from_secs(2));
}
