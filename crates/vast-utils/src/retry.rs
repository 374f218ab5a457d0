//! Bounded worker pool with per-item retry.
//!
//! Used for batch operations such as destroying many instances at once. Each
//! item is retried independently; failures are logged and reported per item
//! instead of being folded into a single error.

use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Exponential backoff retry configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per item, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry, doubled after every failure
    pub base_delay: Duration,
    /// Items in flight at the same time
    pub concurrency: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            concurrency: 10,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// What happened to one item of a batch.
#[derive(Debug)]
pub struct Outcome<T, R, E> {
    pub item: T,
    pub result: Result<R, E>,
    pub attempts: u32,
}

impl<T, R, E> Outcome<T, R, E> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `f` over every item with at most `policy.concurrency` calls in flight.
///
/// Outcomes come back in completion order, not input order.
pub async fn run_bounded<T, R, E, F, Fut>(
    items: Vec<T>,
    policy: RetryPolicy,
    f: F,
) -> Vec<Outcome<T, R, E>>
where
    T: Clone + Display,
    E: Display,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let f = &f;
    let attempts_allowed = policy.max_attempts.max(1);

    stream::iter(items)
        .map(|item| async move {
            let mut attempt = 1;
            loop {
                match f(item.clone()).await {
                    Ok(value) => {
                        debug!("{} succeeded after {} attempt(s)", item, attempt);
                        return Outcome {
                            item,
                            result: Ok(value),
                            attempts: attempt,
                        };
                    }
                    Err(e) if attempt < attempts_allowed => {
                        let delay = policy.delay_for(attempt);
                        warn!(
                            "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                            item, attempt, attempts_allowed, e, delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => {
                        warn!("{} failed after {} attempt(s): {}", item, attempt, e);
                        return Outcome {
                            item,
                            result: Err(e),
                            attempts: attempt,
                        };
                    }
                }
            }
        })
        .buffer_unordered(policy.concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn fast_policy(max_attempts: u32, concurrency: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            concurrency,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = fast_policy(5, 1);
        assert_eq!(policy.delay_for(1), Duration::from_millis(1));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2));
        assert_eq!(policy.delay_for(4), Duration::from_millis(8));
    }

    #[tokio::test]
    async fn test_all_items_succeed() {
        let outcomes = run_bounded(vec![1u64, 2, 3], fast_policy(3, 2), |id| async move {
            Ok::<_, String>(id * 10)
        })
        .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.is_success() && o.attempts == 1));

        let mut values: Vec<u64> = outcomes.into_iter().filter_map(|o| o.result.ok()).collect();
        values.sort();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let calls = Mutex::new(HashMap::<u64, u32>::new());

        let outcomes = run_bounded(vec![7u64], fast_policy(3, 1), |id| {
            let count = {
                let mut calls = calls.lock().unwrap();
                let entry = calls.entry(id).or_insert(0);
                *entry += 1;
                *entry
            };
            async move {
                if count < 2 {
                    Err("rate limited".to_string())
                } else {
                    Ok(id)
                }
            }
        })
        .await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_failures_reported_per_item() {
        let outcomes = run_bounded(vec![1u64, 2], fast_policy(2, 2), |id| async move {
            if id == 2 {
                Err(format!("instance {} not found", id))
            } else {
                Ok(())
            }
        })
        .await;

        let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].item, 2);
        assert_eq!(failed[0].attempts, 2);
        assert!(outcomes.iter().any(|o| o.item == 1 && o.is_success()));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let counters = (AtomicUsize::new(0), AtomicUsize::new(0));
        let (in_flight, peak) = (&counters.0, &counters.1);

        run_bounded((0u64..8).collect(), fast_policy(1, 3), move |_| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, String>(())
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }
}
