/// Exponential backoff for rate-limited operations
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Policy that never sleeps, used by tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Wait after failed attempt number `attempt` (1 for the first attempt):
    /// `base * 2^attempt * (0.5 + U[0,1))`, capped at `max_delay`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2_f64.powi(attempt.min(16) as i32) * (0.5 + rand::thread_rng().gen::<f64>());
        self.base_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Final result plus how many times the operation actually ran
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails with an error `classify` rejects,
/// or `policy.max_attempts` is exhausted. The last error is returned on
/// exhaustion.
pub async fn with_retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    label: &str,
    classify: C,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("✅ {} succeeded on attempt {}", label, attempt);
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(e) if attempt < max_attempts && classify(&e) => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    "⏳ {} attempt {} rate limited ({}), retrying in {:?}",
                    label, attempt, e, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                };
            }
        }
    }
}
