//! Bounded Retry Policy
//!
//! Both polling loops in the warden (the readiness prober and the key accept
//! loop) share the same shape: sleep a fixed interval, try once, stop on
//! success or after a bounded number of attempts. [`RetryPolicy`] makes that
//! shape an explicit value so the bounds are configurable and the loop is
//! testable on its own with millisecond intervals.
//!
//! The sleep happens **before** each attempt: the resources being polled
//! (fresh instances, freshly generated keys) are never ready at time zero,
//! so probing immediately would waste the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// A bounded attempts-times-interval retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts before giving up.
    pub max_attempts: u32,
    /// Fixed sleep before every attempt.
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            interval,
        }
    }

    /// Total worst-case duration of the loop.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Run `attempt` until it returns `true` or the bound is exhausted.
    ///
    /// The attempt closure receives the zero-based attempt index. Returns
    /// whether any attempt succeeded; never errors. Each attempt must carry
    /// its own failure handling and report plain `false` on failure.
    pub async fn run_until<F, Fut>(&self, mut attempt: F) -> bool
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = bool>,
    {
        for i in 0..self.max_attempts {
            tokio::time::sleep(self.interval).await;
            if attempt(i).await {
                debug!(attempt = i, "retry loop succeeded");
                return true;
            }
        }
        debug!(max_attempts = self.max_attempts, "retry loop exhausted");
        false
    }
}
