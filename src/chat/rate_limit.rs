//! Outbound message rate limiting.
//!
//! Chat platforms drop (or penalize) bots that exceed their per-channel send
//! rate. Each target gets its own `governor` token bucket, and senders wait
//! for a token instead of failing.

use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovRateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Type alias for governor's direct rate limiter.
type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// Per-target send budget.
#[derive(Debug, Clone, Copy)]
pub struct SendQuota {
    /// Messages that may go out back to back.
    pub burst: u32,
    /// Time to earn back one message.
    pub replenish: Duration,
}

impl Default for SendQuota {
    fn default() -> Self {
        // 20 messages per 30 seconds.
        Self {
            burst: 20,
            replenish: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug)]
struct TargetLimiter {
    limiter: Arc<DirectRateLimiter>,
    last_used: Instant,
}

/// Thread-safe per-target send limiter.
#[derive(Debug)]
pub struct SendLimiter {
    limiters: DashMap<String, TargetLimiter>,
    quota: SendQuota,
}

impl SendLimiter {
    pub fn new(quota: SendQuota) -> Self {
        Self {
            limiters: DashMap::new(),
            quota,
        }
    }

    fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.quota.burst).unwrap_or(nonzero!(1u32));
        Quota::with_period(self.quota.replenish)
            .unwrap_or_else(|| Quota::per_second(nonzero!(1u32)))
            .allow_burst(burst)
    }

    /// The limiter of `target`, created on first use. The map guard is
    /// released before returning.
    fn limiter(&self, target: &str) -> Arc<DirectRateLimiter> {
        let mut entry = self
            .limiters
            .entry(target.to_owned())
            .or_insert_with(|| TargetLimiter {
                limiter: Arc::new(GovRateLimiter::direct(self.quota())),
                last_used: Instant::now(),
            });
        entry.last_used = Instant::now();
        Arc::clone(&entry.limiter)
    }

    /// Try to take a send token for `target` without waiting.
    pub fn check(&self, target: &str) -> bool {
        let allowed = self.limiter(target).check().is_ok();
        if !allowed {
            debug!(target = %target, "send rate limit reached");
        }
        allowed
    }

    /// Wait until a message may be sent to `target`.
    pub async fn until_ready(&self, target: &str) {
        self.limiter(target).until_ready().await;
    }

    /// Forget a target (after parting its channel).
    pub fn remove(&self, target: &str) {
        self.limiters.remove(target);
    }

    /// Drop targets idle long enough for their bucket to be full again.
    /// A fresh limiter would behave the same, so nothing is lost.
    pub fn prune_idle(&self) {
        let refill = self.quota.replenish.saturating_mul(self.quota.burst.max(1));
        let before = self.limiters.len();
        self.limiters.retain(|_, entry| entry.last_used.elapsed() < refill);
        let pruned = before.saturating_sub(self.limiters.len());
        if pruned > 0 {
            debug!(pruned, "pruned idle send limiters");
        }
    }

    pub fn tracked(&self) -> usize {
        self.limiters.len()
    }
}

impl Default for SendLimiter {
    fn default() -> Self {
        Self::new(SendQuota::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_quota() -> SendQuota {
        SendQuota {
            burst: 3,
            replenish: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_burst_then_limited() {
        let limiter = SendLimiter::new(test_quota());
        for _ in 0..3 {
            assert!(limiter.check("#streamer"));
        }
        assert!(!limiter.check("#streamer"));
    }

    #[test]
    fn test_targets_independent() {
        let limiter = SendLimiter::new(test_quota());
        for _ in 0..3 {
            limiter.check("#a");
        }
        assert!(!limiter.check("#a"));
        assert!(limiter.check("#b"));
    }

    #[test]
    fn test_remove_target() {
        let limiter = SendLimiter::new(test_quota());
        limiter.check("#a");
        assert_eq!(limiter.tracked(), 1);
        limiter.remove("#a");
        assert_eq!(limiter.tracked(), 0);
    }

    #[tokio::test]
    async fn test_until_ready_waits_for_replenish() {
        let limiter = SendLimiter::new(SendQuota {
            burst: 1,
            replenish: Duration::from_millis(80),
        });
        limiter.until_ready("#a").await;

        let started = Instant::now();
        limiter.until_ready("#a").await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_idle_targets_pruned() {
        let limiter = SendLimiter::new(SendQuota {
            burst: 1,
            replenish: Duration::from_millis(20),
        });
        limiter.check("osu_player");
        std::thread::sleep(Duration::from_millis(60));
        limiter.check("#streamer");

        limiter.prune_idle();
        assert_eq!(limiter.tracked(), 1);
        assert!(limiter.limiters.contains_key("#streamer"));
    }

    #[test]
    fn test_zero_burst_falls_back_to_one() {
        let limiter = SendLimiter::new(SendQuota {
            burst: 0,
            replenish: Duration::from_secs(60),
        });
        assert!(limiter.check("#a"));
        assert!(!limiter.check("#a"));
    }
}
