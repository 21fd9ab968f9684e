//! Sliding-window join budget.
//!
//! Twitch allows `K` JOINs per rolling window `W` per connection. Every issued
//! join is remembered until it ages out of the window, so the count over any
//! window of length `W` never exceeds `K`.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct JoinBucket {
    limit: usize,
    window: Duration,
    issued: VecDeque<Instant>,
}

impl JoinBucket {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            issued: VecDeque::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.issued.front() {
            if oldest + self.window <= now {
                self.issued.pop_front();
            } else {
                break;
            }
        }
    }

    /// Joins that may be issued at `now`.
    pub fn available(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.limit.saturating_sub(self.issued.len())
    }

    /// Wait until at least one join is allowed, then claim up to `want`
    /// slots at the current instant. Returns the number claimed.
    pub async fn take_batch(&mut self, want: usize) -> usize {
        if want == 0 {
            return 0;
        }
        loop {
            let now = Instant::now();
            let available = self.available(now);
            if available > 0 {
                let n = available.min(want);
                self.issued.extend(std::iter::repeat_n(now, n));
                return n;
            }
            // Full: the oldest entry frees the next slot.
            if let Some(&oldest) = self.issued.front() {
                tokio::time::sleep_until(oldest + self.window).await;
            }
        }
    }
}
