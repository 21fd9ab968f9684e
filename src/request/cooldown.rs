//! Per-requester cooldown windows.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Cooldown key: one requester on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub channel: String,
    pub user_id: String,
}

impl CooldownKey {
    pub fn new(channel: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            user_id: user_id.into(),
        }
    }
}

/// Last accepted request time per requester.
///
/// `check_and_touch` runs under a single lock with no await point, so two
/// concurrent requests from the same user can never both pass.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_request: Mutex<HashMap<CooldownKey, Instant>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `key` if its cooldown has elapsed, recording `now` as its last
    /// request. Otherwise return the remaining wait, leaving the entry as is.
    ///
    /// Entries of the same channel whose cooldown elapsed are pruned first.
    pub fn check_and_touch(
        &self,
        key: &CooldownKey,
        cooldown: Duration,
        now: Instant,
    ) -> Result<(), Duration> {
        let mut entries = self.last_request.lock();

        entries.retain(|k, last| {
            k.channel != key.channel || now.saturating_duration_since(*last) < cooldown
        });

        match entries.get_mut(key) {
            None => {
                entries.insert(key.clone(), now);
                Ok(())
            }
            Some(last) => {
                let elapsed = now.saturating_duration_since(*last);
                if elapsed >= cooldown {
                    *last = now;
                    Ok(())
                } else {
                    Err(cooldown - elapsed)
                }
            }
        }
    }

    /// Number of tracked requesters.
    pub fn len(&self) -> usize {
        self.last_request.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
