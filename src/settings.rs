//! Per-channel request policy.
//!
//! Settings are owned by the store; the request pipeline only reads them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Sentinel bound meaning "no star rating limit".
pub const UNSET_BOUND: f64 = -1.0;

/// Default cooldown applied to newly registered channels.
pub const DEFAULT_COOLDOWN_SECS: f64 = 30.0;

/// Accepted star rating window, exclusive on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarRange {
    pub low: f64,
    pub high: f64,
}

impl StarRange {
    pub const UNSET: StarRange = StarRange {
        low: UNSET_BOUND,
        high: UNSET_BOUND,
    };

    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// A sentinel on either side disables the gate (`[0, -1]` included).
    pub fn is_unset(&self) -> bool {
        self.low == UNSET_BOUND || self.high == UNSET_BOUND
    }

    /// Unset ranges accept anything; otherwise `low < rating < high`.
    pub fn accepts(&self, rating: f64) -> bool {
        self.is_unset() || (self.low < rating && rating < self.high)
    }
}

impl Default for StarRange {
    fn default() -> Self {
        Self::UNSET
    }
}

/// Request policy for one Twitch channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSettings {
    /// Channel (broadcaster login, lowercase).
    pub channel: String,
    /// osu! user id receiving the in-game messages.
    pub osu_id: u64,
    pub enabled: bool,
    pub echo_enabled: bool,
    pub sub_only: bool,
    pub points_only: bool,
    pub test_mode: bool,
    pub cooldown_secs: f64,
    pub star_range: StarRange,
    /// Lowercase requester logins that may never request.
    pub excluded_users: HashSet<String>,
}

impl ChannelSettings {
    /// Settings a channel receives on registration.
    pub fn new(channel: impl Into<String>, osu_id: u64) -> Self {
        Self {
            channel: channel.into(),
            osu_id,
            enabled: true,
            echo_enabled: true,
            sub_only: false,
            points_only: false,
            test_mode: false,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            star_range: StarRange::UNSET,
            excluded_users: HashSet::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs.max(0.0))
    }

    pub fn is_excluded(&self, login: &str) -> bool {
        self.excluded_users.contains(&login.to_lowercase())
    }
}

/// Parse a comma-separated exclusion list into lowercase logins.
pub fn parse_excluded(list: &str) -> HashSet<String> {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
