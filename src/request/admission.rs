//! Admission checks for beatmap requests.
//!
//! The independent checks run concurrently and the first failure wins. The
//! star rating gate runs last, only once everything else passed, because its
//! rejection is the one a requester gets to see.

use super::cooldown::{CooldownKey, CooldownTracker};
use crate::beatmap::BeatmapInfo;
use crate::chat::ChatMessage;
use crate::error::RejectReason;
use crate::providers::StreamStatusProvider;
use crate::settings::ChannelSettings;
use futures_util::future::{BoxFuture, FutureExt, try_join_all};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    Accept,
    Reject(RejectReason),
}

impl AdmissionDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

type Check<'a> = BoxFuture<'a, Result<(), RejectReason>>;

pub struct AdmissionPipeline {
    streams: Arc<dyn StreamStatusProvider>,
    cooldowns: Arc<CooldownTracker>,
}

impl AdmissionPipeline {
    pub fn new(streams: Arc<dyn StreamStatusProvider>, cooldowns: Arc<CooldownTracker>) -> Self {
        Self { streams, cooldowns }
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    /// Decide whether `message` may be forwarded.
    pub async fn evaluate(
        &self,
        message: &ChatMessage,
        settings: &ChannelSettings,
        beatmap: &BeatmapInfo,
    ) -> AdmissionDecision {
        let mut checks: Vec<Check<'_>> = Vec::with_capacity(6);

        if !settings.test_mode {
            checks.push(async move { not_broadcaster(message) }.boxed());
            checks.push(self.streaming_target_game(&message.channel).boxed());
            checks.push(async move { self.not_on_cooldown(message, settings) }.boxed());
        }
        checks.push(async move { sub_only_gate(message, settings) }.boxed());
        checks.push(async move { points_only_gate(message, settings) }.boxed());
        checks.push(async move { not_excluded(message, settings) }.boxed());

        if let Err(reason) = try_join_all(checks).await {
            return AdmissionDecision::Reject(reason);
        }

        match star_rating_in_range(settings, beatmap.rating) {
            Ok(()) => AdmissionDecision::Accept,
            Err(reason) => AdmissionDecision::Reject(reason),
        }
    }

    async fn streaming_target_game(&self, channel: &str) -> Result<(), RejectReason> {
        match self.streams.is_live_playing(channel).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(RejectReason::NotStreaming),
            Err(e) => {
                warn!(channel = %channel, error = %e, "Live status lookup failed");
                Err(RejectReason::NotStreaming)
            }
        }
    }

    fn not_on_cooldown(&self, message: &ChatMessage, settings: &ChannelSettings) -> Result<(), RejectReason> {
        let key = CooldownKey::new(&message.channel, &message.author_id);
        self.cooldowns
            .check_and_touch(&key, settings.cooldown(), Instant::now())
            .map_err(|remaining| {
                debug!(requester = %message.author, ?remaining, "Requester on cooldown");
                RejectReason::OnCooldown { remaining }
            })
    }
}

fn not_broadcaster(message: &ChatMessage) -> Result<(), RejectReason> {
    if message.is_broadcaster() {
        return Err(RejectReason::BroadcasterSelf);
    }
    Ok(())
}

fn sub_only_gate(message: &ChatMessage, settings: &ChannelSettings) -> Result<(), RejectReason> {
    if settings.sub_only && !(message.is_mod || message.is_subscriber || message.is_vip) {
        return Err(RejectReason::SubOnlyViolation);
    }
    Ok(())
}

fn points_only_gate(message: &ChatMessage, settings: &ChannelSettings) -> Result<(), RejectReason> {
    if settings.points_only && !message.redeemed_with_points() {
        return Err(RejectReason::PointsOnlyViolation);
    }
    Ok(())
}

fn not_excluded(message: &ChatMessage, settings: &ChannelSettings) -> Result<(), RejectReason> {
    if settings.is_excluded(&message.author) {
        return Err(RejectReason::Excluded);
    }
    Ok(())
}

fn star_rating_in_range(settings: &ChannelSettings, rating: f64) -> Result<(), RejectReason> {
    let range = settings.star_range;
    if range.accepts(rating) {
        return Ok(());
    }
    Err(RejectReason::OutOfStarRange {
        low: range.low,
        high: range.high,
        actual: rating,
    })
}
