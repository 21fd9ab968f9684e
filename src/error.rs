//! Unified error handling for maprelay.
//!
//! This module provides the error hierarchy shared across the request
//! pipeline, the chat transport and the external collaborators, with static
//! codes for metric labeling.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Admission rejections (closed taxonomy)
// ============================================================================

/// Why a beatmap request was not forwarded.
///
/// Every variant is logged; only [`RejectReason::OutOfStarRange`] produces a
/// message visible in the source chat.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("channel is not open for requests")]
    NotEnabled,

    #[error("author is the broadcaster and test mode is off")]
    BroadcasterSelf,

    #[error("channel is not live playing the target game")]
    NotStreaming,

    #[error("requester is on cooldown for {remaining:?}")]
    OnCooldown { remaining: Duration },

    #[error("subscriber only request mode is active")]
    SubOnlyViolation,

    #[error("channel points only mode is active")]
    PointsOnlyViolation,

    #[error("requester is excluded")]
    Excluded,

    #[error("star rating {actual:.2} outside {low:.1}-{high:.1}")]
    OutOfStarRange { low: f64, high: f64, actual: f64 },
}

impl RejectReason {
    /// Get a static reason code for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotEnabled => "not_enabled",
            Self::BroadcasterSelf => "broadcaster_self",
            Self::NotStreaming => "not_streaming",
            Self::OnCooldown { .. } => "on_cooldown",
            Self::SubOnlyViolation => "sub_only",
            Self::PointsOnlyViolation => "points_only",
            Self::Excluded => "excluded",
            Self::OutOfStarRange { .. } => "out_of_star_range",
        }
    }

    /// Text to post back to the source chat, if this rejection is user-visible.
    ///
    /// Returns `None` for every rejection except the star rating gate.
    pub fn chat_reply(&self, requester: &str) -> Option<String> {
        match self {
            Self::OutOfStarRange { low, high, actual } => Some(format!(
                "@{requester} Streamer is accepting requests between {low:.1}-{high:.1}* difficulty. Your map is {actual:.1}*."
            )),
            _ => None,
        }
    }
}

// ============================================================================
// Collaborator errors (HTTP APIs, stores)
// ============================================================================

/// Failures raised at a collaborator boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("access token rejected")]
    Unauthorized,

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("store error: {0}")]
    Store(String),
}

impl ProviderError {
    /// Whether the failure is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::Unauthorized => "unauthorized",
            Self::Decode(_) => "decode",
            Self::NotFound(_) => "not_found",
            Self::Exhausted { .. } => "exhausted",
            Self::Store(_) => "store",
        }
    }
}

// ============================================================================
// Chat transport errors
// ============================================================================

/// Chat (IRC) transport failures.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("connection closed")]
    Closed,

    #[error("join of {channel} not acknowledged within {timeout:?}")]
    JoinTimeout { channel: String, timeout: Duration },

    #[error("line codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),
}

// ============================================================================
// Dispatch errors (aggregate after join-all)
// ============================================================================

/// One failed action inside a dispatch fan-out.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("chat acknowledgement failed: {0}")]
    Echo(#[source] ChatError),

    #[error("in-game message failed: {0}")]
    InGame(#[source] ProviderError),

    #[error("statistics record failed: {0}")]
    Statistics(#[source] ProviderError),
}

/// All action failures of a single dispatch, reported after every action ran.
#[derive(Debug, Error)]
#[error("{} dispatch action(s) failed: {}", .failures.len(), summarize(.failures))]
pub struct DispatchError {
    pub failures: Vec<ActionError>,
}

fn summarize(failures: &[ActionError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
