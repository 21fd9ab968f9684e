//! Chat transport: IRC wire handling for Twitch chat and osu! Bancho.
//!
//! - [`message`]: line parsing and the [`ChatMessage`] model
//! - [`client`]: the connection task and its [`IrcClient`] handle
//! - [`stream`]: plaintext/TLS socket
//! - [`rate_limit`]: per-target outbound flood control

pub mod client;
pub mod message;
pub mod rate_limit;
pub mod stream;

pub use client::{ChatEvent, IrcClient, IrcConfig};
pub use message::{ChatMessage, Command, IrcLine};
pub use rate_limit::{SendLimiter, SendQuota};

use crate::error::ChatError;
use async_trait::async_trait;

/// Channel membership operations on the chat connection.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Join `channel`, resolving once the server acknowledges the join.
    ///
    /// Callers bound the wait themselves; this future may pend indefinitely
    /// if the server never answers.
    async fn join(&self, channel: &str) -> Result<(), ChatError>;

    /// Leave `channel`. Not acknowledged.
    async fn part(&self, channel: &str) -> Result<(), ChatError>;
}

/// Posting text into a chat channel.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, channel: &str, text: &str) -> Result<(), ChatError>;
}
