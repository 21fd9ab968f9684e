//! maprelay - Twitch chat to osu! beatmap request relay.
//!
//! Viewers paste beatmap links in a streamer's Twitch chat; the relay checks
//! the channel's request policy and forwards accepted requests to the
//! streamer as an osu! in-game message. A fleet loop keeps the chat
//! connection joined to exactly the registered channels that are live.

pub mod beatmap;
pub mod chat;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod fleet;
pub mod http;
pub mod membership;
pub mod metrics;
pub mod providers;
pub mod request;
pub mod retry;
pub mod settings;
pub mod telemetry;
