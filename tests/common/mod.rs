//! Integration test common infrastructure.
//!
//! In-memory collaborators for the request pipeline, the membership
//! controller and the fleet loop, plus small builders for chat messages.

pub mod fakes;

#[allow(unused_imports)]
pub use fakes::{
    FakeDirectory, FakeMetadata, FakeStreams, RecordingChat, RecordingGame, RecordingStats,
};

use maprelay::beatmap::BeatmapInfo;
use maprelay::chat::{ChatMessage, IrcLine};
use maprelay::providers::User;
use maprelay::settings::ChannelSettings;

/// Parse a raw Twitch line into a chat message.
#[allow(dead_code)]
pub fn chat_line(raw: &str) -> ChatMessage {
    let line: IrcLine = raw.parse().expect("valid IRC line");
    ChatMessage::from_line(&line).expect("channel PRIVMSG")
}

/// A registered, enabled streamer with default settings.
#[allow(dead_code)]
pub fn streamer(twitch_id: &str, login: &str, osu_id: u64) -> User {
    User {
        twitch_id: twitch_id.to_string(),
        twitch_username: login.to_string(),
        osu_id,
        osu_username: format!("{login}_osu"),
        is_live: false,
        settings: ChannelSettings::new(login, osu_id),
    }
}

#[allow(dead_code)]
pub fn beatmap(id: u64, rating: f64) -> BeatmapInfo {
    BeatmapInfo {
        id,
        artist: "Camellia".to_string(),
        title: "Exit This Earth's Atomosphere".to_string(),
        version: "Evolution".to_string(),
        bpm: 200.0,
        length: 245,
        status: "ranked".to_string(),
        rating,
    }
}
