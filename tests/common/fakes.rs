//! In-memory implementations of the collaborator traits.

#![allow(dead_code)]

use async_trait::async_trait;
use maprelay::beatmap::{BeatmapInfo, BeatmapKind};
use maprelay::chat::{ChatSink, ChatTransport};
use maprelay::error::{ChatError, ProviderError};
use maprelay::providers::{
    BeatmapMetadataProvider, GameMessageSink, LiveUser, RequestRecord, StatisticsSink,
    StreamStatusProvider, User, UserDirectory,
};
use maprelay::settings::ChannelSettings;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use tokio::time::Instant;

/// Registered users keyed by channel.
#[derive(Default)]
pub struct FakeDirectory {
    pub users: Mutex<Vec<User>>,
}

impl FakeDirectory {
    pub fn with(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users),
        }
    }

    pub fn update(&self, channel: &str, f: impl FnOnce(&mut ChannelSettings)) {
        let mut users = self.users.lock();
        if let Some(user) = users.iter_mut().find(|u| u.settings.channel == channel) {
            f(&mut user.settings);
        }
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn get_enabled_users(&self) -> Result<Vec<User>, ProviderError> {
        Ok(self.users.lock().iter().filter(|u| u.settings.enabled).cloned().collect())
    }

    async fn settings_for(&self, channel: &str) -> Result<Option<ChannelSettings>, ProviderError> {
        Ok(self
            .users
            .lock()
            .iter()
            .find(|u| u.settings.channel == channel)
            .map(|u| u.settings.clone()))
    }

    async fn set_live(&self, twitch_id: &str, is_live: bool) -> Result<(), ProviderError> {
        for user in self.users.lock().iter_mut().filter(|u| u.twitch_id == twitch_id) {
            user.is_live = is_live;
        }
        Ok(())
    }

    async fn rename(&self, twitch_id: &str, login: &str) -> Result<(), ProviderError> {
        for user in self.users.lock().iter_mut().filter(|u| u.twitch_id == twitch_id) {
            user.twitch_username = login.to_string();
            user.settings.channel = login.to_string();
        }
        Ok(())
    }
}

/// Live status: channel logins and ids currently streaming the target game.
#[derive(Default)]
pub struct FakeStreams {
    /// Twitch ids reported by batch queries.
    pub live_ids: Mutex<BTreeSet<String>>,
    /// Channel logins reported by single-channel queries.
    pub live_channels: Mutex<BTreeSet<String>>,
    /// Login reported for an id by batch queries; `user{id}` otherwise.
    pub logins: Mutex<HashMap<String, String>>,
    pub fail: Mutex<bool>,
}

impl FakeStreams {
    pub fn live(ids: &[&str], channels: &[&str]) -> Self {
        Self {
            live_ids: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
            live_channels: Mutex::new(channels.iter().map(|s| s.to_string()).collect()),
            logins: Mutex::new(HashMap::new()),
            fail: Mutex::new(false),
        }
    }

    pub fn with_logins(self, logins: &[(&str, &str)]) -> Self {
        *self.logins.lock() = logins
            .iter()
            .map(|(id, login)| (id.to_string(), login.to_string()))
            .collect();
        self
    }
}

#[async_trait]
impl StreamStatusProvider for FakeStreams {
    async fn get_live_users(
        &self,
        ids: &[String],
        _batch_size: usize,
    ) -> Result<Vec<LiveUser>, ProviderError> {
        if *self.fail.lock() {
            return Err(ProviderError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        let live = self.live_ids.lock();
        let logins = self.logins.lock();
        Ok(ids
            .iter()
            .filter(|id| live.contains(*id))
            .map(|id| LiveUser {
                user_id: id.clone(),
                user_login: logins.get(id).cloned().unwrap_or_else(|| format!("user{id}")),
                game_id: "21465".into(),
            })
            .collect())
    }

    async fn is_live_playing(&self, channel: &str) -> Result<bool, ProviderError> {
        Ok(self.live_channels.lock().contains(channel))
    }
}

#[derive(Default)]
pub struct FakeMetadata {
    pub maps: Mutex<HashMap<u64, BeatmapInfo>>,
    pub lookups: Mutex<Vec<(u64, BeatmapKind)>>,
}

impl FakeMetadata {
    pub fn with(entries: Vec<(u64, BeatmapInfo)>) -> Self {
        Self {
            maps: Mutex::new(entries.into_iter().collect()),
            lookups: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BeatmapMetadataProvider for FakeMetadata {
    async fn get(&self, id: u64, kind: BeatmapKind) -> Result<BeatmapInfo, ProviderError> {
        self.lookups.lock().push((id, kind));
        self.maps
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("/beatmaps/{id}")))
    }
}

/// Chat connection fake: records sends, joins and parts.
#[derive(Default)]
pub struct RecordingChat {
    pub sent: Mutex<Vec<(String, String)>>,
    pub joins: Mutex<Vec<(String, Instant)>>,
    pub parts: Mutex<Vec<String>>,
    /// Channels whose join is never acknowledged.
    pub silent: Mutex<BTreeSet<String>>,
}

impl RecordingChat {
    pub fn join_count(&self) -> usize {
        self.joins.lock().len()
    }
}

#[async_trait]
impl ChatSink for RecordingChat {
    async fn send(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        self.sent.lock().push((channel.to_string(), text.to_string()));
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for RecordingChat {
    async fn join(&self, channel: &str) -> Result<(), ChatError> {
        self.joins.lock().push((channel.to_string(), Instant::now()));
        let silent = self.silent.lock().contains(channel);
        if silent {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn part(&self, channel: &str) -> Result<(), ChatError> {
        self.parts.lock().push(channel.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingGame {
    pub sent: Mutex<Vec<(u64, String)>>,
}

#[async_trait]
impl GameMessageSink for RecordingGame {
    async fn send(&self, target_osu_id: u64, text: &str) -> Result<(), ProviderError> {
        self.sent.lock().push((target_osu_id, text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStats {
    pub requests: Mutex<Vec<RequestRecord>>,
    pub commands: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl StatisticsSink for RecordingStats {
    async fn record_request(&self, record: RequestRecord) -> Result<(), ProviderError> {
        self.requests.lock().push(record);
        Ok(())
    }

    async fn record_command(&self, osu_username: &str, command: &str) -> Result<(), ProviderError> {
        self.commands
            .lock()
            .push((osu_username.to_string(), command.to_string()));
        Ok(())
    }
}
