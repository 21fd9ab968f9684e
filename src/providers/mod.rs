//! Collaborator boundaries of the request pipeline and the fleet loop.
//!
//! The core only sees these traits. HTTP implementations live in
//! [`twitch`] and [`osu`]; the sqlite store implements the directory,
//! settings and statistics traits in `crate::db`.

pub mod osu;
pub mod twitch;

pub use osu::OsuApi;
pub use twitch::TwitchHelix;

use crate::beatmap::{BeatmapInfo, BeatmapKind};
use crate::error::ProviderError;
use crate::settings::ChannelSettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A registered streamer.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub twitch_id: String,
    pub twitch_username: String,
    pub osu_id: u64,
    pub osu_username: String,
    pub is_live: bool,
    pub settings: ChannelSettings,
}

/// A stream reported live by the streaming platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUser {
    pub user_id: String,
    pub user_login: String,
    pub game_id: String,
}

/// One forwarded beatmap request, as stored for statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub requester: String,
    pub channel: String,
    pub beatmap_id: u64,
    pub mods: String,
    pub requested_at: DateTime<Utc>,
}

/// Registered users and their channel settings.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_enabled_users(&self) -> Result<Vec<User>, ProviderError>;

    /// Settings of the channel, or `None` if nobody registered it.
    async fn settings_for(&self, channel: &str) -> Result<Option<ChannelSettings>, ProviderError>;

    async fn set_live(&self, twitch_id: &str, is_live: bool) -> Result<(), ProviderError>;

    /// Record a new channel login for `twitch_id` after a rename.
    async fn rename(&self, twitch_id: &str, login: &str) -> Result<(), ProviderError>;
}

/// Settings mutations issued by in-game commands.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn user_by_osu_username(&self, osu_username: &str) -> Result<Option<User>, ProviderError>;

    async fn save_settings(&self, settings: &ChannelSettings) -> Result<(), ProviderError>;
}

/// Live status of channels on the streaming platform.
#[async_trait]
pub trait StreamStatusProvider: Send + Sync {
    /// Users among `ids` currently live in the target game, queried in
    /// batches of at most `batch_size` ids.
    async fn get_live_users(
        &self,
        ids: &[String],
        batch_size: usize,
    ) -> Result<Vec<LiveUser>, ProviderError>;

    /// Whether `channel` is live and playing the target game right now.
    async fn is_live_playing(&self, channel: &str) -> Result<bool, ProviderError>;
}

#[async_trait]
pub trait BeatmapMetadataProvider: Send + Sync {
    async fn get(&self, id: u64, kind: BeatmapKind) -> Result<BeatmapInfo, ProviderError>;
}

/// In-game private messages to a player.
#[async_trait]
pub trait GameMessageSink: Send + Sync {
    async fn send(&self, target_osu_id: u64, text: &str) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait StatisticsSink: Send + Sync {
    async fn record_request(&self, record: RequestRecord) -> Result<(), ProviderError>;

    /// Usage of an in-game command by a registered player.
    async fn record_command(&self, osu_username: &str, command: &str) -> Result<(), ProviderError>;
}

/// Map an HTTP response status onto the provider error taxonomy.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ProviderError::Unauthorized);
    }
    let url = response.url().path().to_owned();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(url));
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON body, keeping decode failures apart from transport failures.
pub(crate) async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Build the shared HTTP client used by every provider.
pub fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("maprelay/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
