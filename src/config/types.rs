//! Core configuration types and loading.

use super::defaults::*;
use super::validation::{ValidationError, validate};
use crate::chat::SendQuota;
use crate::fleet::FleetConfig;
use crate::membership::MembershipConfig;
use crate::providers::osu::OsuConfig;
use crate::providers::twitch::HelixConfig;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    #[serde(default)]
    pub twitch: TwitchConfig,
    #[serde(default)]
    pub osu: OsuSection,
    /// In-game command connection; commands are unavailable when absent.
    pub bancho: Option<BanchoConfig>,
    #[serde(default)]
    pub membership: MembershipSection,
    #[serde(default)]
    pub fleet: FleetSection,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Config {
    /// Load configuration from a TOML file, apply environment overrides and
    /// validate the result.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Replace secrets with values from `lookup` (the process environment
    /// in production). Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("TWITCH_TMI_TOKEN") {
            self.twitch.token = v;
        }
        if let Some(v) = get("TWITCH_CLIENT_ID") {
            self.twitch.client_id = v;
        }
        if let Some(v) = get("TWITCH_CLIENT_SECRET") {
            self.twitch.client_secret = v;
        }
        if let Some(v) = get("OSU_CLIENT_ID") {
            self.osu.client_id = v;
        }
        if let Some(v) = get("OSU_CLIENT_SECRET") {
            self.osu.client_secret = v;
        }
        if let Some(bancho) = self.bancho.as_mut()
            && let Some(v) = get("BANCHO_PASSWORD")
        {
            bancho.password = v;
        }
    }
}

/// Bot identity.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Twitch login of the bot account.
    pub nick: String,
    /// Drop every chat message and in-game command (staging deployments).
    #[serde(default)]
    pub testing: bool,
    /// Where unregistered streamers are sent by in-game commands.
    #[serde(default = "default_registration_url")]
    pub registration_url: String,
}

/// Twitch chat and Helix settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitchConfig {
    #[serde(default = "default_twitch_address")]
    pub address: String,
    #[serde(default = "default_true")]
    pub tls: bool,
    /// Chat OAuth token (`oauth:` prefix optional).
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_game_id")]
    pub game_id: String,
    #[serde(default = "default_helix_base")]
    pub api_base: String,
    #[serde(default = "default_twitch_token_url")]
    pub token_url: String,
    #[serde(default = "default_send_burst")]
    pub send_burst: u32,
    #[serde(default = "default_send_replenish_ms")]
    pub send_replenish_ms: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            address: default_twitch_address(),
            tls: true,
            token: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            game_id: default_game_id(),
            api_base: default_helix_base(),
            token_url: default_twitch_token_url(),
            send_burst: default_send_burst(),
            send_replenish_ms: default_send_replenish_ms(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl TwitchConfig {
    /// `PASS` argument for the chat login.
    pub fn irc_password(&self) -> String {
        if self.token.starts_with("oauth:") {
            self.token.clone()
        } else {
            format!("oauth:{}", self.token)
        }
    }

    pub fn send_quota(&self) -> SendQuota {
        SendQuota {
            burst: self.send_burst,
            replenish: Duration::from_millis(self.send_replenish_ms),
        }
    }

    pub fn helix(&self) -> HelixConfig {
        HelixConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            game_id: self.game_id.clone(),
            api_base: self.api_base.clone(),
            token_url: self.token_url.clone(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// osu! API v2 credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct OsuSection {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_osu_api_base")]
    pub api_base: String,
    #[serde(default = "default_osu_token_url")]
    pub token_url: String,
    /// Minimum gap between two API calls of one client.
    #[serde(default = "default_osu_min_spacing_ms")]
    pub min_spacing_ms: u64,
}

impl Default for OsuSection {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_base: default_osu_api_base(),
            token_url: default_osu_token_url(),
            min_spacing_ms: default_osu_min_spacing_ms(),
        }
    }
}

impl OsuSection {
    /// Client settings for the given OAuth scope.
    pub fn client(&self, scope: &str) -> OsuConfig {
        OsuConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scope: scope.to_string(),
            api_base: self.api_base.clone(),
            token_url: self.token_url.clone(),
            min_spacing: Duration::from_millis(self.min_spacing_ms),
        }
    }
}

/// osu! Bancho IRC login used for in-game commands.
#[derive(Debug, Clone, Deserialize)]
pub struct BanchoConfig {
    #[serde(default = "default_bancho_address")]
    pub address: String,
    #[serde(default)]
    pub tls: bool,
    pub nick: String,
    /// IRC password from the osu! account settings page.
    #[serde(default)]
    pub password: String,
}

/// Join throttle of the chat platform.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MembershipSection {
    /// Joins allowed per window (K).
    #[serde(default = "default_join_limit")]
    pub join_limit: usize,
    /// Window length in seconds (W).
    #[serde(default = "default_join_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
}

impl Default for MembershipSection {
    fn default() -> Self {
        Self {
            join_limit: default_join_limit(),
            window_secs: default_join_window_secs(),
            join_timeout_secs: default_join_timeout_secs(),
        }
    }
}

impl MembershipSection {
    pub fn controller(&self) -> MembershipConfig {
        MembershipConfig {
            join_limit: self.join_limit,
            window: Duration::from_secs(self.window_secs),
            join_timeout: Duration::from_secs(self.join_timeout_secs),
        }
    }
}

/// Live-status polling and the local desired-set transport.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetSection {
    /// Run the poller in this process. The receiver always runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_fleet_period_secs")]
    pub period_secs: u64,
    /// Extra silence tolerated by the receiver beyond one period.
    #[serde(default = "default_fleet_grace_secs")]
    pub grace_secs: u64,
    #[serde(default = "default_fleet_batch_size")]
    pub batch_size: usize,
    /// Local address of the desired-set transport.
    #[serde(default = "default_fleet_address")]
    pub address: String,
}

impl Default for FleetSection {
    fn default() -> Self {
        Self {
            enabled: true,
            period_secs: default_fleet_period_secs(),
            grace_secs: default_fleet_grace_secs(),
            batch_size: default_fleet_batch_size(),
            address: default_fleet_address(),
        }
    }
}

impl FleetSection {
    pub fn controller(&self) -> FleetConfig {
        FleetConfig {
            period: Duration::from_secs(self.period_secs),
            batch_size: self.batch_size,
        }
    }

    /// How long the receiver waits for the next push before giving up.
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.period_secs + self.grace_secs)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Log output.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `text` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Prometheus exporter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Serve `/metrics` on this port when set.
    pub port: Option<u16>,
}
