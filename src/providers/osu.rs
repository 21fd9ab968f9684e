//! osu! API v2 client: beatmap metadata and in-game chat delivery.
//!
//! Tokens come from the client credentials grant and are renewed a minute
//! before they expire. Calls are spaced at least [`OsuConfig::min_spacing`]
//! apart.

use super::{BeatmapMetadataProvider, GameMessageSink, check_status, decode};
use crate::beatmap::{BeatmapInfo, BeatmapKind};
use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Renew tokens this long before the server-side expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct OsuConfig {
    pub client_id: String,
    pub client_secret: String,
    /// OAuth scope; `public` for lookups, `delegate chat.write` for chat.
    pub scope: String,
    pub api_base: String,
    pub token_url: String,
    pub min_spacing: Duration,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
    scope: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct Token {
    value: String,
    expires_at: Instant,
}

impl Token {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Deserialize)]
struct ApiBeatmap {
    id: u64,
    version: String,
    bpm: f64,
    hit_length: u64,
    status: String,
    difficulty_rating: f64,
    #[serde(default)]
    beatmapset: Option<ApiBeatmapset>,
}

#[derive(Deserialize)]
struct ApiBeatmapset {
    artist: String,
    title: String,
    #[serde(default)]
    beatmaps: Vec<ApiBeatmap>,
}

fn to_info(map: &ApiBeatmap, set: &ApiBeatmapset) -> BeatmapInfo {
    BeatmapInfo {
        id: map.id,
        artist: set.artist.clone(),
        title: set.title.clone(),
        version: map.version.clone(),
        bpm: map.bpm,
        length: map.hit_length,
        status: map.status.clone(),
        rating: map.difficulty_rating,
    }
}

#[derive(Serialize)]
struct NewChat<'a> {
    target_id: u64,
    message: &'a str,
    is_action: bool,
}

pub struct OsuApi {
    http: reqwest::Client,
    config: OsuConfig,
    retry: RetryPolicy,
    token: RwLock<Option<Token>>,
    auth_lock: tokio::sync::Mutex<()>,
    /// Held across the spacing sleep so calls queue up in order.
    last_call: tokio::sync::Mutex<Option<Instant>>,
}

impl OsuApi {
    pub fn new(http: reqwest::Client, config: OsuConfig, retry: RetryPolicy) -> Self {
        Self {
            http,
            config,
            retry,
            token: RwLock::new(None),
            auth_lock: tokio::sync::Mutex::new(()),
            last_call: tokio::sync::Mutex::new(None),
        }
    }

    async fn refresh_token(&self) -> Result<(), ProviderError> {
        let _guard = self.auth_lock.lock().await;
        if self.cached_token().is_some() {
            debug!(scope = %self.config.scope, "Token already renewed");
            return Ok(());
        }
        let response = self
            .http
            .post(&self.config.token_url)
            .json(&TokenRequest {
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
                grant_type: "client_credentials",
                scope: &self.config.scope,
            })
            .send()
            .await?;
        let token: TokenResponse = decode(check_status(response).await?).await?;
        *self.token.write() = Some(Token {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        info!(scope = %self.config.scope, "Authenticated with osu! API");
        Ok(())
    }

    fn cached_token(&self) -> Option<String> {
        self.token
            .read()
            .as_ref()
            .filter(|t| t.is_fresh())
            .map(|t| t.value.clone())
    }

    /// Drop `rejected` from the cache unless it was already replaced.
    fn invalidate(&self, rejected: &str) {
        let mut token = self.token.write();
        if token.as_ref().is_some_and(|t| t.value == rejected) {
            *token = None;
        }
    }

    async fn bearer(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        self.refresh_token().await?;
        self.cached_token().ok_or(ProviderError::Unauthorized)
    }

    async fn authorized(
        &self,
        token: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        check_status(response).await.inspect_err(|e| {
            if matches!(e, ProviderError::Unauthorized) {
                self.invalidate(token);
            }
        })
    }

    async fn wait_spacing(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(at) = *last {
            let ready = at + self.config.min_spacing;
            if Instant::now() < ready {
                tokio::time::sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let token = self.bearer().await?;
        self.wait_spacing().await;
        debug!(path = %path, "osu! API GET");
        let response = self
            .http
            .get(format!("{}/{}", self.config.api_base, path))
            .bearer_auth(&token)
            .send()
            .await?;
        decode(self.authorized(&token, response).await?).await
    }

    async fn post_chat(&self, target_id: u64, message: &str) -> Result<(), ProviderError> {
        let token = self.bearer().await?;
        self.wait_spacing().await;
        let response = self
            .http
            .post(format!("{}/chat/new", self.config.api_base))
            .bearer_auth(&token)
            .json(&NewChat {
                target_id,
                message,
                is_action: false,
            })
            .send()
            .await?;
        self.authorized(&token, response).await?;
        Ok(())
    }

    async fn lookup(&self, id: u64, kind: BeatmapKind) -> Result<BeatmapInfo, ProviderError> {
        match kind {
            BeatmapKind::Map => {
                let map: ApiBeatmap = self.get_json(&format!("beatmaps/{id}")).await?;
                let set = map
                    .beatmapset
                    .as_ref()
                    .ok_or_else(|| ProviderError::Decode(format!("beatmap {id} has no beatmapset")))?;
                Ok(to_info(&map, set))
            }
            BeatmapKind::Mapset => {
                let set: ApiBeatmapset = self.get_json(&format!("beatmapsets/{id}")).await?;
                let map = set
                    .beatmaps
                    .first()
                    .ok_or_else(|| ProviderError::NotFound(format!("beatmapset {id} has no difficulties")))?;
                Ok(to_info(map, &set))
            }
        }
    }
}

#[async_trait]
impl BeatmapMetadataProvider for OsuApi {
    async fn get(&self, id: u64, kind: BeatmapKind) -> Result<BeatmapInfo, ProviderError> {
        self.retry
            .run("osu_beatmap", move || self.lookup(id, kind), move || self.refresh_token())
            .await
    }
}

#[async_trait]
impl GameMessageSink for OsuApi {
    async fn send(&self, target_osu_id: u64, text: &str) -> Result<(), ProviderError> {
        self.retry
            .run(
                "osu_chat",
                move || self.post_chat(target_osu_id, text),
                move || self.refresh_token(),
            )
            .await
    }
}
