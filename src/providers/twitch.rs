//! Twitch Helix client: live status of registered channels.

use super::{LiveUser, StreamStatusProvider, check_status, decode};
use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

/// Helix caps `user_id` filters and page size at 100.
pub const MAX_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct HelixConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Only streams in this category count as live (osu! is 21465).
    pub game_id: String,
    pub api_base: String,
    pub token_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct StreamsResponse {
    data: Vec<Stream>,
}

#[derive(Deserialize)]
struct Stream {
    user_id: String,
    user_login: String,
    game_id: String,
}

impl From<Stream> for LiveUser {
    fn from(stream: Stream) -> Self {
        LiveUser {
            user_id: stream.user_id,
            user_login: stream.user_login,
            game_id: stream.game_id,
        }
    }
}

/// App-token authenticated Helix client.
pub struct TwitchHelix {
    http: reqwest::Client,
    config: HelixConfig,
    retry: RetryPolicy,
    token: RwLock<Option<String>>,
    auth_lock: tokio::sync::Mutex<()>,
}

impl TwitchHelix {
    pub fn new(http: reqwest::Client, config: HelixConfig, retry: RetryPolicy) -> Self {
        Self {
            http,
            config,
            retry,
            token: RwLock::new(None),
            auth_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Fetch a fresh app access token (client credentials grant).
    async fn refresh_token(&self) -> Result<(), ProviderError> {
        let _guard = self.auth_lock.lock().await;
        if self.token.read().is_some() {
            debug!("App token already renewed");
            return Ok(());
        }
        let response = self
            .http
            .post(&self.config.token_url)
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;
        let token: TokenResponse = decode(check_status(response).await?).await?;
        *self.token.write() = Some(token.access_token);
        info!("Authenticated with Twitch Helix");
        Ok(())
    }

    /// Drop `rejected` from the cache unless it was already replaced.
    fn invalidate(&self, rejected: &str) {
        let mut token = self.token.write();
        if token.as_deref() == Some(rejected) {
            *token = None;
        }
    }

    async fn bearer(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.token.read().clone() {
            return Ok(token);
        }
        self.refresh_token().await?;
        self.token.read().clone().ok_or(ProviderError::Unauthorized)
    }

    async fn streams(&self, filter: &[(&str, &str)]) -> Result<Vec<Stream>, ProviderError> {
        let token = self.bearer().await?;
        let mut query: Vec<(&str, &str)> = vec![("first", "100"), ("game_id", self.config.game_id.as_str())];
        query.extend_from_slice(filter);

        let response = self
            .http
            .get(format!("{}/streams", self.config.api_base))
            .header("Client-ID", &self.config.client_id)
            .bearer_auth(&token)
            .query(&query)
            .send()
            .await?;
        let response = check_status(response).await.inspect_err(|e| {
            if matches!(e, ProviderError::Unauthorized) {
                self.invalidate(&token);
            }
        })?;
        let body: StreamsResponse = decode(response).await?;
        Ok(body.data)
    }

    async fn streams_with_retry(&self, filter: &[(&str, &str)]) -> Result<Vec<Stream>, ProviderError> {
        self.retry
            .run("helix_streams", move || self.streams(filter), move || self.refresh_token())
            .await
    }
}

#[async_trait]
impl StreamStatusProvider for TwitchHelix {
    async fn get_live_users(
        &self,
        ids: &[String],
        batch_size: usize,
    ) -> Result<Vec<LiveUser>, ProviderError> {
        let batch_size = batch_size.clamp(1, MAX_BATCH);
        let mut live = Vec::new();
        for batch in ids.chunks(batch_size) {
            let filter: Vec<(&str, &str)> = batch.iter().map(|id| ("user_id", id.as_str())).collect();
            let streams = self.streams_with_retry(&filter).await?;
            debug!(requested = batch.len(), live = streams.len(), "Helix stream batch");
            live.extend(streams.into_iter().map(LiveUser::from));
        }
        Ok(live)
    }

    async fn is_live_playing(&self, channel: &str) -> Result<bool, ProviderError> {
        let streams = self.streams_with_retry(&[("user_login", channel)]).await?;
        Ok(streams
            .iter()
            .any(|s| s.user_login.eq_ignore_ascii_case(channel) && s.game_id == self.config.game_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{RawQuery, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Json};
    use axum::routing::{get, post};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Fake {
        tokens_issued: AtomicU32,
        reject_first_stream_call: bool,
        stream_calls: AtomicU32,
    }

    async fn token(State(fake): State<Arc<Fake>>) -> Json<serde_json::Value> {
        let n = fake.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Json(json!({ "access_token": format!("token-{n}"), "expires_in": 3600 }))
    }

    async fn streams(
        State(fake): State<Arc<Fake>>,
        headers: HeaderMap,
        RawQuery(query): RawQuery,
    ) -> impl IntoResponse {
        let call = fake.stream_calls.fetch_add(1, Ordering::SeqCst);
        if fake.reject_first_stream_call && call == 0 {
            return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
        }
        assert_eq!(headers.get("client-id").unwrap(), "cid");

        let query = query.unwrap_or_default();
        let ids: Vec<&str> = query
            .split('&')
            .filter_map(|kv| kv.strip_prefix("user_id="))
            .collect();
        assert!(ids.len() <= 2, "batch too large: {query}");
        // Odd ids are live.
        let data: Vec<_> = ids
            .iter()
            .filter(|id| id.parse::<u32>().unwrap_or(0) % 2 == 1)
            .map(|id| json!({ "user_id": id, "user_login": format!("user{id}"), "game_id": "21465" }))
            .chain(
                query
                    .split('&')
                    .filter_map(|kv| kv.strip_prefix("user_login="))
                    .filter(|login| *login == "streamer")
                    .map(|login| json!({ "user_id": "5", "user_login": login, "game_id": "21465" })),
            )
            .collect();
        Json(json!({ "data": data })).into_response()
    }

    async fn start(fake: Arc<Fake>) -> TwitchHelix {
        let app = Router::new()
            .route("/oauth2/token", post(token))
            .route("/helix/streams", get(streams))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TwitchHelix::new(
            super::super::http_client(Duration::from_secs(5)),
            HelixConfig {
                client_id: "cid".into(),
                client_secret: "secret".into(),
                game_id: "21465".into(),
                api_base: format!("http://{addr}/helix"),
                token_url: format!("http://{addr}/oauth2/token"),
            },
            RetryPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_live_users_batched() {
        let fake = Arc::new(Fake::default());
        let helix = start(Arc::clone(&fake)).await;
        let ids: Vec<String> = (1..=5).map(|i| i.to_string()).collect();

        let live = helix.get_live_users(&ids, 2).await.unwrap();
        let mut live_ids: Vec<_> = live.iter().map(|u| u.user_id.as_str()).collect();
        live_ids.sort_unstable();
        assert_eq!(live_ids, vec!["1", "3", "5"]);
        assert_eq!(fake.stream_calls.load(Ordering::SeqCst), 3);
        assert_eq!(fake.tokens_issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_token() {
        let fake = Arc::new(Fake::default());
        let helix = start(Arc::clone(&fake)).await;

        let checks = ["streamer", "other", "streamer"].map(|c| helix.is_live_playing(c));
        let results = futures_util::future::join_all(checks).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(fake.tokens_issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_token() {
        let fake = Arc::new(Fake {
            reject_first_stream_call: true,
            ..Fake::default()
        });
        let helix = start(Arc::clone(&fake)).await;

        assert!(helix.is_live_playing("streamer").await.unwrap());
        assert!(!helix.is_live_playing("someone_else").await.unwrap());
        assert_eq!(fake.tokens_issued.load(Ordering::SeqCst), 2);
    }
}
