//! Periodic discovery of registered users who are live in the target game.

use super::transport::{PushClient, TransportError};
use crate::error::ProviderError;
use crate::providers::{StreamStatusProvider, UserDirectory};
use crate::telemetry::spans;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("failed to push desired set: {0}")]
    Push(#[from] TransportError),
}

#[derive(Debug, Clone, Copy)]
pub struct FleetConfig {
    pub period: Duration,
    /// Ids per live-status query.
    pub batch_size: usize,
}

pub struct FleetController {
    directory: Arc<dyn UserDirectory>,
    streams: Arc<dyn StreamStatusProvider>,
    config: FleetConfig,
}

impl FleetController {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        streams: Arc<dyn StreamStatusProvider>,
        config: FleetConfig,
    ) -> Self {
        Self {
            directory,
            streams,
            config,
        }
    }

    /// One poll: refresh every enabled user's live flag and return the
    /// channels that should be joined.
    ///
    /// Channel names come from the live-stream response, so a streamer who
    /// renamed is joined under the new login and the stored login follows.
    pub async fn tick(&self) -> Result<BTreeSet<String>, ProviderError> {
        let users = self.directory.get_enabled_users().await?;
        let ids: Vec<String> = users.iter().map(|u| u.twitch_id.clone()).collect();
        let live: HashMap<String, String> = self
            .streams
            .get_live_users(&ids, self.config.batch_size)
            .await?
            .into_iter()
            .map(|u| (u.user_id, u.user_login.to_lowercase()))
            .collect();

        let mut desired = BTreeSet::new();
        for user in &users {
            let stored = user.twitch_username.to_lowercase();
            let login = live
                .get(&user.twitch_id)
                .map(|login| if login.is_empty() { &stored } else { login });
            let is_live = login.is_some();
            if is_live != user.is_live {
                debug!(channel = %stored, is_live, "Live status changed");
                if let Err(e) = self.directory.set_live(&user.twitch_id, is_live).await {
                    warn!(channel = %stored, error = %e, "Failed to store live status");
                }
            }
            let Some(login) = login else { continue };
            if *login != stored {
                info!(old = %stored, new = %login, "Channel renamed");
                if let Err(e) = self.directory.rename(&user.twitch_id, login).await {
                    warn!(channel = %login, error = %e, "Failed to store renamed channel");
                }
            }
            desired.insert(login.clone());
        }

        crate::metrics::set_live_users(desired.len());
        info!(enabled = users.len(), live = desired.len(), "Fleet poll complete");
        Ok(desired)
    }

    /// Poll forever, pushing each result over `client`.
    ///
    /// A failed poll re-sends the previous set so the receiver keeps seeing
    /// traffic. A failed push ends the loop with an error.
    pub async fn run(&self, mut client: PushClient) -> Result<(), FleetError> {
        let mut interval = tokio::time::interval(self.config.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<BTreeSet<String>> = None;
        let mut tick_no: u64 = 0;

        loop {
            interval.tick().await;
            tick_no += 1;

            let desired = match self.tick().instrument(spans::fleet_tick(tick_no)).await {
                Ok(desired) => desired,
                Err(e) => {
                    warn!(error = %e, code = e.error_code(), "Fleet poll failed");
                    match &last {
                        Some(previous) => previous.clone(),
                        None => continue,
                    }
                }
            };

            if let Err(e) = client.push(&desired).await {
                error!(error = %e, code = e.error_code(), "Desired set push failed");
                return Err(e.into());
            }
            last = Some(desired);
        }
    }
}
