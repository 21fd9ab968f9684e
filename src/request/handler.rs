//! From chat message to dispatched request.

use super::admission::{AdmissionDecision, AdmissionPipeline};
use super::dispatch::RequestDispatcher;
use crate::beatmap::parse_message;
use crate::chat::{ChatMessage, ChatSink};
use crate::error::RejectReason;
use crate::providers::{BeatmapMetadataProvider, UserDirectory};
use crate::telemetry::{RequestTimer, spans};
use std::sync::Arc;
use tracing::{Instrument, debug, info, warn};

/// What happened to one chat message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// Not a request for us: no link, unknown channel, own message, lookup failure.
    Ignored,
    Rejected(RejectReason),
    /// Forwarded; individual dispatch action failures are logged, not returned.
    Dispatched,
}

impl HandleOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Rejected(_) => "rejected",
            Self::Dispatched => "dispatched",
        }
    }
}

pub struct RequestHandler {
    bot_nick: String,
    /// Drop every message (staging deployments sharing production chat).
    testing: bool,
    directory: Arc<dyn UserDirectory>,
    metadata: Arc<dyn BeatmapMetadataProvider>,
    chat: Arc<dyn ChatSink>,
    admission: AdmissionPipeline,
    dispatcher: RequestDispatcher,
}

impl RequestHandler {
    pub fn new(
        bot_nick: &str,
        testing: bool,
        directory: Arc<dyn UserDirectory>,
        metadata: Arc<dyn BeatmapMetadataProvider>,
        chat: Arc<dyn ChatSink>,
        admission: AdmissionPipeline,
        dispatcher: RequestDispatcher,
    ) -> Self {
        Self {
            bot_nick: bot_nick.to_lowercase(),
            testing,
            directory,
            metadata,
            chat,
            admission,
            dispatcher,
        }
    }

    pub async fn handle(&self, message: &ChatMessage) -> HandleOutcome {
        let span = spans::request(&message.channel, &message.author);
        let outcome = self.evaluate(message).instrument(span).await;
        crate::metrics::record_request(outcome.label());
        outcome
    }

    async fn evaluate(&self, message: &ChatMessage) -> HandleOutcome {
        if self.testing || message.author == self.bot_nick {
            return HandleOutcome::Ignored;
        }

        let settings = match self.directory.settings_for(&message.channel).await {
            Ok(Some(settings)) => settings,
            Ok(None) => return HandleOutcome::Ignored,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Settings lookup failed");
                return HandleOutcome::Ignored;
            }
        };

        if !settings.enabled {
            return reject(RejectReason::NotEnabled);
        }

        let Some(reference) = parse_message(&message.text) else {
            return HandleOutcome::Ignored;
        };
        debug!(id = reference.id, kind = %reference.kind, mods = %reference.mods, "Found beatmap reference");

        let _timer = RequestTimer::start();
        let beatmap = match self.metadata.get(reference.id, reference.kind).await {
            Ok(beatmap) => beatmap,
            Err(e) => {
                warn!(id = reference.id, error = %e, code = e.error_code(), "Beatmap lookup failed");
                return HandleOutcome::Ignored;
            }
        };

        match self.admission.evaluate(message, &settings, &beatmap).await {
            AdmissionDecision::Accept => {}
            AdmissionDecision::Reject(reason) => {
                if let Some(reply) = reason.chat_reply(&message.author)
                    && let Err(e) = self.chat.send(&message.channel, &reply).await
                {
                    warn!(error = %e, "Failed to post rejection to chat");
                }
                return reject(reason);
            }
        }

        if let Err(e) = self
            .dispatcher
            .dispatch(message, &settings, &beatmap, &reference.mods)
            .await
        {
            warn!(error = %e, "Request dispatched with failures");
        }
        info!(beatmap = beatmap.id, mods = %reference.mods, "Request forwarded");
        HandleOutcome::Dispatched
    }
}

fn reject(reason: RejectReason) -> HandleOutcome {
    info!(reason = reason.error_code(), detail = %reason, "Request rejected");
    crate::metrics::record_rejection(reason.error_code());
    HandleOutcome::Rejected(reason)
}
