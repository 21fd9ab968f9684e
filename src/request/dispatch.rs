//! Fan-out of accepted requests.

use super::format::{echo_line, in_game_line};
use crate::beatmap::BeatmapInfo;
use crate::chat::{ChatMessage, ChatSink};
use crate::error::{ActionError, DispatchError};
use crate::providers::{GameMessageSink, RequestRecord, StatisticsSink};
use crate::settings::ChannelSettings;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sends an accepted request to the chat, the player and the statistics store.
pub struct RequestDispatcher {
    chat: Arc<dyn ChatSink>,
    game: Arc<dyn GameMessageSink>,
    statistics: Arc<dyn StatisticsSink>,
}

impl RequestDispatcher {
    pub fn new(
        chat: Arc<dyn ChatSink>,
        game: Arc<dyn GameMessageSink>,
        statistics: Arc<dyn StatisticsSink>,
    ) -> Self {
        Self {
            chat,
            game,
            statistics,
        }
    }

    /// Run all three actions to completion, then report every failure.
    pub async fn dispatch(
        &self,
        message: &ChatMessage,
        settings: &ChannelSettings,
        beatmap: &BeatmapInfo,
        mods: &str,
    ) -> Result<(), DispatchError> {
        let echo = async {
            if !settings.echo_enabled {
                return Ok(());
            }
            self.chat
                .send(&message.channel, &echo_line(beatmap))
                .await
                .map_err(ActionError::Echo)
        };

        let in_game = async {
            let line = in_game_line(message, beatmap, mods);
            debug!(target_osu_id = settings.osu_id, line = %line, "Sending in-game request");
            self.game
                .send(settings.osu_id, &line)
                .await
                .map_err(ActionError::InGame)
        };

        let record = async {
            self.statistics
                .record_request(RequestRecord {
                    requester: message.author.clone(),
                    channel: message.channel.clone(),
                    beatmap_id: beatmap.id,
                    mods: mods.to_owned(),
                    requested_at: Utc::now(),
                })
                .await
                .map_err(ActionError::Statistics)
        };

        let (echo, in_game, record) = tokio::join!(echo, in_game, record);
        let failures: Vec<ActionError> = [echo, in_game, record]
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            warn!(channel = %message.channel, error = %failure, "Dispatch action failed");
        }
        Err(DispatchError { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChatError, ProviderError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct Recorder {
        chat: Mutex<Vec<(String, String)>>,
        game: Mutex<Vec<(u64, String)>>,
        records: Mutex<Vec<RequestRecord>>,
        fail_game: bool,
    }

    #[async_trait]
    impl ChatSink for Recorder {
        async fn send(&self, channel: &str, text: &str) -> Result<(), ChatError> {
            self.chat.lock().push((channel.into(), text.into()));
            Ok(())
        }
    }

    #[async_trait]
    impl GameMessageSink for Recorder {
        async fn send(&self, target: u64, text: &str) -> Result<(), ProviderError> {
            if self.fail_game {
                return Err(ProviderError::Status { status: 500, body: "down".into() });
            }
            self.game.lock().push((target, text.into()));
            Ok(())
        }
    }

    #[async_trait]
    impl StatisticsSink for Recorder {
        async fn record_request(&self, record: RequestRecord) -> Result<(), ProviderError> {
            self.records.lock().push(record);
            Ok(())
        }

        async fn record_command(&self, _: &str, _: &str) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn dispatcher(recorder: &Arc<Recorder>) -> RequestDispatcher {
        RequestDispatcher::new(recorder.clone(), recorder.clone(), recorder.clone())
    }

    fn message() -> ChatMessage {
        ChatMessage {
            channel: "streamer".into(),
            author: "viewer".into(),
            author_id: "42".into(),
            text: String::new(),
            is_mod: false,
            is_subscriber: true,
            is_vip: false,
            tags: BTreeSet::new(),
        }
    }

    fn beatmap() -> BeatmapInfo {
        BeatmapInfo {
            id: 7,
            artist: "A".into(),
            title: "T".into(),
            version: "V".into(),
            bpm: 200.0,
            length: 61,
            status: "loved".into(),
            rating: 6.0,
        }
    }

    #[tokio::test]
    async fn test_all_actions_run() {
        let recorder = Arc::new(Recorder::default());
        let settings = ChannelSettings::new("streamer", 99);
        dispatcher(&recorder)
            .dispatch(&message(), &settings, &beatmap(), "+DT")
            .await
            .unwrap();

        assert_eq!(
            *recorder.chat.lock(),
            vec![("streamer".to_string(), "A - T [V] - Request sent!".to_string())]
        );
        let game = recorder.game.lock();
        assert_eq!(game[0].0, 99);
        assert!(game[0].1.starts_with("[SUB] viewer -> [Loved]"));
        assert!(game[0].1.ends_with("+DT"));
        let records = recorder.records.lock();
        assert_eq!(records[0].beatmap_id, 7);
        assert_eq!(records[0].mods, "+DT");
        assert_eq!(records[0].requester, "viewer");
    }

    #[tokio::test]
    async fn test_echo_disabled() {
        let recorder = Arc::new(Recorder::default());
        let mut settings = ChannelSettings::new("streamer", 99);
        settings.echo_enabled = false;
        dispatcher(&recorder)
            .dispatch(&message(), &settings, &beatmap(), "")
            .await
            .unwrap();
        assert!(recorder.chat.lock().is_empty());
        assert_eq!(recorder.game.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_others() {
        let recorder = Arc::new(Recorder {
            fail_game: true,
            ..Recorder::default()
        });
        let settings = ChannelSettings::new("streamer", 99);
        let err = dispatcher(&recorder)
            .dispatch(&message(), &settings, &beatmap(), "")
            .await
            .unwrap_err();

        assert_eq!(err.failures.len(), 1);
        assert!(matches!(err.failures[0], ActionError::InGame(_)));
        assert_eq!(recorder.chat.lock().len(), 1);
        assert_eq!(recorder.records.lock().len(), 1);
    }
}
