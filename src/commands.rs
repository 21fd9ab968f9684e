//! In-game `!commands` sent to the bot over osu! private messages.
//!
//! Streamers change their channel settings by messaging the bot in game.
//! Parsing produces a [`GameCommand`]; [`CommandExecutor`] applies it to the
//! settings store and returns the reply text.

use crate::chat::{ChatEvent, IrcClient};
use crate::error::ProviderError;
use crate::providers::{SettingsStore, StatisticsSink};
use crate::settings::{ChannelSettings, StarRange};
use crate::telemetry::spans;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    Enable,
    Disable,
    /// Toggle the chat acknowledgement (alias `feedback`).
    Echo,
    SubOnly,
    PointsOnly,
    Test,
    /// Cooldown in seconds.
    Cooldown(f64),
    /// `!setsr 3.5-7.5`, or `!setsr off` to clear.
    SetStarRange(StarRange),
    Help,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Sorry, I couldn't understand what {0} means")]
    Unknown(String),

    #[error("Invalid input.. For example, use: !setsr 3.5-7.5 (or !setsr off)")]
    BadStarRange,

    #[error("Max value cannot be lower than min value.")]
    InvertedStarRange,

    #[error("Invalid input.. For example, use: !cooldown 30")]
    BadCooldown,
}

impl GameCommand {
    /// Parse a private message. Returns `None` unless it starts with `!`.
    pub fn parse(text: &str) -> Option<Result<Self, CommandError>> {
        let body = text.trim().strip_prefix('!')?.to_lowercase();
        let mut words = body.split_whitespace();
        let name = words.next().unwrap_or_default().to_owned();
        let args: Vec<&str> = words.collect();

        let command = match name.as_str() {
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            "echo" | "feedback" => Ok(Self::Echo),
            "subonly" | "sub-only" => Ok(Self::SubOnly),
            "pointsonly" | "cp-only" => Ok(Self::PointsOnly),
            "test" => Ok(Self::Test),
            "cooldown" => parse_cooldown(&args).map(Self::Cooldown),
            "setsr" | "sr" => parse_star_range(&args.join("")).map(Self::SetStarRange),
            "help" => Ok(Self::Help),
            _ => Err(CommandError::Unknown(name)),
        };
        Some(command)
    }

    /// Name recorded in command statistics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Echo => "echo",
            Self::SubOnly => "sub_only",
            Self::PointsOnly => "points_only",
            Self::Test => "test",
            Self::Cooldown(_) => "cooldown",
            Self::SetStarRange(_) => "sr_rating",
            Self::Help => "help",
        }
    }
}

fn parse_cooldown(args: &[&str]) -> Result<f64, CommandError> {
    match args {
        [value] => value
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .ok_or(CommandError::BadCooldown),
        _ => Err(CommandError::BadCooldown),
    }
}

fn parse_star_range(arg: &str) -> Result<StarRange, CommandError> {
    if arg == "off" {
        return Ok(StarRange::UNSET);
    }
    let (low, high) = arg.split_once('-').ok_or(CommandError::BadStarRange)?;
    let low: f64 = low.parse().map_err(|_| CommandError::BadStarRange)?;
    let high: f64 = high.parse().map_err(|_| CommandError::BadStarRange)?;
    if !low.is_finite() || !high.is_finite() || low < 0.0 {
        return Err(CommandError::BadStarRange);
    }
    if high <= low {
        return Err(CommandError::InvertedStarRange);
    }
    Ok(StarRange::new(low, high))
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

const HELP_TEXT: &str = "Send a beatmap link in your Twitch chat and I'll forward it here. \
Commands: !enable, !disable, !echo, !subonly, !pointsonly, !test, !cooldown <seconds>, !setsr <low>-<high> | off";

const STORE_FAILURE: &str = "Something went wrong while saving your settings, please try again later.";

pub struct CommandExecutor {
    store: Arc<dyn SettingsStore>,
    statistics: Arc<dyn StatisticsSink>,
    registration_url: String,
}

impl CommandExecutor {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        statistics: Arc<dyn StatisticsSink>,
        registration_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            statistics,
            registration_url: registration_url.into(),
        }
    }

    /// Handle a private message from `osu_username`.
    ///
    /// Returns the reply, or `None` when the message is not a command.
    pub async fn execute(&self, osu_username: &str, text: &str) -> Option<String> {
        let parsed = GameCommand::parse(text)?;

        let user = match self.store.user_by_osu_username(osu_username).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return Some(format!(
                    "Please register your osu! account first: {}",
                    self.registration_url
                ));
            }
            Err(e) => {
                warn!(error = %e, "User lookup failed");
                return Some(STORE_FAILURE.to_owned());
            }
        };

        let command = match parsed {
            Ok(command) => command,
            Err(e) => return Some(e.to_string()),
        };

        let span = spans::command(command.name(), osu_username);
        let reply = self.apply(user.settings, &command).instrument(span).await;
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Failed to apply command");
                return Some(STORE_FAILURE.to_owned());
            }
        };

        crate::metrics::record_command(command.name());
        if let Err(e) = self
            .statistics
            .record_command(osu_username, command.name())
            .await
        {
            warn!(error = %e, "Failed to record command usage");
        }
        Some(reply)
    }

    async fn apply(
        &self,
        mut settings: ChannelSettings,
        command: &GameCommand,
    ) -> Result<String, ProviderError> {
        let reply = match command {
            GameCommand::Help => return Ok(HELP_TEXT.to_owned()),
            GameCommand::Enable => {
                settings.enabled = true;
                "I've enabled requests. Have fun!".to_owned()
            }
            GameCommand::Disable => {
                settings.enabled = false;
                "I've disabled requests for now. If you want to re-enable requests, type !enable anytime.".to_owned()
            }
            GameCommand::Echo => {
                settings.echo_enabled = !settings.echo_enabled;
                if settings.echo_enabled {
                    "I've enabled the beatmap request information feedback on your twitch chat!".to_owned()
                } else {
                    "I've disabled the beatmap request information feedback on your channel.".to_owned()
                }
            }
            GameCommand::SubOnly => {
                settings.sub_only = !settings.sub_only;
                format!("Subscriber only request mode is now {}.", on_off(settings.sub_only))
            }
            GameCommand::PointsOnly => {
                settings.points_only = !settings.points_only;
                format!("Channel points only request mode is now {}.", on_off(settings.points_only))
            }
            GameCommand::Test => {
                settings.test_mode = !settings.test_mode;
                format!("Test mode is now {}.", on_off(settings.test_mode))
            }
            GameCommand::Cooldown(secs) => {
                settings.cooldown_secs = *secs;
                format!("Request cooldown set to {secs} seconds.")
            }
            GameCommand::SetStarRange(range) => {
                settings.star_range = *range;
                if range.is_unset() {
                    "Removed the star rating range.".to_owned()
                } else {
                    format!(
                        "Changed star rating range between: {:.1} - {:.1}",
                        range.low, range.high
                    )
                }
            }
        };

        self.store.save_settings(&settings).await?;
        info!(channel = %settings.channel, command = command.name(), "Settings updated");
        Ok(reply)
    }
}

/// Answer commands arriving as private messages on the Bancho connection.
///
/// Runs until the event channel closes. `testing` drops every message.
pub async fn serve_private_messages(
    executor: Arc<CommandExecutor>,
    client: IrcClient,
    mut events: mpsc::Receiver<ChatEvent>,
    testing: bool,
) {
    while let Some(event) = events.recv().await {
        let line = match event {
            ChatEvent::Line(line) => line,
            ChatEvent::Connected => {
                info!(nick = %client.nick(), "Connected to osu! Bancho");
                continue;
            }
            ChatEvent::Disconnected => continue,
        };
        if testing || line.command != "PRIVMSG" {
            continue;
        }
        let to_us = line
            .param(0)
            .is_some_and(|target| target.eq_ignore_ascii_case(client.nick()));
        let (Some(sender), Some(text)) = (line.nick(), line.trailing()) else {
            continue;
        };
        if !to_us {
            continue;
        }

        debug!(sender = %sender, text = %text, "Private message");
        let Some(reply) = executor.execute(&sender.to_lowercase(), text).await else {
            continue;
        };
        if let Err(e) = client.send_private(sender, &reply).await {
            warn!(sender = %sender, error = %e, "Failed to reply to command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{RequestRecord, User};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[test]
    fn test_parse_commands() {
        assert_eq!(GameCommand::parse("!enable"), Some(Ok(GameCommand::Enable)));
        assert_eq!(GameCommand::parse("!DISABLE"), Some(Ok(GameCommand::Disable)));
        assert_eq!(GameCommand::parse("!feedback"), Some(Ok(GameCommand::Echo)));
        assert_eq!(GameCommand::parse("!cooldown 45"), Some(Ok(GameCommand::Cooldown(45.0))));
        assert_eq!(
            GameCommand::parse("!setsr 3.5-7.5"),
            Some(Ok(GameCommand::SetStarRange(StarRange::new(3.5, 7.5))))
        );
        assert_eq!(
            GameCommand::parse("!setsr 3.5 - 7.5"),
            Some(Ok(GameCommand::SetStarRange(StarRange::new(3.5, 7.5))))
        );
        assert_eq!(
            GameCommand::parse("!setsr off"),
            Some(Ok(GameCommand::SetStarRange(StarRange::UNSET)))
        );
        assert_eq!(GameCommand::parse("hello there"), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            GameCommand::parse("!dance"),
            Some(Err(CommandError::Unknown("dance".into())))
        );
        assert_eq!(GameCommand::parse("!setsr 7-3"), Some(Err(CommandError::InvertedStarRange)));
        assert_eq!(GameCommand::parse("!setsr abc"), Some(Err(CommandError::BadStarRange)));
        assert_eq!(GameCommand::parse("!cooldown -5"), Some(Err(CommandError::BadCooldown)));
        assert_eq!(GameCommand::parse("!cooldown"), Some(Err(CommandError::BadCooldown)));
        assert_eq!(
            CommandError::Unknown("dance".into()).to_string(),
            "Sorry, I couldn't understand what dance means"
        );
    }

    #[derive(Default)]
    struct Store {
        users: Mutex<Vec<User>>,
        commands: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SettingsStore for Store {
        async fn user_by_osu_username(&self, osu_username: &str) -> Result<Option<User>, ProviderError> {
            Ok(self.users.lock().iter().find(|u| u.osu_username == osu_username).cloned())
        }

        async fn save_settings(&self, settings: &ChannelSettings) -> Result<(), ProviderError> {
            for user in self.users.lock().iter_mut() {
                if user.settings.channel == settings.channel {
                    user.settings = settings.clone();
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StatisticsSink for Store {
        async fn record_request(&self, _: RequestRecord) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn record_command(&self, osu_username: &str, command: &str) -> Result<(), ProviderError> {
            self.commands.lock().push((osu_username.into(), command.into()));
            Ok(())
        }
    }

    fn executor() -> (Arc<Store>, CommandExecutor) {
        let store = Arc::new(Store::default());
        store.users.lock().push(User {
            twitch_id: "1".into(),
            twitch_username: "streamer".into(),
            osu_id: 2,
            osu_username: "player".into(),
            is_live: false,
            settings: ChannelSettings::new("streamer", 2),
        });
        let executor = CommandExecutor::new(store.clone(), store.clone(), "https://example.invalid/");
        (store, executor)
    }

    #[tokio::test]
    async fn test_toggle_echo_and_record() {
        let (store, executor) = executor();
        let reply = executor.execute("player", "!echo").await.unwrap();
        assert!(reply.starts_with("I've disabled"));
        assert!(!store.users.lock()[0].settings.echo_enabled);

        let reply = executor.execute("player", "!echo").await.unwrap();
        assert!(reply.starts_with("I've enabled"));
        assert_eq!(store.commands.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_set_star_range() {
        let (store, executor) = executor();
        let reply = executor.execute("player", "!setsr 3-6.5").await.unwrap();
        assert_eq!(reply, "Changed star rating range between: 3.0 - 6.5");
        assert_eq!(store.users.lock()[0].settings.star_range, StarRange::new(3.0, 6.5));

        executor.execute("player", "!setsr off").await.unwrap();
        assert!(store.users.lock()[0].settings.star_range.is_unset());
    }

    #[tokio::test]
    async fn test_unregistered_and_unknown() {
        let (store, executor) = executor();
        let reply = executor.execute("stranger", "!enable").await.unwrap();
        assert!(reply.contains("register"));

        let reply = executor.execute("player", "!dance").await.unwrap();
        assert_eq!(reply, "Sorry, I couldn't understand what dance means");
        assert!(store.commands.lock().is_empty());

        assert!(executor.execute("player", "just chatting").await.is_none());
    }

    #[tokio::test]
    async fn test_disable_then_enable() {
        let (store, executor) = executor();
        executor.execute("player", "!disable").await.unwrap();
        assert!(!store.users.lock()[0].settings.enabled);
        executor.execute("player", "!enable").await.unwrap();
        assert!(store.users.lock()[0].settings.enabled);
        executor.execute("player", "!cooldown 10").await.unwrap();
        assert_eq!(store.users.lock()[0].settings.cooldown_secs, 10.0);
    }
}
