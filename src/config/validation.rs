//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use crate::providers::twitch::MAX_BATCH;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bot.nick is required")]
    MissingNick,
    #[error("twitch.token is required (or set TWITCH_TMI_TOKEN)")]
    MissingChatToken,
    #[error("twitch.client_id and twitch.client_secret are required (or set TWITCH_CLIENT_ID / TWITCH_CLIENT_SECRET)")]
    MissingHelixCredentials,
    #[error("osu.client_id and osu.client_secret are required (or set OSU_CLIENT_ID / OSU_CLIENT_SECRET)")]
    MissingOsuCredentials,
    #[error("bancho.nick and bancho.password are required when [bancho] is present")]
    IncompleteBancho,
    #[error("membership.{0} must be at least 1")]
    ZeroMembershipValue(&'static str),
    #[error("fleet.period_secs must be at least 1")]
    ZeroFleetPeriod,
    #[error("fleet.batch_size must be between 1 and 100, got {0}")]
    InvalidBatchSize(usize),
    #[error("log.format must be 'text' or 'json', got '{0}'")]
    InvalidLogFormat(String),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.bot.nick.trim().is_empty() {
        errors.push(ValidationError::MissingNick);
    }
    if config.twitch.token.trim().is_empty() {
        errors.push(ValidationError::MissingChatToken);
    }
    if config.twitch.client_id.is_empty() || config.twitch.client_secret.is_empty() {
        errors.push(ValidationError::MissingHelixCredentials);
    }
    if config.osu.client_id.is_empty() || config.osu.client_secret.is_empty() {
        errors.push(ValidationError::MissingOsuCredentials);
    }
    if let Some(ref bancho) = config.bancho
        && (bancho.nick.trim().is_empty() || bancho.password.is_empty())
    {
        errors.push(ValidationError::IncompleteBancho);
    }

    let membership = &config.membership;
    if membership.join_limit == 0 {
        errors.push(ValidationError::ZeroMembershipValue("join_limit"));
    }
    if membership.window_secs == 0 {
        errors.push(ValidationError::ZeroMembershipValue("window_secs"));
    }
    if membership.join_timeout_secs == 0 {
        errors.push(ValidationError::ZeroMembershipValue("join_timeout_secs"));
    }

    if config.fleet.period_secs == 0 {
        errors.push(ValidationError::ZeroFleetPeriod);
    }
    if !(1..=MAX_BATCH).contains(&config.fleet.batch_size) {
        errors.push(ValidationError::InvalidBatchSize(config.fleet.batch_size));
    }

    let format = config.log.format.to_ascii_lowercase();
    if format != "text" && format != "json" {
        errors.push(ValidationError::InvalidLogFormat(config.log.format.clone()));
    }

    let db_path = Path::new(&config.database.path);
    if config.database.path != ":memory:"
        && let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::DatabasePathInvalid(config.database.path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
