//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Bot Defaults
// =============================================================================

pub fn default_registration_url() -> String {
    "https://ronnia.me/".to_string()
}

// =============================================================================
// Twitch Defaults
// =============================================================================

pub fn default_twitch_address() -> String {
    "irc.chat.twitch.tv:6697".to_string()
}

/// Helix category id of osu!.
pub fn default_game_id() -> String {
    "21465".to_string()
}

pub fn default_helix_base() -> String {
    "https://api.twitch.tv/helix".to_string()
}

pub fn default_twitch_token_url() -> String {
    "https://id.twitch.tv/oauth2/token".to_string()
}

/// Messages a channel may receive back to back.
pub fn default_send_burst() -> u32 {
    20
}

/// Milliseconds to earn back one outbound message.
pub fn default_send_replenish_ms() -> u64 {
    1_500
}

// =============================================================================
// osu! Defaults
// =============================================================================

pub fn default_osu_api_base() -> String {
    "https://osu.ppy.sh/api/v2".to_string()
}

pub fn default_osu_token_url() -> String {
    "https://osu.ppy.sh/oauth/token".to_string()
}

pub fn default_osu_min_spacing_ms() -> u64 {
    1_000
}

pub fn default_bancho_address() -> String {
    "irc.ppy.sh:6667".to_string()
}

// =============================================================================
// Membership Defaults (Twitch's standard join throttle)
// =============================================================================

pub fn default_join_limit() -> usize {
    20
}

pub fn default_join_window_secs() -> u64 {
    10
}

pub fn default_join_timeout_secs() -> u64 {
    60
}

// =============================================================================
// Fleet Defaults
// =============================================================================

pub fn default_fleet_period_secs() -> u64 {
    60
}

pub fn default_fleet_grace_secs() -> u64 {
    30
}

pub fn default_fleet_batch_size() -> usize {
    100
}

pub fn default_fleet_address() -> String {
    "127.0.0.1:6199".to_string()
}

// =============================================================================
// Storage / Logging Defaults
// =============================================================================

pub fn default_database_path() -> String {
    "maprelay.db".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_format() -> String {
    "text".to_string()
}

pub fn default_http_timeout_secs() -> u64 {
    10
}
