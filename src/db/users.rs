//! Registered streamers and their channel settings.

use super::DbError;
use crate::error::ProviderError;
use crate::providers::{SettingsStore, User, UserDirectory};
use crate::settings::{ChannelSettings, StarRange, parse_excluded};
use async_trait::async_trait;
use sqlx::SqlitePool;

const USER_COLUMNS: &str = "twitch_id, twitch_username, osu_id, osu_username, is_live, \
     enabled, echo, sub_only, points_only, test_mode, cooldown_secs, sr_low, sr_high, excluded_users";

type UserRow = (
    String,
    String,
    i64,
    String,
    bool,
    bool,
    bool,
    bool,
    bool,
    bool,
    f64,
    f64,
    f64,
    String,
);

fn row_to_user(row: UserRow) -> User {
    let (
        twitch_id,
        twitch_username,
        osu_id,
        osu_username,
        is_live,
        enabled,
        echo,
        sub_only,
        points_only,
        test_mode,
        cooldown_secs,
        sr_low,
        sr_high,
        excluded,
    ) = row;
    let osu_id = osu_id.max(0) as u64;
    let settings = ChannelSettings {
        channel: twitch_username.to_lowercase(),
        osu_id,
        enabled,
        echo_enabled: echo,
        sub_only,
        points_only,
        test_mode,
        cooldown_secs,
        star_range: StarRange::new(sr_low, sr_high),
        excluded_users: parse_excluded(&excluded),
    };
    User {
        twitch_id,
        twitch_username,
        osu_id,
        osu_username,
        is_live,
        settings,
    }
}

/// Registration input. Settings start at [`ChannelSettings::new`] defaults.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub twitch_id: String,
    pub twitch_username: String,
    pub osu_id: u64,
    pub osu_username: String,
}

/// Repository for registered users.
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a streamer with default settings.
    pub async fn add_user(&self, user: &NewUser) -> Result<User, DbError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO users (twitch_id, twitch_username, osu_id, osu_username, registered_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.twitch_id)
        .bind(user.twitch_username.to_lowercase())
        .bind(user.osu_id as i64)
        .bind(&user.osu_username)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return DbError::UserExists(user.twitch_username.clone());
            }
            DbError::from(e)
        })?;

        Ok(User {
            twitch_id: user.twitch_id.clone(),
            twitch_username: user.twitch_username.to_lowercase(),
            osu_id: user.osu_id,
            osu_username: user.osu_username.clone(),
            is_live: false,
            settings: ChannelSettings::new(user.twitch_username.to_lowercase(), user.osu_id),
        })
    }

    pub async fn remove_user(&self, twitch_id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE twitch_id = ?")
            .bind(twitch_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn enabled_users(&self) -> Result<Vec<User>, DbError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE enabled = 1 ORDER BY twitch_username");
        let rows: Vec<UserRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(row_to_user).collect())
    }

    pub async fn find_by_channel(&self, channel: &str) -> Result<Option<User>, DbError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE twitch_username = ?");
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(channel.trim_start_matches('#'))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_user))
    }

    pub async fn find_by_osu_username(&self, osu_username: &str) -> Result<Option<User>, DbError> {
        // Bancho reports spaces in usernames as underscores.
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE osu_username = ? OR REPLACE(osu_username, ' ', '_') = ?"
        );
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(osu_username)
            .bind(osu_username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_user))
    }

    pub async fn update_live(&self, twitch_id: &str, is_live: bool) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET is_live = ? WHERE twitch_id = ?")
            .bind(is_live)
            .bind(twitch_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store the current channel login. Settings follow since they are keyed
    /// by the login.
    pub async fn update_username(&self, twitch_id: &str, login: &str) -> Result<(), DbError> {
        let login = login.to_lowercase();
        sqlx::query("UPDATE users SET twitch_username = ? WHERE twitch_id = ?")
            .bind(&login)
            .bind(twitch_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return DbError::UserExists(login.clone());
                }
                DbError::from(e)
            })?;
        Ok(())
    }

    pub async fn update_settings(&self, settings: &ChannelSettings) -> Result<(), DbError> {
        let mut excluded: Vec<&str> = settings.excluded_users.iter().map(String::as_str).collect();
        excluded.sort_unstable();

        sqlx::query(
            r#"
            UPDATE users
            SET enabled = ?, echo = ?, sub_only = ?, points_only = ?, test_mode = ?,
                cooldown_secs = ?, sr_low = ?, sr_high = ?, excluded_users = ?
            WHERE twitch_username = ?
            "#,
        )
        .bind(settings.enabled)
        .bind(settings.echo_enabled)
        .bind(settings.sub_only)
        .bind(settings.points_only)
        .bind(settings.test_mode)
        .bind(settings.cooldown_secs)
        .bind(settings.star_range.low)
        .bind(settings.star_range.high)
        .bind(excluded.join(","))
        .bind(&settings.channel)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn get_enabled_users(&self) -> Result<Vec<User>, ProviderError> {
        Ok(self.enabled_users().await?)
    }

    async fn settings_for(&self, channel: &str) -> Result<Option<ChannelSettings>, ProviderError> {
        Ok(self.find_by_channel(channel).await?.map(|u| u.settings))
    }

    async fn set_live(&self, twitch_id: &str, is_live: bool) -> Result<(), ProviderError> {
        Ok(self.update_live(twitch_id, is_live).await?)
    }

    async fn rename(&self, twitch_id: &str, login: &str) -> Result<(), ProviderError> {
        Ok(self.update_username(twitch_id, login).await?)
    }
}

#[async_trait]
impl SettingsStore for UserRepository {
    async fn user_by_osu_username(&self, osu_username: &str) -> Result<Option<User>, ProviderError> {
        Ok(self.find_by_osu_username(osu_username).await?)
    }

    async fn save_settings(&self, settings: &ChannelSettings) -> Result<(), ProviderError> {
        Ok(self.update_settings(settings).await?)
    }
}
