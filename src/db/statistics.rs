//! Request and command statistics.

use super::DbError;
use crate::error::ProviderError;
use crate::providers::{RequestRecord, StatisticsSink};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Where in-game commands come from.
const USED_FROM_GAME: &str = "osu_irc";

#[derive(Clone)]
pub struct StatisticsRepository {
    pool: SqlitePool,
}

impl StatisticsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_request(&self, record: &RequestRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO requests (requested_at, beatmap_id, requester, channel, mods)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.requested_at.timestamp())
        .bind(record.beatmap_id as i64)
        .bind(&record.requester)
        .bind(&record.channel)
        .bind(&record.mods)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_command(&self, osu_username: &str, command: &str) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO commands (used_at, command, used_from, osu_username)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(chrono::Utc::now().timestamp())
        .bind(command)
        .bind(USED_FROM_GAME)
        .bind(osu_username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Requests forwarded to `channel` so far.
    pub async fn request_count(&self, channel: &str) -> Result<i64, DbError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM requests WHERE channel = ?")
            .bind(channel)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Usage counts per command name, most used first.
    pub async fn command_usage(&self) -> Result<Vec<(String, i64)>, DbError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT command, COUNT(*) AS uses FROM commands GROUP BY command ORDER BY uses DESC, command",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl StatisticsSink for StatisticsRepository {
    async fn record_request(&self, record: RequestRecord) -> Result<(), ProviderError> {
        Ok(self.insert_request(&record).await?)
    }

    async fn record_command(&self, osu_username: &str, command: &str) -> Result<(), ProviderError> {
        Ok(self.insert_command(osu_username, command).await?)
    }
}
