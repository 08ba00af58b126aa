use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use tars_core::domain::stats::{CategoryTotal, DailyCategoryCount, StatRecord, Tally};
use tars_core::interval::DATE_FORMAT;

use super::{RepositoryError, StatsRepository};
use crate::DbPool;

pub struct SqlStatsRepository {
    pool: DbPool,
}

impl SqlStatsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn day_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_day(raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| RepositoryError::Decode(format!("invalid stat_date `{raw}`: {e}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {e}")))
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<StatRecord, RepositoryError> {
    let channel: String =
        row.try_get("channel").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stat_date: String =
        row.try_get("stat_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let count: i64 = row.try_get("count").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(StatRecord {
        channel,
        category,
        date: parse_day(&stat_date)?,
        count,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl StatsRepository for SqlStatsRepository {
    async fn save_stats(
        &self,
        channel: &str,
        date: NaiveDate,
        tally: &Tally,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let stat_date = day_key(date);

        let mut tx = self.pool.begin().await?;
        for (category, count) in tally {
            sqlx::query(
                "INSERT INTO channel_stats (channel, category, stat_date, count, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(channel, category, stat_date) DO UPDATE SET
                     count = excluded.count,
                     updated_at = excluded.updated_at",
            )
            .bind(channel)
            .bind(category)
            .bind(&stat_date)
            .bind(count)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from_write)?;
        }
        tx.commit().await?;

        tracing::debug!(
            event_name = "db.channel_stats.saved",
            channel_id = %channel,
            stat_date = %stat_date,
            categories = tally.len(),
            "daily stats persisted"
        );
        Ok(())
    }

    async fn aggregated_stats(
        &self,
        channel: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CategoryTotal>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT category, SUM(count) AS total
             FROM channel_stats
             WHERE channel = ? AND stat_date >= ? AND stat_date <= ?
             GROUP BY category
             ORDER BY category ASC",
        )
        .bind(channel)
        .bind(day_key(start.date_naive()))
        .bind(day_key(end.date_naive()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CategoryTotal {
                    category: row
                        .try_get("category")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    count: row.try_get("total").map_err(|e| RepositoryError::Decode(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn daily_stats(
        &self,
        channel: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailyCategoryCount>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT stat_date, category, SUM(count) AS total
             FROM channel_stats
             WHERE channel = ? AND stat_date >= ? AND stat_date <= ?
             GROUP BY stat_date, category
             ORDER BY stat_date ASC, category ASC",
        )
        .bind(channel)
        .bind(day_key(start.date_naive()))
        .bind(day_key(end.date_naive()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let stat_date: String =
                    row.try_get("stat_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(DailyCategoryCount {
                    date: parse_day(&stat_date)?,
                    category: row
                        .try_get("category")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    count: row.try_get("total").map_err(|e| RepositoryError::Decode(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn find_record(
        &self,
        channel: &str,
        category: &str,
        date: NaiveDate,
    ) -> Result<Option<StatRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT channel, category, stat_date, count, created_at, updated_at
             FROM channel_stats
             WHERE channel = ? AND category = ? AND stat_date = ?",
        )
        .bind(channel)
        .bind(category)
        .bind(day_key(date))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_record(r)?)),
            None => Ok(None),
        }
    }
}
