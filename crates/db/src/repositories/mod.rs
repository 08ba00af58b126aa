use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use tars_core::domain::stats::{CategoryTotal, DailyCategoryCount, StatRecord, Tally};
use tars_core::errors::ApplicationError;

pub mod memory;
pub mod stats;

pub use memory::InMemoryStatsRepository;
pub use stats::SqlStatsRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
}

impl RepositoryError {
    /// Schema constraint failures (`CHECK (count >= 0)`) are reported as `Constraint`.
    pub(crate) fn from_write(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &error {
            if matches!(db.kind(), sqlx::error::ErrorKind::CheckViolation) {
                return Self::Constraint(db.message().to_owned());
            }
        }
        Self::Database(error)
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

/// Per-channel, per-day, per-category reaction counters.
///
/// Range queries take timestamps but compare on the UTC calendar day of each bound, both
/// ends inclusive.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Upserts every category of `tally` for `(channel, date)` in one transaction. A repeated
    /// call overwrites the stored counts.
    async fn save_stats(
        &self,
        channel: &str,
        date: NaiveDate,
        tally: &Tally,
    ) -> Result<(), RepositoryError>;

    async fn aggregated_stats(
        &self,
        channel: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CategoryTotal>, RepositoryError>;

    async fn daily_stats(
        &self,
        channel: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailyCategoryCount>, RepositoryError>;

    async fn find_record(
        &self,
        channel: &str,
        category: &str,
        date: NaiveDate,
    ) -> Result<Option<StatRecord>, RepositoryError>;
}
