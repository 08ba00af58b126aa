use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use tars_core::domain::stats::{CategoryTotal, DailyCategoryCount, StatRecord, Tally};

use super::{RepositoryError, StatsRepository};

type RecordKey = (String, NaiveDate, String);

#[derive(Default)]
pub struct InMemoryStatsRepository {
    records: RwLock<BTreeMap<RecordKey, StatRecord>>,
}

impl InMemoryStatsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn in_range(
        &self,
        channel: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<StatRecord> {
        let (start, end) = (start.date_naive(), end.date_naive());
        let records = self.records.read().await;
        records
            .values()
            .filter(|record| record.channel == channel && record.date >= start && record.date <= end)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl StatsRepository for InMemoryStatsRepository {
    async fn save_stats(
        &self,
        channel: &str,
        date: NaiveDate,
        tally: &Tally,
    ) -> Result<(), RepositoryError> {
        if let Some((category, count)) = tally.iter().find(|(_, count)| **count < 0) {
            return Err(RepositoryError::Constraint(format!(
                "count for `{category}` must not be negative, got {count}"
            )));
        }

        let now = Utc::now();
        let mut records = self.records.write().await;
        for (category, count) in tally {
            let key = (channel.to_owned(), date, category.clone());
            records
                .entry(key)
                .and_modify(|record| {
                    record.count = *count;
                    record.updated_at = now;
                })
                .or_insert_with(|| StatRecord {
                    channel: channel.to_owned(),
                    category: category.clone(),
                    date,
                    count: *count,
                    created_at: now,
                    updated_at: now,
                });
        }
        Ok(())
    }

    async fn aggregated_stats(
        &self,
        channel: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CategoryTotal>, RepositoryError> {
        let mut totals: BTreeMap<String, i64> = BTreeMap::new();
        for record in self.in_range(channel, start, end).await {
            *totals.entry(record.category).or_insert(0) += record.count;
        }

        Ok(totals.into_iter().map(|(category, count)| CategoryTotal { category, count }).collect())
    }

    async fn daily_stats(
        &self,
        channel: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailyCategoryCount>, RepositoryError> {
        // keys are ordered (channel, date, category) already
        Ok(self
            .in_range(channel, start, end)
            .await
            .into_iter()
            .map(|record| DailyCategoryCount {
                date: record.date,
                category: record.category,
                count: record.count,
            })
            .collect())
    }

    async fn find_record(
        &self,
        channel: &str,
        category: &str,
        date: NaiveDate,
    ) -> Result<Option<StatRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&(channel.to_owned(), date, category.to_owned())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use tars_core::domain::stats::{CategoryTotal, Tally};
    use tars_core::interval::StatsInterval;

    use super::InMemoryStatsRepository;
    use crate::repositories::{RepositoryError, StatsRepository};

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn tally(entries: &[(&str, i64)]) -> Tally {
        entries.iter().map(|(category, count)| ((*category).to_owned(), *count)).collect()
    }

    #[tokio::test]
    async fn in_memory_repository_matches_sql_semantics() {
        let repo = InMemoryStatsRepository::new();

        repo.save_stats("C1", day(2025, 1, 29), &tally(&[("CI/CD", 5)])).await.expect("first");
        repo.save_stats("C1", day(2025, 1, 29), &tally(&[("CI/CD", 2)])).await.expect("second");
        repo.save_stats("C1", day(2025, 1, 30), &tally(&[("CI/CD", 1), ("bug", 4)]))
            .await
            .expect("next day");

        assert_eq!(repo.len().await, 3);

        let interval = StatsInterval::new(day(2025, 1, 29), day(2025, 1, 30)).expect("interval");
        let totals = repo
            .aggregated_stats("C1", interval.start_bound(), interval.end_bound())
            .await
            .expect("aggregate");
        assert_eq!(
            totals,
            vec![
                CategoryTotal { category: "CI/CD".to_owned(), count: 3 },
                CategoryTotal { category: "bug".to_owned(), count: 4 },
            ]
        );

        let daily = repo
            .daily_stats("C1", interval.start_bound(), interval.end_bound())
            .await
            .expect("daily");
        assert_eq!(daily.len(), 3);
        assert_eq!(daily[0].date, day(2025, 1, 29));
        assert_eq!(daily[0].count, 2);
    }

    #[tokio::test]
    async fn negative_count_rejects_whole_batch() {
        let repo = InMemoryStatsRepository::new();

        let result =
            repo.save_stats("C1", day(2025, 1, 29), &tally(&[("approval", 1), ("broken", -1)])).await;

        assert!(matches!(
            result,
            Err(RepositoryError::Constraint(ref message)) if message.contains("broken")
        ));
        assert!(repo.is_empty().await);
    }
}
