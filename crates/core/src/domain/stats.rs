use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Category name to accumulated reaction count.
pub type Tally = BTreeMap<String, i64>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    pub channel: String,
    pub category: String,
    pub date: NaiveDate,
    pub count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCategoryCount {
    pub date: NaiveDate,
    pub category: String,
    pub count: i64,
}

/// Per-day tallies collected during one processing pass over a channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DailyTallies {
    days: BTreeMap<NaiveDate, Tally>,
}

impl DailyTallies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn day_mut(&mut self, day: NaiveDate) -> &mut Tally {
        self.days.entry(day).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &Tally)> {
        self.days.iter()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

pub fn grand_total(totals: &[CategoryTotal]) -> i64 {
    totals.iter().map(|total| total.count).sum()
}
