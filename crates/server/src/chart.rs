use async_trait::async_trait;
use tars_core::domain::stats::CategoryTotal;
use tars_core::errors::ApplicationError;
use tars_core::interval::StatsInterval;
use thiserror::Error;
use uuid::Uuid;

pub const PIE_CHART_TITLE: &str = "Reaction Stats Pie Chart";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PieSlice {
    pub label: String,
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PieChartRequest {
    pub title: String,
    pub subtitle: String,
    pub slices: Vec<PieSlice>,
}

impl PieChartRequest {
    pub fn from_totals(interval: &StatsInterval, totals: &[CategoryTotal]) -> Self {
        Self {
            title: PIE_CHART_TITLE.to_owned(),
            subtitle: format!("From {}", interval.label()),
            slices: totals
                .iter()
                .map(|total| PieSlice { label: total.category.clone(), value: total.count })
                .collect(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChartError {
    #[error("chart rendering failed: {0}")]
    Render(String),
}

impl From<ChartError> for ApplicationError {
    fn from(value: ChartError) -> Self {
        ApplicationError::Transport(value.to_string())
    }
}

/// Renders aggregated stats as a PNG image.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render_pie(&self, request: &PieChartRequest) -> Result<Vec<u8>, ChartError>;
}

pub fn chart_file_name() -> String {
    format!("reaction-stats-{}.png", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tars_core::domain::stats::CategoryTotal;
    use tars_core::interval::StatsInterval;

    use super::{chart_file_name, PieChartRequest, PIE_CHART_TITLE};

    #[test]
    fn request_carries_title_range_and_one_slice_per_category() {
        let interval = StatsInterval::new(
            NaiveDate::from_ymd_opt(2025, 1, 28).expect("date"),
            NaiveDate::from_ymd_opt(2025, 1, 30).expect("date"),
        )
        .expect("interval");

        let request = PieChartRequest::from_totals(
            &interval,
            &[
                CategoryTotal { category: "approval".to_owned(), count: 3 },
                CategoryTotal { category: "issue".to_owned(), count: 1 },
            ],
        );

        assert_eq!(request.title, PIE_CHART_TITLE);
        assert_eq!(request.subtitle, "From 2025-01-28 to 2025-01-30");
        assert_eq!(request.slices.len(), 2);
        assert_eq!(request.slices[1].label, "issue");
    }

    #[test]
    fn chart_file_names_are_unique_pngs() {
        let first = chart_file_name();
        let second = chart_file_name();
        assert!(first.ends_with(".png"));
        assert_ne!(first, second);
    }
}
