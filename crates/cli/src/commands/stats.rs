use serde_json::json;
use tars_core::config::LoadOptions;
use tars_core::domain::stats::grand_total;
use tars_core::interval::StatsInterval;
use tars_db::{SqlStatsRepository, StatsRepository};

use crate::commands::{build_runtime, load_config, open_migrated_pool, CommandFailure, CommandResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsQuery {
    pub channel: String,
    pub from: String,
    pub to: String,
    pub daily: bool,
}

pub fn run(options: LoadOptions, query: StatsQuery) -> CommandResult {
    let interval = match StatsInterval::parse(&query.from, &query.to) {
        Ok(interval) => interval,
        Err(error) => return CommandResult::failure("stats", "invalid_interval", error.to_string(), 6),
    };
    let config = match load_config("stats", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("stats") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let repository = SqlStatsRepository::new(pool.clone());

        let totals = repository
            .aggregated_stats(&query.channel, interval.start_bound(), interval.end_bound())
            .await
            .map_err(|error| ("query", error.to_string(), 7u8))?;
        let daily = if query.daily {
            Some(
                repository
                    .daily_stats(&query.channel, interval.start_bound(), interval.end_bound())
                    .await
                    .map_err(|error| ("query", error.to_string(), 7u8))?,
            )
        } else {
            None
        };

        pool.close().await;
        Ok::<_, CommandFailure>((totals, daily))
    });

    let (totals, daily) = match result {
        Ok(stats) => stats,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("stats", error_class, message, exit_code)
        }
    };

    let total = grand_total(&totals);
    let category_count = totals.len();
    let mut data = json!({
        "channel": query.channel,
        "configured": config.channel(&query.channel).is_some(),
        "from": interval.start().to_string(),
        "to": interval.end().to_string(),
        "total": total,
        "totals": totals,
    });
    if let Some(daily) = daily {
        data["daily"] = json!(daily);
    }

    CommandResult::success_with_data(
        "stats",
        format!(
            "{} categories, {} reactions in {} from {}",
            category_count,
            total,
            query.channel,
            interval.label()
        ),
        Some(data),
    )
}
