use std::sync::Arc;

use tars_core::config::{AppConfig, ConfigError, LoadOptions};
use tars_db::{connect_with_config, migrations, DbPool, SqlStatsRepository};
use tars_slack::api::ApiError;
use tars_slack::registry::SlackRouter;
use tars_slack::socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner};
use tars_slack::web::SlackWebClient;
use thiserror::Error;
use tracing::info;

use crate::bot::{register_handlers, StatsBot};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack client setup failed: {0}")]
    Slack(#[source] ApiError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        channel_count = config.channels.len(),
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let api = SlackWebClient::new(&config.slack).map_err(BootstrapError::Slack)?;
    let bot = Arc::new(
        StatsBot::new(
            Arc::new(api),
            Arc::new(SqlStatsRepository::new(db_pool.clone())),
            config.stats_processor(),
        )
        .with_default_stats_days(config.bot.default_stats_days),
    );

    let mut router = SlackRouter::new();
    register_handlers(&bot, &mut router);
    info!(
        event_name = "system.bootstrap.handlers_registered",
        correlation_id = "bootstrap",
        handler_count = router.handler_count(),
        "slack handlers registered"
    );

    let slack_runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        Arc::new(router),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, slack_runner })
}
