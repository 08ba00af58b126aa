mod bootstrap;
mod bot;
mod chart;
mod health;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tars_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(name = "tars", about = "Slack reaction stats bot")]
struct Args {
    /// Config file; defaults to ./tars.toml or ./config/tars.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging(config: &AppConfig) {
    use tars_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let require_file = args.config.is_some();
    let config = AppConfig::load(LoadOptions {
        config_path: args.config,
        require_file,
        ..LoadOptions::default()
    })?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
        app.config.channels.len(),
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = app.slack_runner.with_shutdown(shutdown_rx);
    let runner_task = tokio::spawn(async move { runner.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        channel_count = app.config.channels.len(),
        "tars started"
    );

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "tars stopping"
    );

    let _ = shutdown_tx.send(true);
    runner_task.await??;
    app.db_pool.close().await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
