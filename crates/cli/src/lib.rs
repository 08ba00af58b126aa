pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tars_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "tars-admin",
    about = "TARS operator CLI",
    long_about = "Apply migrations, inspect effective configuration, and query stored reaction stats.",
    after_help = "Examples:\n  tars-admin migrate\n  tars-admin config\n  tars-admin stats --channel C0123 --from 2025-01-01 --to 2025-01-31 --daily"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file (defaults to tars.toml or config/tars.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Print stored reaction stats for a channel and inclusive date range")]
    Stats {
        #[arg(long, help = "Channel id, e.g. C0123456")]
        channel: String,
        #[arg(long, help = "First day (YYYY-MM-DD)")]
        from: String,
        #[arg(long, help = "Last day (YYYY-MM-DD), inclusive")]
        to: String,
        #[arg(long, help = "Include the per-day breakdown")]
        daily: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(options),
        Command::Config => commands::config::run(options),
        Command::Stats { channel, from, to, daily } => commands::stats::run(
            options,
            commands::stats::StatsQuery { channel, from, to, daily },
        ),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
