use serde::Deserialize;
use thiserror::Error;

pub const STATS_COMMAND: &str = "/stats";
pub const MAX_STATS_DAYS: u32 = 90;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub response_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatsCommand {
    /// Summary of the invoking channel over the trailing `days`.
    Summary { days: u32 },
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("`{0}` is not a number of days; try `/stats 7`")]
    InvalidDays(String),
    #[error("day count must be between 1 and {MAX_STATS_DAYS}, got {0}")]
    DaysOutOfRange(u32),
}

pub fn parse_stats_command(
    payload: &SlashCommandPayload,
    default_days: u32,
) -> Result<StatsCommand, CommandParseError> {
    if payload.command != STATS_COMMAND {
        return Err(CommandParseError::UnsupportedCommand(payload.command.clone()));
    }

    let Some(argument) = payload.text.split_whitespace().next() else {
        return Ok(StatsCommand::Summary { days: default_days });
    };
    if argument.eq_ignore_ascii_case("help") {
        return Ok(StatsCommand::Help);
    }

    let days = argument
        .parse::<u32>()
        .map_err(|_| CommandParseError::InvalidDays(argument.to_owned()))?;
    if days == 0 || days > MAX_STATS_DAYS {
        return Err(CommandParseError::DaysOutOfRange(days));
    }

    Ok(StatsCommand::Summary { days })
}
