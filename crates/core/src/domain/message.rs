use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::normalize_reaction;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    pub name: String,
    pub count: i64,
}

impl ReactionCount {
    pub fn new(name: impl Into<String>, count: i64) -> Self {
        Self { name: name.into(), count }
    }
}

/// A channel message as returned by the conversation history API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Slack message timestamp (`"<unix seconds>.<micros>"`), also the message id.
    pub ts: String,
    pub user_id: Option<String>,
    pub text: String,
    pub reactions: Vec<ReactionCount>,
}

impl ChannelMessage {
    /// Matches `name` against the message's reactions the way channel rules do,
    /// so `:eyes:` and `eyes` are the same reaction.
    pub fn has_reaction(&self, name: &str) -> bool {
        let name = normalize_reaction(name);
        self.reactions.iter().any(|reaction| normalize_reaction(&reaction.name) == name)
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        parse_slack_ts(&self.ts)
    }

    /// UTC calendar day the message was posted on.
    pub fn posted_on(&self) -> Option<NaiveDate> {
        self.posted_at().map(|posted_at| posted_at.date_naive())
    }
}

pub fn parse_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (seconds, fraction) = match ts.trim().split_once('.') {
        Some((seconds, fraction)) => (seconds, fraction),
        None => (ts.trim(), ""),
    };
    let seconds = seconds.parse::<i64>().ok()?;
    let micros = if fraction.is_empty() {
        0
    } else {
        let digits: String = fraction.chars().take(6).collect();
        let padded = format!("{digits:0<6}");
        padded.parse::<u32>().ok()?
    };

    DateTime::from_timestamp(seconds, micros * 1_000)
}

pub fn format_slack_ts(at: DateTime<Utc>) -> String {
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}
