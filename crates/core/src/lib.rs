pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod interval;
pub mod rules;
pub mod stats;

pub use config::{AppConfig, ChannelConfig, ConfigError, LoadOptions, LogFormat, RuleConfig};
pub use domain::message::{ChannelMessage, ReactionCount};
pub use domain::stats::{CategoryTotal, DailyCategoryCount, DailyTallies, StatRecord, Tally};
pub use errors::{ApplicationError, InterfaceError};
pub use flows::{FlowAction, FlowEvent, FlowState, FlowType, StatsFlow};
pub use interval::StatsInterval;
pub use rules::RuleTable;
pub use stats::{BeaconPolicy, StatsProcessor};
