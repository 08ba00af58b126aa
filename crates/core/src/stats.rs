use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::message::{ChannelMessage, ReactionCount};
use crate::domain::stats::Tally;
use crate::rules::{normalize_reaction, RuleTable};

/// How a configured beacon reaction gates message selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeaconPolicy {
    /// A message counts when it carries the beacon or any other reaction.
    #[default]
    AnyReaction,
    /// A message counts only when it carries the beacon.
    Strict,
}

impl std::str::FromStr for BeaconPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any_reaction" | "any" => Ok(Self::AnyReaction),
            "strict" => Ok(Self::Strict),
            other => {
                Err(format!("unsupported beacon policy `{other}` (expected any_reaction|strict)"))
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct StatsProcessor {
    rules: Arc<RuleTable>,
    policy: BeaconPolicy,
    unmatched_category: Option<String>,
}

impl StatsProcessor {
    pub fn new(rules: Arc<RuleTable>) -> Self {
        Self { rules, policy: BeaconPolicy::default(), unmatched_category: None }
    }

    pub fn with_policy(mut self, policy: BeaconPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Collect reactions that match no rule under `category` instead of dropping them.
    pub fn with_unmatched_category(mut self, category: Option<String>) -> Self {
        self.unmatched_category = category.filter(|category| !category.trim().is_empty());
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn should_process_message(&self, beacon: Option<&str>, message: &ChannelMessage) -> bool {
        let has_any_reaction = message.reactions.iter().any(|reaction| reaction.count > 0);
        let Some(beacon) = beacon.map(normalize_reaction).filter(|beacon| !beacon.is_empty())
        else {
            return has_any_reaction;
        };

        let has_beacon = message.has_reaction(&beacon);
        match self.policy {
            BeaconPolicy::AnyReaction => has_beacon || has_any_reaction,
            BeaconPolicy::Strict => has_beacon,
        }
    }

    pub fn classify(&self, channel_id: &str, reactions: &[ReactionCount], tally: &mut Tally) {
        let channel_rules = self.rules.channel(channel_id);

        for reaction in reactions {
            let category = channel_rules
                .and_then(|rules| rules.category_for(&reaction.name))
                .or(self.unmatched_category.as_deref());

            if let Some(category) = category {
                *tally.entry(category.to_owned()).or_insert(0) += reaction.count;
            }
        }
    }
}
