use std::collections::HashMap;

use crate::config::ChannelConfig;

/// Immutable reaction-to-category snapshot for every configured channel.
///
/// Built once from configuration during startup and shared behind an `Arc`; there is no
/// mutation API, so concurrent readers never need to synchronize.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleTable {
    channels: HashMap<String, ChannelRules>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelRules {
    pub name: String,
    pub beacon_reaction: Option<String>,
    categories: HashMap<String, String>,
}

impl ChannelRules {
    pub fn category_for(&self, reaction: &str) -> Option<&str> {
        self.categories.get(&normalize_reaction(reaction)).map(String::as_str)
    }
}

impl RuleTable {
    pub fn from_channels(channels: &[ChannelConfig]) -> Self {
        let mut table = HashMap::with_capacity(channels.len());

        for channel in channels {
            let entry = table.entry(channel.id.clone()).or_insert_with(ChannelRules::default);
            entry.name = channel.name.clone();
            entry.beacon_reaction = channel
                .beacon_reaction
                .as_deref()
                .map(normalize_reaction)
                .filter(|reaction| !reaction.is_empty());

            // later rules for the same reaction replace earlier ones
            for rule in &channel.rules {
                entry.categories.insert(normalize_reaction(&rule.reaction), rule.category.clone());
            }
        }

        Self { channels: table }
    }

    pub fn channel(&self, channel_id: &str) -> Option<&ChannelRules> {
        self.channels.get(channel_id)
    }

    pub fn contains_channel(&self, channel_id: &str) -> bool {
        self.channels.contains_key(channel_id)
    }

    pub fn category_for(&self, channel_id: &str, reaction: &str) -> Option<&str> {
        self.channel(channel_id).and_then(|rules| rules.category_for(reaction))
    }

    pub fn beacon_reaction(&self, channel_id: &str) -> Option<&str> {
        self.channel(channel_id).and_then(|rules| rules.beacon_reaction.as_deref())
    }
}

/// Reaction names arrive as `thumbsup` from the API but are often written `:thumbsup:`
/// in configuration.
pub fn normalize_reaction(reaction: &str) -> String {
    reaction.trim().trim_matches(':').to_ascii_lowercase()
}
