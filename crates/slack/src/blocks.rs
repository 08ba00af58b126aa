use chrono::NaiveDate;
use serde::Serialize;

use tars_core::domain::stats::{grand_total, CategoryTotal, DailyCategoryCount};
use tars_core::errors::InterfaceError;
use tars_core::flows::FlowType;
use tars_core::interval::DATE_FORMAT;

pub const CHANNEL_BLOCK_ID: &str = "channel_picker";
pub const CHANNEL_ACTION_ID: &str = "channel_picker";
pub const START_DATE_BLOCK_ID: &str = "start_date";
pub const START_DATE_ACTION_ID: &str = "start_date_picker";
pub const END_DATE_BLOCK_ID: &str = "end_date";
pub const END_DATE_ACTION_ID: &str = "end_date_picker";

pub const NOT_CONFIGURED_TEXT: &str = "Sorry, this channel is not configured for stats exporting";
pub const NO_STATS_TEXT: &str = "📉 No stats available for this period.";

/// Slack rejects section text objects longer than this with `invalid_blocks`.
pub const MAX_SECTION_TEXT_LEN: usize = 3000;
const SECTION_TEXT_BUDGET: usize = MAX_SECTION_TEXT_LEN - 64;
const MAX_DAILY_SECTIONS: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    ChannelsSelect {
        action_id: String,
        placeholder: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_channel: Option<String>,
    },
    Datepicker {
        action_id: String,
        initial_date: String,
        placeholder: TextObject,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { block_id: String, text: TextObject },
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
    Divider { block_id: String },
    Input { block_id: String, label: TextObject, element: InputElement },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn divider(mut self, block_id: impl Into<String>) -> Self {
        self.blocks.push(Block::Divider { block_id: block_id.into() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// A `views.open` modal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub view_type: &'static str,
    pub callback_id: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub close: TextObject,
    pub blocks: Vec<Block>,
}

/// Channel picker plus start/end date pickers, both dates defaulting to `today`.
pub fn interval_modal(flow_type: FlowType, today: NaiveDate) -> ModalView {
    let today = today.format(DATE_FORMAT).to_string();
    let title = match flow_type {
        FlowType::PullStats => "Pull stats for interval",
        FlowType::DrawStats => "Draw stats for interval",
    };

    ModalView {
        view_type: "modal",
        callback_id: flow_type.modal_callback_id().to_owned(),
        title: TextObject::plain(title),
        submit: TextObject::plain("Submit"),
        close: TextObject::plain("Cancel"),
        blocks: vec![
            Block::Input {
                block_id: CHANNEL_BLOCK_ID.to_owned(),
                label: TextObject::plain("Channel"),
                element: InputElement::ChannelsSelect {
                    action_id: CHANNEL_ACTION_ID.to_owned(),
                    placeholder: TextObject::plain("Select a channel"),
                    initial_channel: None,
                },
            },
            Block::Input {
                block_id: START_DATE_BLOCK_ID.to_owned(),
                label: TextObject::plain("Start date"),
                element: InputElement::Datepicker {
                    action_id: START_DATE_ACTION_ID.to_owned(),
                    initial_date: today.clone(),
                    placeholder: TextObject::plain("Select a start date"),
                },
            },
            Block::Input {
                block_id: END_DATE_BLOCK_ID.to_owned(),
                label: TextObject::plain("End date"),
                element: InputElement::Datepicker {
                    action_id: END_DATE_ACTION_ID.to_owned(),
                    initial_date: today,
                    placeholder: TextObject::plain("Select an end date"),
                },
            },
        ],
    }
}

pub fn stats_summary_message(
    channel_label: &str,
    interval_label: &str,
    totals: &[CategoryTotal],
    daily: &[DailyCategoryCount],
) -> MessageTemplate {
    let total = grand_total(totals);
    let lines = totals
        .iter()
        .map(|entry| {
            format!("• *{}*: {} ({})", entry.category, entry.count, percentage(entry.count, total))
        })
        .collect::<Vec<_>>()
        .join("\n");
    let lines = truncate_text(&lines, SECTION_TEXT_BUDGET);

    let mut builder = MessageBuilder::new(format!(
        "Reaction stats for {channel_label} from {interval_label}: {total} total"
    ))
    .header("stats.summary.header.v1", "Reaction Stats")
    .context("stats.summary.range.v1", |context| {
        context.mrkdwn(format!("{channel_label} · {interval_label}"));
    })
    .section("stats.summary.totals.v1", |section| {
        section.mrkdwn(format!("{lines}\n*Total*: {total}"));
    });

    if !daily.is_empty() {
        builder = builder.divider("stats.summary.divider.v1");
        for (index, text) in daily_sections(daily).into_iter().enumerate() {
            builder = builder.section(format!("stats.summary.daily.{index}.v1"), |section| {
                section.mrkdwn(text);
            });
        }
    }

    builder.build()
}

pub fn no_stats_message() -> MessageTemplate {
    MessageBuilder::new(NO_STATS_TEXT)
        .section("stats.empty.v1", |section| {
            section.plain(NO_STATS_TEXT);
        })
        .build()
}

pub fn channel_not_configured_message() -> MessageTemplate {
    MessageBuilder::new(NOT_CONFIGURED_TEXT)
        .section("stats.not_configured.v1", |section| {
            section.plain(NOT_CONFIGURED_TEXT);
        })
        .build()
}

pub fn error_message(error: &InterfaceError) -> MessageTemplate {
    let summary = format!(":x: Sorry, I couldn't process your request: {}", error.user_detail());
    let correlation_id = error.correlation_id();
    MessageBuilder::new(summary.clone())
        .section("stats.error.summary.v1", |section| {
            section.mrkdwn(summary);
        })
        .context("stats.error.context.v1", |context| {
            context.plain(format!("Reference: {correlation_id}"));
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("TARS reaction stats help")
        .section("stats.help.summary.v1", |section| {
            section.mrkdwn(
                "*I count reactions in configured channels and turn them into daily stats.*\n\
                 • *Pull stats for interval* (shortcut): collect and store stats for a channel and date range\n\
                 • *Draw stats for interval* (shortcut): report stored stats for a channel and date range\n\
                 • `/stats [days]`: summary of this channel for the last `days` days",
            );
        })
        .build()
}

/// Caption posted alongside an uploaded chart.
pub fn chart_caption(interval_label: &str) -> String {
    format!("Reaction Stats Pie Chart\nFrom {interval_label}")
}

/// Per-day breakdown packed into section texts that stay under the Slack limit.
/// Days past `MAX_DAILY_SECTIONS` sections are summarized as a count.
fn daily_sections(daily: &[DailyCategoryCount]) -> Vec<String> {
    let days = daily_groups(daily);
    let mut sections: Vec<String> = Vec::new();
    let mut current = "*Per day*".to_owned();

    for (index, day) in days.iter().enumerate() {
        let day = truncate_text(day, SECTION_TEXT_BUDGET);
        if current.len() + 1 + day.len() > SECTION_TEXT_BUDGET {
            sections.push(std::mem::take(&mut current));
            if sections.len() == MAX_DAILY_SECTIONS {
                let remaining = days.len() - index;
                if let Some(last) = sections.last_mut() {
                    last.push_str(&format!("\n…and {remaining} more days"));
                }
                return sections;
            }
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&day);
    }

    if !current.is_empty() {
        sections.push(current);
    }
    sections
}

fn daily_groups(daily: &[DailyCategoryCount]) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    let mut current: Option<NaiveDate> = None;

    for row in daily {
        if current != Some(row.date) {
            groups.push(format!("`{}`", row.date.format(DATE_FORMAT)));
            current = Some(row.date);
        }
        if let Some(group) = groups.last_mut() {
            group.push_str(&format!("\n    {}: {}", row.category, row.count));
        }
    }

    groups
}

fn truncate_text(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_owned();
    }
    let mut end = limit.saturating_sub('…'.len_utf8());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

fn percentage(count: i64, total: i64) -> String {
    if total <= 0 {
        return "0.0%".to_owned();
    }
    format!("{:.1}%", count as f64 * 100.0 / total as f64)
}
