use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::commands::SlashCommandPayload;
use crate::interactive::InteractionPayload;

/// One Socket Mode frame after decoding at the transport boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    /// Empty for control frames (`hello`, `disconnect`) that need no acknowledgement.
    pub envelope_id: String,
    pub payload: SlackPayload,
}

impl SlackEnvelope {
    pub fn new(envelope_id: impl Into<String>, payload: SlackPayload) -> Self {
        Self { envelope_id: envelope_id.into(), payload }
    }

    pub fn requires_ack(&self) -> bool {
        !self.envelope_id.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackPayload {
    Event(EventPayload),
    SlashCommand(SlashCommandPayload),
    Interactive(InteractionPayload),
    Unrecognized { envelope_type: String },
}

impl SlackPayload {
    pub fn family(&self) -> &'static str {
        match self {
            Self::Event(_) => "events",
            Self::SlashCommand(_) => "commands",
            Self::Interactive(_) => "interactive",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    AppMention,
    ReactionAdded,
    ReactionRemoved,
    Message,
    Unrecognized(String),
}

impl EventType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "app_mention" => Self::AppMention,
            "reaction_added" => Self::ReactionAdded,
            "reaction_removed" => Self::ReactionRemoved,
            "message" => Self::Message,
            other => Self::Unrecognized(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AppMention => "app_mention",
            Self::ReactionAdded => "reaction_added",
            Self::ReactionRemoved => "reaction_removed",
            Self::Message => "message",
            Self::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPayload {
    AppMention(MessageEvent),
    ReactionAdded(ReactionEvent),
    ReactionRemoved(ReactionEvent),
    Message(MessageEvent),
    Unrecognized { event_type: String },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::AppMention(_) => EventType::AppMention,
            Self::ReactionAdded(_) => EventType::ReactionAdded,
            Self::ReactionRemoved(_) => EventType::ReactionRemoved,
            Self::Message(_) => EventType::Message,
            Self::Unrecognized { event_type } => EventType::Unrecognized(event_type.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ReactionEvent {
    pub user: String,
    pub reaction: String,
    pub item: ReactionItem,
    #[serde(default)]
    pub item_user: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ReactionItem {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("envelope is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{envelope_type}` envelope is missing its payload")]
    MissingPayload { envelope_type: String },
    #[error("`{kind}` payload could not be decoded: {reason}")]
    Payload { kind: String, reason: String },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    envelope_id: String,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Option<Value>,
}

/// Decodes a raw Socket Mode frame into a typed envelope.
pub fn decode_envelope(raw: &str) -> Result<SlackEnvelope, DecodeError> {
    let frame: RawEnvelope = serde_json::from_str(raw)?;

    let payload = match frame.envelope_type.as_str() {
        "events_api" => {
            let payload = require_payload(&frame)?;
            let event = payload.get("event").cloned().unwrap_or(Value::Null);
            SlackPayload::Event(decode_event(event)?)
        }
        "slash_commands" => {
            let payload = require_payload(&frame)?;
            SlackPayload::SlashCommand(decode_typed("slash_commands", payload)?)
        }
        "interactive" => {
            let payload = require_payload(&frame)?;
            SlackPayload::Interactive(decode_typed("interactive", payload)?)
        }
        other => SlackPayload::Unrecognized { envelope_type: other.to_owned() },
    };

    Ok(SlackEnvelope { envelope_id: frame.envelope_id, payload })
}

pub fn decode_event(event: Value) -> Result<EventPayload, DecodeError> {
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default().to_owned();

    Ok(match EventType::from_name(&event_type) {
        EventType::AppMention => EventPayload::AppMention(decode_typed(&event_type, event)?),
        EventType::Message => EventPayload::Message(decode_typed(&event_type, event)?),
        EventType::ReactionAdded => EventPayload::ReactionAdded(decode_typed(&event_type, event)?),
        EventType::ReactionRemoved => {
            EventPayload::ReactionRemoved(decode_typed(&event_type, event)?)
        }
        EventType::Unrecognized(event_type) => EventPayload::Unrecognized { event_type },
    })
}

fn require_payload(frame: &RawEnvelope) -> Result<Value, DecodeError> {
    frame
        .payload
        .clone()
        .ok_or_else(|| DecodeError::MissingPayload { envelope_type: frame.envelope_type.clone() })
}

fn decode_typed<T>(kind: &str, value: Value) -> Result<T, DecodeError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(value)
        .map_err(|error| DecodeError::Payload { kind: kind.to_owned(), reason: error.to_string() })
}
