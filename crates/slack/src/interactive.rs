use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum InteractionKind {
    Shortcut,
    ViewSubmission,
    ViewClosed,
    BlockActions,
    Other(String),
}

impl From<String> for InteractionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "shortcut" => Self::Shortcut,
            "view_submission" => Self::ViewSubmission,
            "view_closed" => Self::ViewClosed,
            "block_actions" => Self::BlockActions,
            _ => Self::Other(value),
        }
    }
}

impl InteractionKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Shortcut => "shortcut",
            Self::ViewSubmission => "view_submission",
            Self::ViewClosed => "view_closed",
            Self::BlockActions => "block_actions",
            Self::Other(kind) => kind,
        }
    }
}

impl Default for InteractionKind {
    /// Payloads without a `type` still decode and route as an unknown kind.
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InteractionPayload {
    #[serde(rename = "type", default)]
    pub kind: InteractionKind,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub user: InteractionUser,
    #[serde(default)]
    pub channel: Option<InteractionChannel>,
    #[serde(default)]
    pub view: Option<ViewPayload>,
    #[serde(default)]
    pub actions: Vec<BlockAction>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct InteractionUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InteractionChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ViewPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub state: ViewState,
}

/// Submitted input values keyed by block id, then action id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ViewState {
    #[serde(default)]
    pub values: HashMap<String, HashMap<String, ViewStateValue>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ViewStateValue {
    #[serde(default)]
    pub selected_channel: Option<String>,
    #[serde(default)]
    pub selected_conversation: Option<String>,
    #[serde(default)]
    pub selected_date: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BlockAction {
    #[serde(default)]
    pub action_id: String,
    #[serde(default)]
    pub block_id: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl InteractionPayload {
    pub fn routing_key(&self) -> &str {
        resolve_callback_id(self)
    }

    pub fn view_value(&self, block_id: &str, action_id: &str) -> Option<&ViewStateValue> {
        self.view.as_ref()?.state.values.get(block_id)?.get(action_id)
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel.as_ref().map(|channel| channel.id.as_str())
    }
}

/// Routing key for an interactive payload: the view's callback id for view submissions
/// and closes, the first action id for block actions, the root callback id otherwise.
///
/// Never fails; a malformed payload yields an empty key.
pub fn resolve_callback_id(payload: &InteractionPayload) -> &str {
    match payload.kind {
        InteractionKind::ViewSubmission | InteractionKind::ViewClosed => {
            payload.view.as_ref().map(|view| view.callback_id.as_str()).unwrap_or_default()
        }
        InteractionKind::BlockActions => {
            payload.actions.first().map(|action| action.action_id.as_str()).unwrap_or_default()
        }
        _ => payload.callback_id.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_callback_id, InteractionKind, InteractionPayload};

    fn payload(json: &str) -> InteractionPayload {
        serde_json::from_str(json).expect("valid interaction payload")
    }

    #[test]
    fn view_submission_routes_by_view_callback_id() {
        let submission = payload(
            r#"{"type":"view_submission","callback_id":"root-ignored","user":{"id":"U1"},
                "view":{"id":"V1","callback_id":"pull_stats_for_interval_modal"}}"#,
        );
        assert_eq!(resolve_callback_id(&submission), "pull_stats_for_interval_modal");

        let closed = payload(r#"{"type":"view_closed","view":{"callback_id":"draw_modal"}}"#);
        assert_eq!(resolve_callback_id(&closed), "draw_modal");
    }

    #[test]
    fn block_actions_route_by_first_action_id() {
        let actions = payload(
            r#"{"type":"block_actions","actions":[
                {"action_id":"refresh","block_id":"b1"},
                {"action_id":"ignored","block_id":"b2"}]}"#,
        );
        assert_eq!(resolve_callback_id(&actions), "refresh");

        let empty = payload(r#"{"type":"block_actions","actions":[]}"#);
        assert_eq!(resolve_callback_id(&empty), "");
    }

    #[test]
    fn other_kinds_route_by_root_callback_id() {
        let shortcut = payload(r#"{"type":"shortcut","callback_id":"pull_stats_for_interval"}"#);
        assert_eq!(shortcut.routing_key(), "pull_stats_for_interval");

        let unknown = payload(r#"{"type":"workflow_step_edit","callback_id":"wf"}"#);
        assert_eq!(unknown.kind, InteractionKind::Other("workflow_step_edit".to_owned()));
        assert_eq!(unknown.routing_key(), "wf");
    }

    #[test]
    fn payload_without_type_decodes_as_unknown_kind() {
        let untyped = payload(r#"{"callback_id":"pull_stats_for_interval"}"#);
        assert_eq!(untyped.kind, InteractionKind::Other(String::new()));
        assert_eq!(untyped.routing_key(), "pull_stats_for_interval");

        let empty = payload("{}");
        assert_eq!(resolve_callback_id(&empty), "");
    }

    #[test]
    fn message_action_is_not_a_known_kind() {
        let action = payload(r#"{"type":"message_action","callback_id":"m"}"#);
        assert_eq!(action.kind, InteractionKind::Other("message_action".to_owned()));
    }

    #[test]
    fn view_submission_without_view_yields_empty_key() {
        let submission = payload(r#"{"type":"view_submission"}"#);
        assert_eq!(resolve_callback_id(&submission), "");
    }

    #[test]
    fn reads_submitted_picker_values() {
        let submission = payload(
            r#"{"type":"view_submission","user":{"id":"U1"},"view":{"callback_id":"m",
                "state":{"values":{
                    "channel_picker":{"channel_picker":{"type":"channels_select","selected_channel":"C1"}},
                    "start_date":{"start_date_picker":{"type":"datepicker","selected_date":"2025-01-28"}}
                }}}}"#,
        );

        let channel = submission.view_value("channel_picker", "channel_picker").expect("channel");
        assert_eq!(channel.selected_channel.as_deref(), Some("C1"));
        let start = submission.view_value("start_date", "start_date_picker").expect("start");
        assert_eq!(start.selected_date.as_deref(), Some("2025-01-28"));
        assert!(submission.view_value("end_date", "end_date_picker").is_none());
    }
}
