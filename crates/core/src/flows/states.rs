use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    /// Fetch, classify and persist channel history, then report.
    PullStats,
    /// Report from already persisted counters.
    DrawStats,
}

impl FlowType {
    pub fn from_callback_id(callback_id: &str) -> Option<Self> {
        match callback_id.trim_end_matches("_modal") {
            "pull_stats_for_interval" => Some(Self::PullStats),
            "draw_stats_for_interval" => Some(Self::DrawStats),
            _ => None,
        }
    }

    pub fn shortcut_callback_id(&self) -> &'static str {
        match self {
            Self::PullStats => "pull_stats_for_interval",
            Self::DrawStats => "draw_stats_for_interval",
        }
    }

    pub fn modal_callback_id(&self) -> &'static str {
        match self {
            Self::PullStats => "pull_stats_for_interval_modal",
            Self::DrawStats => "draw_stats_for_interval_modal",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Idle,
    AwaitingSubmission,
    Processing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    ShortcutInvoked,
    SubmissionAccepted,
    SubmissionRejected { reason: String },
    ReportDelivered,
    ProcessingFailed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    OpenIntervalModal,
    ProcessChannelHistory,
    PersistDailyStats,
    SendReport,
    NotifyUserOfError,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
