use thiserror::Error;

use crate::flows::states::{FlowAction, FlowEvent, FlowState, FlowType, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("event {event:?} is not valid in state {state:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

/// Transition table for the interval stats workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatsFlow {
    flow_type: FlowType,
}

impl StatsFlow {
    pub fn new(flow_type: FlowType) -> Self {
        Self { flow_type }
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow_type
    }

    pub fn initial_state(&self) -> FlowState {
        FlowState::Idle
    }

    pub fn apply(
        &self,
        current: FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let (to, actions) = match (current, event) {
            (FlowState::Idle, FlowEvent::ShortcutInvoked) => {
                (FlowState::AwaitingSubmission, vec![FlowAction::OpenIntervalModal])
            }
            (FlowState::AwaitingSubmission, FlowEvent::SubmissionAccepted) => {
                let actions = match self.flow_type {
                    FlowType::PullStats => vec![
                        FlowAction::ProcessChannelHistory,
                        FlowAction::PersistDailyStats,
                        FlowAction::SendReport,
                    ],
                    FlowType::DrawStats => vec![FlowAction::SendReport],
                };
                (FlowState::Processing, actions)
            }
            (FlowState::AwaitingSubmission, FlowEvent::SubmissionRejected { .. })
            | (FlowState::Processing, FlowEvent::ProcessingFailed { .. }) => {
                (FlowState::Idle, vec![FlowAction::NotifyUserOfError])
            }
            (FlowState::Processing, FlowEvent::ReportDelivered) => (FlowState::Idle, Vec::new()),
            (state, event) => {
                return Err(FlowTransitionError::InvalidTransition { state, event: event.clone() })
            }
        };

        Ok(TransitionOutcome { from: current, to, event: event.clone(), actions })
    }
}
