use thiserror::Error;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("slack api failure: {0}")]
    Transport(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
}

impl ApplicationError {
    /// Maps the failure to what a Slack user may see, tagged with the envelope's correlation id.
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Validation(message) => InterfaceError::BadRequest { message, correlation_id },
            Self::Transport(message) | Self::Persistence(message) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
            Self::FlowTransition(error) => {
                InterfaceError::Internal { message: error.to_string(), correlation_id }
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "Slack or the stats store is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    /// Text shown after ":x: Sorry, I couldn't process your request:". Only validation
    /// messages are shown verbatim.
    pub fn user_detail(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } if !message.trim().is_empty() => message,
            other => other.user_message(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, InterfaceError};
    use crate::flows::{FlowEvent, FlowState, FlowType, StatsFlow};

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface =
            ApplicationError::Validation("channel is required".to_owned()).into_interface("env-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "env-1"
        ));
        assert_eq!(interface.correlation_id(), "env-1");
    }

    #[test]
    fn validation_detail_is_shown_verbatim_to_users() {
        let interface = ApplicationError::Validation("invalid start date: 2025-13-01".to_owned())
            .into_interface("env-1");
        assert_eq!(interface.user_detail(), "invalid start date: 2025-13-01");

        let blank = ApplicationError::Validation("  ".to_owned()).into_interface("env-1");
        assert_eq!(blank.user_detail(), blank.user_message());
    }

    #[test]
    fn persistence_and_transport_errors_map_to_service_unavailable() {
        for error in [
            ApplicationError::Persistence("database is locked".to_owned()),
            ApplicationError::Transport("channel_not_found".to_owned()),
        ] {
            let interface = error.into_interface("env-2");
            assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
            assert!(!interface.user_detail().contains("database is locked"));
            assert!(!interface.user_detail().contains("channel_not_found"));
        }
    }

    #[test]
    fn flow_transition_error_maps_to_internal() {
        let flow = StatsFlow::new(FlowType::PullStats);
        let error = flow
            .apply(FlowState::Idle, &FlowEvent::ReportDelivered)
            .expect_err("report cannot be delivered from idle");
        let interface = ApplicationError::from(error).into_interface("env-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_detail(), "An unexpected internal error occurred.");
    }
}
