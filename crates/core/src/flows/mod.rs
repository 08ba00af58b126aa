pub mod engine;
pub mod states;

pub use engine::{FlowTransitionError, StatsFlow};
pub use states::{FlowAction, FlowEvent, FlowState, FlowType, TransitionOutcome};
