pub mod engine;
pub mod states;

pub use engine::{
    EscalationAssessment, EscalationMachine, EscalationPolicy, EscalationTransitionError,
    TICKET_CONFIRMATION, TICKET_FAILURE_APOLOGY, TICKET_ISSUE_PROMPT,
};
pub use states::{
    EscalationAction, EscalationContext, EscalationEvent, EscalationState, TransitionOutcome,
};
