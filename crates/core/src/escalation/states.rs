use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    /// No ticket has been offered for the current issue.
    #[default]
    Idle,
    Offered,
    Confirmed,
    /// Terminal for the issue; the next issue starts again at `Idle`.
    Created,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationEvent {
    OfferDetected,
    ConfirmationReceived,
    TicketCreated,
    TicketFailed,
    NewIssueStarted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EscalationContext {
    pub issue: Option<String>,
}

impl EscalationContext {
    pub fn with_issue(issue: Option<String>) -> Self {
        Self { issue }
    }

    pub fn has_issue(&self) -> bool {
        self.issue.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationAction {
    PromptForIssue,
    CreateTicket,
    AppendConfirmation,
    Apologize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: EscalationState,
    pub to: EscalationState,
    pub event: EscalationEvent,
    pub actions: Vec<EscalationAction>,
}
