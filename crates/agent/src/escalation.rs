use std::sync::Arc;
use std::time::Duration;

use cartwise_core::domain::conversation::Conversation;
use cartwise_core::domain::ticket::CustomerProfile;
use cartwise_core::errors::{ApplicationError, DomainError};
use cartwise_core::escalation::{
    EscalationAction, EscalationContext, EscalationEvent, EscalationMachine, EscalationState,
    TransitionOutcome,
};
use tracing::{info, warn};

use crate::collaborators::TicketService;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscalationOutcome {
    /// No confirmed escalation in this turn.
    NotRequested,
    /// Confirmed, but no usable issue description yet.
    AwaitingIssue,
    Created { ticket_id: Option<String> },
    Failed { reason: String },
}

impl EscalationOutcome {
    pub fn ticket_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Runs the escalation machine for one turn and races ticket creation against a timeout.
#[derive(Clone)]
pub struct TicketEscalator {
    machine: EscalationMachine,
    tickets: Arc<dyn TicketService>,
    timeout: Duration,
}

impl TicketEscalator {
    pub fn new(
        machine: EscalationMachine,
        tickets: Arc<dyn TicketService>,
        timeout: Duration,
    ) -> Self {
        Self { machine, tickets, timeout }
    }

    /// Never fails; collaborator errors and timeouts become `Failed`.
    pub async fn escalate(
        &self,
        history: &Conversation,
        message: &str,
        explicit_issue: Option<&str>,
        customer: Option<&CustomerProfile>,
        correlation_id: &str,
    ) -> EscalationOutcome {
        let assessment = self.machine.assess(history, message, explicit_issue);
        if assessment.state != EscalationState::Confirmed {
            return EscalationOutcome::NotRequested;
        }
        if assessment.actions.contains(&EscalationAction::PromptForIssue) {
            return EscalationOutcome::AwaitingIssue;
        }
        let Some(request) = self.machine.ticket_request(&assessment, customer, history) else {
            return EscalationOutcome::AwaitingIssue;
        };

        let context = EscalationContext::with_issue(assessment.issue.clone());
        let created = tokio::time::timeout(self.timeout, self.tickets.create_ticket(request)).await;
        let result = match created {
            Ok(Ok(receipt)) if receipt.success => Ok(receipt.ticket_id),
            Ok(Ok(receipt)) => Err(ApplicationError::integration(
                receipt.error.as_deref().unwrap_or("ticket service declined the request"),
            )),
            Ok(Err(error)) => Err(ApplicationError::integration(error)),
            Err(_) => Err(ApplicationError::timeout("ticket creation", self.timeout)),
        };

        match result {
            Ok(ticket_id) => {
                match self.advance(assessment.state, EscalationEvent::TicketCreated, &context) {
                    Ok(outcome) => info!(
                        event_name = "escalation.ticket_created",
                        correlation_id,
                        ticket_id = ticket_id.as_deref().unwrap_or("unknown"),
                        to = ?outcome.to,
                        actions = ?outcome.actions,
                        "support ticket created"
                    ),
                    Err(error) => warn!(
                        event_name = "escalation.transition_rejected",
                        correlation_id,
                        error = %error,
                        "ticket created outside a confirmed escalation"
                    ),
                }
                EscalationOutcome::Created { ticket_id }
            }
            Err(error) => {
                let transition = self
                    .advance(assessment.state, EscalationEvent::TicketFailed, &context)
                    .map(|outcome| (outcome.to, outcome.actions));
                warn!(
                    event_name = "escalation.ticket_failed",
                    correlation_id,
                    error = %error,
                    transition = ?transition,
                    "support ticket could not be created"
                );
                EscalationOutcome::Failed { reason: error.to_string() }
            }
        }
    }

    fn advance(
        &self,
        state: EscalationState,
        event: EscalationEvent,
        context: &EscalationContext,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.machine
            .apply(state, event, context)
            .map_err(|error| ApplicationError::from(DomainError::from(error)))
    }
}
