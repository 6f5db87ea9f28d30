use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::debug;

use crate::domain::conversation::Conversation;
use crate::domain::ticket::{CustomerProfile, TicketRequest};
use crate::escalation::states::{
    EscalationAction, EscalationContext, EscalationEvent, EscalationState, TransitionOutcome,
};
use crate::text::truncate_chars;

pub const TICKET_CONFIRMATION: &str =
    "I've created a support ticket for you. Our support team will follow up with you shortly.";

pub const TICKET_FAILURE_APOLOGY: &str = "I'm sorry, I wasn't able to create a support ticket right now. \
     Please try again in a few minutes or contact our support team directly.";

pub const TICKET_ISSUE_PROMPT: &str =
    "Happy to open a ticket. Could you describe the issue in a bit more detail first?";

static OFFER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(would you like|do you want|shall i|should i|want me to|can i|may i)\b[^.?!]*\b(create|open|submit|file|raise|log)\b[^.?!]*\b(ticket|support request|case)\b",
        r"\b(would you like|do you want|shall i|should i|want me to)\b[^.?!]*\b(escalate|connect you|forward)\b[^.?!]*\b(support|human|team|agent)\b",
    ]
    .iter()
    .map(|pattern| {
        RegexBuilder::new(pattern).case_insensitive(true).build().expect("offer pattern is valid")
    })
    .collect()
});

static AFFIRMATIVE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r"\b(yes|yeah|yep|yup|sure|ok|okay|please|absolutely|definitely|go ahead|do it|sounds good|that would help)\b",
    )
    .case_insensitive(true)
    .build()
    .expect("affirmative pattern is valid")
});

static TICKET_WORD: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"\b(ticket|support|help|issue|create|open|submit|file|raise|one)\b")
        .case_insensitive(true)
        .build()
        .expect("ticket word pattern is valid")
});

/// Explicit refusals only; problem descriptions often contain "not" or "never".
static REFUSAL: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r"^\W*(no|nope|nah)\b|\b(don't|dont|do not)\s+(create|open|submit|file|raise|make|need|want)\b|\b(cancel|nevermind|never mind)\b",
    )
    .case_insensitive(true)
    .build()
    .expect("refusal pattern is valid")
});

const BARE_AFFIRMATIVE_MAX_WORDS: usize = 4;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EscalationTransitionError {
    #[error("an issue description is required before leaving {state:?}")]
    MissingIssueDescription { state: EscalationState },
    #[error("invalid escalation transition from {state:?} using event {event:?}")]
    InvalidTransition { state: EscalationState, event: EscalationEvent },
}

/// Tunables for deriving escalation state from a transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub min_prior_turns: usize,
    /// Issue descriptions must be strictly longer than this, after trimming.
    pub min_issue_chars: usize,
    pub max_issue_chars: usize,
    pub excerpt_turns: usize,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self { min_prior_turns: 2, min_issue_chars: 10, max_issue_chars: 1000, excerpt_turns: 6 }
    }
}

/// Escalation state recomputed for one incoming message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscalationAssessment {
    pub state: EscalationState,
    pub issue: Option<String>,
    pub actions: Vec<EscalationAction>,
}

impl EscalationAssessment {
    fn idle() -> Self {
        Self { state: EscalationState::Idle, issue: None, actions: Vec::new() }
    }

    pub fn should_create_ticket(&self) -> bool {
        self.state == EscalationState::Confirmed
            && self.issue.is_some()
            && self.actions.contains(&EscalationAction::CreateTicket)
    }
}

#[derive(Clone, Debug, Default)]
pub struct EscalationMachine {
    policy: EscalationPolicy,
}

impl EscalationMachine {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    pub fn initial_state(&self) -> EscalationState {
        EscalationState::Idle
    }

    pub fn apply(
        &self,
        current: EscalationState,
        event: EscalationEvent,
        context: &EscalationContext,
    ) -> Result<TransitionOutcome, EscalationTransitionError> {
        transition(current, event, context)
    }

    /// Derives the state from the prior turns and the current message.
    ///
    /// Only the most recent assistant turn is inspected for an offer; histories that
    /// offered tickets for several unrelated issues are not told apart.
    pub fn assess(
        &self,
        history: &Conversation,
        message: &str,
        explicit_issue: Option<&str>,
    ) -> EscalationAssessment {
        if history.len() < self.policy.min_prior_turns {
            return EscalationAssessment::idle();
        }
        let Some(last_reply) = history.last_assistant() else {
            return EscalationAssessment::idle();
        };
        if !is_offer(&last_reply.content) {
            return EscalationAssessment::idle();
        }

        let context = EscalationContext::default();
        let Ok(offered) = self.apply(self.initial_state(), EscalationEvent::OfferDetected, &context)
        else {
            return EscalationAssessment::idle();
        };
        if !is_confirmation(message) {
            return EscalationAssessment {
                state: offered.to,
                issue: None,
                actions: offered.actions,
            };
        }

        let issue = self.describe_issue(explicit_issue, message, &last_reply.content);
        let context = EscalationContext::with_issue(issue);
        match self.apply(offered.to, EscalationEvent::ConfirmationReceived, &context) {
            Ok(confirmed) => {
                debug!(
                    event_name = "escalation.confirmed",
                    has_issue = context.has_issue(),
                    "ticket escalation confirmed"
                );
                EscalationAssessment {
                    state: confirmed.to,
                    issue: context.issue,
                    actions: confirmed.actions,
                }
            }
            Err(_) => {
                EscalationAssessment { state: offered.to, issue: None, actions: offered.actions }
            }
        }
    }

    /// Explicit issue, then the confirming message, then the assistant's last reply.
    pub fn describe_issue(
        &self,
        explicit_issue: Option<&str>,
        message: &str,
        last_reply: &str,
    ) -> Option<String> {
        [explicit_issue, Some(message), Some(last_reply)]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|candidate| candidate.chars().count() > self.policy.min_issue_chars)
            .map(|candidate| truncate_chars(candidate, self.policy.max_issue_chars))
    }

    pub fn ticket_request(
        &self,
        assessment: &EscalationAssessment,
        customer: Option<&CustomerProfile>,
        history: &Conversation,
    ) -> Option<TicketRequest> {
        if !assessment.should_create_ticket() {
            return None;
        }
        let issue = assessment.issue.as_deref()?;
        Some(TicketRequest::new(issue, customer, history.excerpt(self.policy.excerpt_turns)))
    }
}

pub fn is_offer(reply: &str) -> bool {
    OFFER_PATTERNS.iter().any(|pattern| pattern.is_match(reply))
}

/// Affirmative plus a ticket-ish word, or a short bare affirmative; never an explicit refusal.
pub fn is_confirmation(message: &str) -> bool {
    if REFUSAL.is_match(message) || !AFFIRMATIVE.is_match(message) {
        return false;
    }
    TICKET_WORD.is_match(message)
        || message.split_whitespace().count() <= BARE_AFFIRMATIVE_MAX_WORDS
}

fn transition(
    current: EscalationState,
    event: EscalationEvent,
    context: &EscalationContext,
) -> Result<TransitionOutcome, EscalationTransitionError> {
    use EscalationAction::{Apologize, AppendConfirmation, CreateTicket, PromptForIssue};
    use EscalationEvent::{
        ConfirmationReceived, NewIssueStarted, OfferDetected, TicketCreated, TicketFailed,
    };
    use EscalationState::{Confirmed, Created, Idle, Offered};

    let (to, actions) = match (current, event) {
        (Idle, OfferDetected) | (Created, OfferDetected) => (Offered, Vec::new()),
        (Offered, ConfirmationReceived) => {
            if context.has_issue() {
                (Confirmed, vec![CreateTicket])
            } else {
                (Confirmed, vec![PromptForIssue])
            }
        }
        (Confirmed, TicketCreated) => {
            if !context.has_issue() {
                return Err(EscalationTransitionError::MissingIssueDescription { state: current });
            }
            (Created, vec![AppendConfirmation])
        }
        (Confirmed, TicketFailed) => (Confirmed, vec![Apologize]),
        (_, NewIssueStarted) => (Idle, Vec::new()),
        _ => {
            return Err(EscalationTransitionError::InvalidTransition { state: current, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::{Conversation, ConversationTurn};
    use crate::domain::ticket::CustomerProfile;
    use crate::escalation::engine::{
        is_confirmation, is_offer, EscalationAssessment, EscalationMachine, EscalationPolicy,
        EscalationTransitionError,
    };
    use crate::escalation::states::{
        EscalationAction, EscalationContext, EscalationEvent, EscalationState,
    };

    const OFFER: &str =
        "I'm sorry about that. Would you like me to create a ticket for our support team?";

    fn offered_history() -> Conversation {
        Conversation::from_turns(
            vec![
                ConversationTurn::user("I need help, this isn't working"),
                ConversationTurn::assistant(OFFER),
            ],
            50,
        )
    }

    #[test]
    fn confirmed_escalation_with_issue_creates_ticket() {
        let machine = EscalationMachine::default();
        let history = offered_history();

        let assessment =
            machine.assess(&history, "yes please create one", Some("Order never arrived"));

        assert_eq!(assessment.state, EscalationState::Confirmed);
        assert_eq!(assessment.issue.as_deref(), Some("Order never arrived"));
        assert!(assessment.should_create_ticket());

        let customer = CustomerProfile {
            id: Some("cust-7".to_owned()),
            name: Some("Dana".to_owned()),
            email: Some("dana@example.com".to_owned()),
        };
        let request =
            machine.ticket_request(&assessment, Some(&customer), &history).expect("ticket request");
        assert_eq!(request.issue, "Order never arrived");
        assert_eq!(request.customer_email.as_deref(), Some("dana@example.com"));
        assert!(request.conversation_excerpt.contains("Customer: I need help"));

        let created = machine
            .apply(
                assessment.state,
                EscalationEvent::TicketCreated,
                &EscalationContext::with_issue(assessment.issue.clone()),
            )
            .expect("confirmed -> created");
        assert_eq!(created.to, EscalationState::Created);
        assert_eq!(created.actions, vec![EscalationAction::AppendConfirmation]);
    }

    #[test]
    fn escalation_waits_for_minimum_history() {
        let machine = EscalationMachine::default();
        let history =
            Conversation::from_turns(vec![ConversationTurn::assistant(OFFER)], 50);

        let assessment = machine.assess(&history, "yes please create a ticket", None);
        assert_eq!(assessment.state, EscalationState::Idle);
        assert!(!assessment.should_create_ticket());
    }

    #[test]
    fn no_offer_means_no_escalation() {
        let machine = EscalationMachine::default();
        let history = Conversation::from_turns(
            vec![
                ConversationTurn::user("Do you have caps?"),
                ConversationTurn::assistant("Yes, we have a Cap for $20."),
            ],
            50,
        );

        let assessment = machine.assess(&history, "yes please, open a ticket", None);
        assert_eq!(assessment.state, EscalationState::Idle);
    }

    #[test]
    fn offer_without_confirmation_stays_offered() {
        let machine = EscalationMachine::default();

        let assessment = machine.assess(&offered_history(), "no thanks, I'll wait", None);
        assert_eq!(assessment.state, EscalationState::Offered);
        assert!(assessment.actions.is_empty());
    }

    #[test]
    fn issue_falls_back_to_confirming_message_then_reply() {
        let machine = EscalationMachine::default();

        assert_eq!(
            machine.describe_issue(Some("  short  "), "yes please create one", OFFER).as_deref(),
            Some("yes please create one")
        );
        assert_eq!(machine.describe_issue(None, "yes", OFFER).as_deref(), Some(OFFER));
        assert_eq!(machine.describe_issue(None, "yes", "ok then"), None);
        assert_eq!(machine.describe_issue(Some("exactly10!"), "yes", "ok").as_deref(), None);
    }

    #[test]
    fn long_issues_are_truncated() {
        let machine = EscalationMachine::new(EscalationPolicy {
            max_issue_chars: 20,
            ..EscalationPolicy::default()
        });
        let issue = machine.describe_issue(Some(&"x".repeat(50)), "yes", "").expect("issue");
        assert_eq!(issue.chars().count(), 20);
    }

    #[test]
    fn confirmation_without_issue_prompts_for_details() {
        let machine = EscalationMachine::default();
        let outcome = machine
            .apply(
                EscalationState::Offered,
                EscalationEvent::ConfirmationReceived,
                &EscalationContext::default(),
            )
            .expect("offered -> confirmed");
        assert_eq!(outcome.to, EscalationState::Confirmed);
        assert_eq!(outcome.actions, vec![EscalationAction::PromptForIssue]);

        let assessment = EscalationAssessment {
            state: outcome.to,
            issue: None,
            actions: outcome.actions,
        };
        assert!(!assessment.should_create_ticket());
        assert!(machine.ticket_request(&assessment, None, &offered_history()).is_none());
    }

    #[test]
    fn created_requires_confirmation_first() {
        let machine = EscalationMachine::default();
        let context = EscalationContext::with_issue(Some("Order never arrived".to_owned()));

        for state in [EscalationState::Idle, EscalationState::Offered] {
            let error = machine
                .apply(state, EscalationEvent::TicketCreated, &context)
                .expect_err("ticket creation needs a confirmed escalation");
            assert!(matches!(error, EscalationTransitionError::InvalidTransition { .. }));
        }

        let error = machine
            .apply(
                EscalationState::Confirmed,
                EscalationEvent::TicketCreated,
                &EscalationContext::default(),
            )
            .expect_err("issue required");
        assert!(matches!(error, EscalationTransitionError::MissingIssueDescription { .. }));
    }

    #[test]
    fn failed_ticket_stays_confirmed_and_apologizes() {
        let machine = EscalationMachine::default();
        let outcome = machine
            .apply(
                EscalationState::Confirmed,
                EscalationEvent::TicketFailed,
                &EscalationContext::default(),
            )
            .expect("confirmed -> confirmed");

        assert_eq!(outcome.to, EscalationState::Confirmed);
        assert_eq!(outcome.actions, vec![EscalationAction::Apologize]);
    }

    #[test]
    fn new_issue_restarts_from_created() {
        let machine = EscalationMachine::default();
        let outcome = machine
            .apply(
                EscalationState::Created,
                EscalationEvent::NewIssueStarted,
                &EscalationContext::default(),
            )
            .expect("created -> idle");
        assert_eq!(outcome.to, EscalationState::Idle);
    }

    #[test]
    fn offer_and_confirmation_phrasing() {
        assert!(is_offer(OFFER));
        assert!(is_offer("Should I open a support request for this?"));
        assert!(is_offer("Do you want me to escalate this to our support team?"));
        assert!(!is_offer("Here are some jackets you might like."));

        assert!(is_confirmation("yes please create one"));
        assert!(is_confirmation("Sure, open a ticket"));
        assert!(is_confirmation("yes please"));
        assert!(!is_confirmation("no, don't open a ticket"));
        assert!(!is_confirmation("the cap looks nice, what colors does it come in"));
        assert!(!is_confirmation("Nope, never mind"));
        assert!(!is_confirmation("Please do not create a ticket yet"));
    }

    #[test]
    fn confirmations_describing_the_problem_are_accepted() {
        assert!(is_confirmation("Yes please create a ticket, my order never arrived"));
        assert!(is_confirmation("yes, open a support ticket - the app is not working"));
        assert!(is_confirmation("Sure, I need help, I don't have my package"));
    }

    #[test]
    fn negated_problem_description_still_creates_ticket() {
        let assessment = EscalationMachine::default().assess(
            &offered_history(),
            "Yes please create a ticket, my order never arrived",
            None,
        );

        assert!(assessment.should_create_ticket());
        assert_eq!(
            assessment.issue.as_deref(),
            Some("Yes please create a ticket, my order never arrived")
        );
    }
}
