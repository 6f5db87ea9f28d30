use std::time::Duration;

use thiserror::Error;

use crate::escalation::EscalationTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    EscalationTransition(#[from] EscalationTransitionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout { operation: operation.into(), after }
    }

    pub fn integration(error: impl std::fmt::Display) -> Self {
        Self::Integration(error.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn configuration(error: impl std::fmt::Display) -> Self {
        Self::Configuration(error.to_string())
    }
}

/// Caller-facing classification of a failure, tagged with the request's correlation id.
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
                "A dependency is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "The assistant is misconfigured. Check its configuration.",
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

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Domain(error) => {
                InterfaceError::BadRequest { message: error.to_string(), correlation_id }
            }
            Self::InvalidInput(message) => InterfaceError::BadRequest { message, correlation_id },
            Self::Integration(message) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
            timeout @ Self::Timeout { .. } => {
                InterfaceError::ServiceUnavailable { message: timeout.to_string(), correlation_id }
            }
            Self::Configuration(message) => InterfaceError::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::escalation::{EscalationEvent, EscalationState, EscalationTransitionError};

    #[test]
    fn escalation_transition_error_is_a_bad_request() {
        let interface = ApplicationError::from(DomainError::from(
            EscalationTransitionError::InvalidTransition {
                state: EscalationState::Idle,
                event: EscalationEvent::TicketCreated,
            },
        ))
        .into_interface("req-1");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert_eq!(interface.correlation_id(), "req-1");
    }

    #[test]
    fn invalid_input_has_user_safe_message() {
        let interface =
            ApplicationError::invalid_input("no catalog file given").into_interface("req-2");

        assert_eq!(interface.to_string(), "bad request: no catalog file given");
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn timeout_maps_to_service_unavailable() {
        let error = ApplicationError::timeout("ticket creation", Duration::from_secs(10));
        assert_eq!(error.to_string(), "ticket creation timed out after 10s");

        let interface = error.into_interface("req-3");
        assert!(matches!(
            interface,
            InterfaceError::ServiceUnavailable { ref message, .. } if message.contains("10s")
        ));
    }

    #[test]
    fn integration_error_maps_to_service_unavailable() {
        let interface = ApplicationError::integration("catalog provider refused connection")
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-4");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::configuration("missing api key").into_interface("req-5");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(
            interface.user_message(),
            "The assistant is misconfigured. Check its configuration."
        );
    }
}
