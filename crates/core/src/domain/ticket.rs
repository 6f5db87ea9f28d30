use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Handed to the ticketing collaborator once escalation is confirmed and described.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRequest {
    pub issue: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_id: Option<String>,
    pub conversation_excerpt: String,
}

impl TicketRequest {
    pub fn new(
        issue: impl Into<String>,
        customer: Option<&CustomerProfile>,
        conversation_excerpt: impl Into<String>,
    ) -> Self {
        Self {
            issue: issue.into(),
            customer_name: customer.and_then(|profile| profile.name.clone()),
            customer_email: customer.and_then(|profile| profile.email.clone()),
            customer_id: customer.and_then(|profile| profile.id.clone()),
            conversation_excerpt: conversation_excerpt.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReceipt {
    pub success: bool,
    pub ticket_id: Option<String>,
    pub error: Option<String>,
}

impl TicketReceipt {
    pub fn created(ticket_id: impl Into<String>) -> Self {
        Self { success: true, ticket_id: Some(ticket_id.into()), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, ticket_id: None, error: Some(error.into()) }
    }
}
