//! Async orchestration for the shopping assistant.
//!
//! Wires the deterministic pieces of `cartwise-core` to the outside world:
//! - `llm`: the text-completion capability and its HTTP implementation
//! - `intent`: model-backed intent extraction with a keyword fallback
//! - `collaborators`: catalog and ticketing seams plus in-process implementations
//! - `prompt`: prompt assembly from candidates, context and history
//! - `escalation`: ticket creation raced against a deadline
//! - `runtime`: the per-request pipeline producing `{message, recommendations, ticketCreated}`
//!
//! The model only writes prose. Candidate selection, recommendation validation and
//! escalation decisions stay deterministic and catalog-bound.

pub mod collaborators;
pub mod escalation;
pub mod intent;
pub mod llm;
pub mod prompt;
pub mod runtime;

pub use collaborators::{
    CatalogProvider, InMemoryCatalog, JsonFileCatalog, RecordingTicketService, TicketService,
};
pub use escalation::{EscalationOutcome, TicketEscalator};
pub use intent::{IntentExtractor, IntentOutcome, IntentSource};
pub use llm::{CompletionOptions, HttpLlmClient, LlmClient};
pub use prompt::PromptBuilder;
pub use runtime::{AssistantRuntime, ChatRequest, ChatResponse, FALLBACK_REPLY};
