use std::sync::Arc;
use std::time::Duration;

use cartwise_core::catalog::Catalog;
use cartwise_core::config::AppConfig;
use cartwise_core::domain::conversation::{Conversation, ConversationTurn};
use cartwise_core::domain::product::Product;
use cartwise_core::domain::recommendation::ExtractedRecommendation;
use cartwise_core::domain::ticket::CustomerProfile;
use cartwise_core::errors::ApplicationError;
use cartwise_core::escalation::{
    EscalationMachine, TICKET_CONFIRMATION, TICKET_FAILURE_APOLOGY, TICKET_ISSUE_PROMPT,
};
use cartwise_core::recommendations::{RecommendationExtractor, RecommendationMerger};
use cartwise_core::retrieval::CandidateSelector;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::collaborators::{CatalogProvider, TicketService};
use crate::escalation::{EscalationOutcome, TicketEscalator};
use crate::intent::IntentExtractor;
use crate::llm::{CompletionOptions, LlmClient};
use crate::prompt::PromptBuilder;

/// Sent when the reply capability is missing, fails, or misses its deadline.
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I'm having trouble answering right now. Please try again in a moment.";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub customer: Option<CustomerProfile>,
    /// Explicit issue description for ticket escalation.
    #[serde(default)]
    pub issue: Option<String>,
    /// Order lookups, store policies and similar text passed through to the prompt.
    #[serde(default)]
    pub context_blocks: Vec<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issue = Some(issue.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    pub recommendations: Vec<ExtractedRecommendation>,
    pub ticket_created: bool,
}

enum ReplySource {
    Model(String),
    Fallback,
}

/// Per-request pipeline: intent, retrieval, reply, extraction, merge, escalation.
///
/// Holds only read-only collaborators; every request works on its own catalog snapshot.
#[derive(Clone)]
pub struct AssistantRuntime {
    llm: Option<Arc<dyn LlmClient>>,
    catalog: Arc<dyn CatalogProvider>,
    intent: IntentExtractor,
    selector: CandidateSelector,
    prompt: PromptBuilder,
    extractor: Arc<RecommendationExtractor>,
    merger: RecommendationMerger,
    escalator: TicketEscalator,
    reply_options: CompletionOptions,
    reply_timeout: Duration,
    max_history_turns: usize,
}

impl AssistantRuntime {
    pub fn new(
        config: &AppConfig,
        llm: Option<Arc<dyn LlmClient>>,
        catalog: Arc<dyn CatalogProvider>,
        tickets: Arc<dyn TicketService>,
    ) -> Self {
        let intent = if config.retrieval.use_llm_intent {
            IntentExtractor::new(
                llm.clone(),
                CompletionOptions {
                    temperature: config.llm.temperature,
                    max_tokens: config.llm.intent_max_tokens,
                },
            )
        } else {
            IntentExtractor::keyword_only()
        };
        let escalator = TicketEscalator::new(
            EscalationMachine::new(config.escalation.policy()),
            tickets,
            Duration::from_secs(config.escalation.ticket_timeout_secs),
        );

        Self {
            llm,
            catalog,
            intent,
            selector: config.retrieval.candidate_selector(),
            prompt: PromptBuilder::default(),
            extractor: Arc::new(RecommendationExtractor::new()),
            merger: RecommendationMerger::new(config.runtime.max_recommendations),
            escalator,
            reply_options: CompletionOptions {
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
            },
            reply_timeout: Duration::from_secs(config.runtime.reply_timeout_secs),
            max_history_turns: config.runtime.max_history_turns,
        }
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_extractor(mut self, extractor: RecommendationExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Always produces a response; upstream failures degrade to documented fallbacks.
    pub async fn handle_message(&self, request: ChatRequest) -> ChatResponse {
        let correlation_id = Uuid::new_v4().to_string();
        let correlation_id = correlation_id.as_str();
        let history = Conversation::from_turns(request.history, self.max_history_turns);
        let message = request.message.trim();

        let (intent, products) = tokio::join!(
            self.intent.extract(message, correlation_id),
            self.fetch_catalog(correlation_id)
        );
        let catalog = Catalog::new(products);

        let selection = self.selector.select(catalog.products(), message, &intent.intent, None);
        let prompt =
            self.prompt.build(&selection.products, &history, &request.context_blocks, message);

        let (reply, escalation) = tokio::join!(
            self.generate_reply(&prompt, correlation_id),
            self.escalator.escalate(
                &history,
                message,
                request.issue.as_deref(),
                request.customer.as_ref(),
                correlation_id,
            )
        );

        let (mut text, recommendations) = match reply {
            ReplySource::Model(reply) => {
                let extraction = self.extractor.extract(&reply, &catalog);
                let merged = self.merger.merge(&selection.scored, &extraction.recommendations);
                (extraction.cleaned_text, merged)
            }
            ReplySource::Fallback => (FALLBACK_REPLY.to_string(), Vec::new()),
        };

        if let Some(notice) = escalation_notice(&escalation) {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(notice);
        }

        info!(
            event_name = "chat.handled",
            correlation_id,
            intent_source = ?intent.source,
            strategy = ?selection.strategy,
            candidates = selection.products.len(),
            recommendations = recommendations.len(),
            ticket_created = escalation.ticket_created(),
            "chat message handled"
        );

        ChatResponse {
            message: text,
            recommendations,
            ticket_created: escalation.ticket_created(),
        }
    }

    async fn fetch_catalog(&self, correlation_id: &str) -> Vec<Product> {
        let fetched = tokio::time::timeout(self.reply_timeout, self.catalog.all_products()).await;
        let error = match fetched {
            Ok(Ok(products)) => return products,
            Ok(Err(error)) => ApplicationError::integration(error),
            Err(_) => ApplicationError::timeout("catalog fetch", self.reply_timeout),
        };
        warn!(
            event_name = "catalog.unavailable",
            correlation_id,
            error = %error,
            "catalog fetch failed, continuing with an empty catalog"
        );
        Vec::new()
    }

    async fn generate_reply(&self, prompt: &str, correlation_id: &str) -> ReplySource {
        let Some(llm) = &self.llm else {
            return ReplySource::Fallback;
        };
        let completion = llm.complete(prompt, self.reply_options);
        match tokio::time::timeout(self.reply_timeout, completion).await {
            Ok(Ok(reply)) if !reply.trim().is_empty() => ReplySource::Model(reply),
            Ok(Ok(_)) => {
                warn!(event_name = "reply.empty", correlation_id, "model returned an empty reply");
                ReplySource::Fallback
            }
            Ok(Err(error)) => {
                warn!(
                    event_name = "reply.failed",
                    correlation_id,
                    error = %ApplicationError::integration(error),
                    "model reply failed"
                );
                ReplySource::Fallback
            }
            Err(_) => {
                warn!(
                    event_name = "reply.timeout",
                    correlation_id,
                    error = %ApplicationError::timeout("model reply", self.reply_timeout),
                    "model reply timed out"
                );
                ReplySource::Fallback
            }
        }
    }
}

fn escalation_notice(outcome: &EscalationOutcome) -> Option<&'static str> {
    match outcome {
        EscalationOutcome::NotRequested => None,
        EscalationOutcome::AwaitingIssue => Some(TICKET_ISSUE_PROMPT),
        EscalationOutcome::Created { .. } => Some(TICKET_CONFIRMATION),
        EscalationOutcome::Failed { .. } => Some(TICKET_FAILURE_APOLOGY),
    }
}
