use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cartwise_agent::collaborators::{InMemoryCatalog, RecordingTicketService};
use cartwise_agent::llm::{CompletionOptions, LlmClient};
use cartwise_agent::runtime::{AssistantRuntime, ChatRequest};
use cartwise_core::config::ConfigOverrides;
use cartwise_core::domain::conversation::ConversationTurn;
use cartwise_core::errors::ApplicationError;
use clap::Args;

use crate::commands::{
    async_runtime, catalog_path, load_catalog, load_config, model_client, CommandResult,
};

const COMMAND: &str = "chat";

#[derive(Debug, Clone, Args)]
pub struct ChatArgs {
    #[arg(long, help = "JSON product catalog")]
    pub catalog: Option<PathBuf>,
    #[arg(long, help = "Customer message")]
    pub message: String,
    #[arg(long, help = "JSON array of prior turns: [{\"role\": \"user\", \"content\": \"...\"}]")]
    pub history: Option<PathBuf>,
    #[arg(long, help = "Explicit issue description for ticket escalation")]
    pub issue: Option<String>,
    #[arg(long, help = "Use this assistant reply instead of calling the model")]
    pub reply: Option<String>,
}

/// Stands in for the model when the operator scripts the reply.
struct ScriptedReply(String);

#[async_trait]
impl LlmClient for ScriptedReply {
    async fn complete(&self, _prompt: &str, _options: CompletionOptions) -> Result<String> {
        Ok(self.0.clone())
    }
}

pub fn run(args: ChatArgs) -> CommandResult {
    let overrides = ConfigOverrides {
        catalog_path: args.catalog.clone(),
        use_llm_intent: args.reply.as_ref().map(|_| false),
        ..ConfigOverrides::default()
    };
    let config = match load_config(COMMAND, overrides) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let path = match catalog_path(COMMAND, args.catalog.as_deref(), &config) {
        Ok(path) => path,
        Err(result) => return result,
    };
    let history = match args.history.as_deref().map(read_history).transpose() {
        Ok(history) => history.unwrap_or_default(),
        Err(error) => {
            return CommandResult::from_error(
                COMMAND,
                "history_read",
                ApplicationError::invalid_input(format!("{error:#}")),
                4,
            );
        }
    };
    let runtime = match async_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let llm: Option<Arc<dyn LlmClient>> = match &args.reply {
        Some(reply) => Some(Arc::new(ScriptedReply(reply.clone()))),
        None => model_client(&config),
    };

    let mut request = ChatRequest::new(args.message).with_history(history);
    request.issue = args.issue;

    let result = runtime.block_on(async {
        let products = load_catalog(COMMAND, &path).await?;
        let assistant = AssistantRuntime::new(
            &config,
            llm,
            Arc::new(InMemoryCatalog::new(products)),
            Arc::new(RecordingTicketService::new()),
        );
        Ok::<_, CommandResult>(assistant.handle_message(request).await)
    });

    match result {
        Ok(response) => CommandResult::success_with_data(COMMAND, response),
        Err(result) => result,
    }
}

fn read_history(path: &Path) -> Result<Vec<ConversationTurn>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read history file `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("history file `{}` is not a JSON array of turns", path.display()))
}
