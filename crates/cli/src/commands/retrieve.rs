use std::path::PathBuf;

use cartwise_agent::intent::IntentExtractor;
use cartwise_agent::llm::CompletionOptions;
use cartwise_core::config::ConfigOverrides;
use cartwise_core::domain::intent::QueryIntent;
use cartwise_core::retrieval::SelectionStrategy;
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::commands::{
    async_runtime, catalog_path, load_catalog, load_config, model_client, CommandResult,
};

const COMMAND: &str = "retrieve";

#[derive(Debug, Clone, Args)]
pub struct RetrieveArgs {
    #[arg(long, help = "JSON product catalog (array or {\"products\": [...]})")]
    pub catalog: Option<PathBuf>,
    #[arg(long, help = "Customer message to retrieve candidates for")]
    pub message: String,
    #[arg(long, help = "Override the intent budget")]
    pub max: Option<usize>,
    #[arg(long, help = "Skip the model and build the intent from keywords")]
    pub keyword_intent: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalReport {
    intent: QueryIntent,
    intent_source: String,
    strategy: SelectionStrategy,
    budget: usize,
    catalog_size: usize,
    candidates: Vec<CandidateLine>,
}

#[derive(Debug, Serialize)]
struct CandidateLine {
    id: String,
    name: String,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
}

pub fn run(args: RetrieveArgs) -> CommandResult {
    let overrides = ConfigOverrides {
        catalog_path: args.catalog.clone(),
        use_llm_intent: args.keyword_intent.then_some(false),
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
    let runtime = match async_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let extractor = if config.retrieval.use_llm_intent {
        IntentExtractor::new(
            model_client(&config),
            CompletionOptions {
                temperature: config.llm.temperature,
                max_tokens: config.llm.intent_max_tokens,
            },
        )
    } else {
        IntentExtractor::keyword_only()
    };

    let result = runtime.block_on(async {
        let products = load_catalog(COMMAND, &path).await?;
        let correlation_id = Uuid::new_v4().to_string();
        let outcome = extractor.extract(&args.message, &correlation_id).await;
        Ok::<_, CommandResult>((products, outcome))
    });
    let (products, outcome) = match result {
        Ok(loaded) => loaded,
        Err(result) => return result,
    };

    let selection = config.retrieval.candidate_selector().select(
        &products,
        &args.message,
        &outcome.intent,
        args.max,
    );

    let candidates = if selection.scored.is_empty() {
        selection
            .products
            .iter()
            .map(|product| CandidateLine {
                id: product.id.to_string(),
                name: product.name.clone(),
                price: product.price,
                score: None,
            })
            .collect()
    } else {
        selection
            .scored
            .iter()
            .map(|candidate| CandidateLine {
                id: candidate.product.id.to_string(),
                name: candidate.product.name.clone(),
                price: candidate.product.price,
                score: Some(candidate.score),
            })
            .collect()
    };

    CommandResult::success_with_data(
        COMMAND,
        RetrievalReport {
            intent: outcome.intent,
            intent_source: format!("{:?}", outcome.source).to_ascii_lowercase(),
            strategy: selection.strategy,
            budget: selection.budget,
            catalog_size: products.len(),
            candidates,
        },
    )
}
