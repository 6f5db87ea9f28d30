use std::fs;
use std::path::PathBuf;

use cartwise_core::catalog::Catalog;
use cartwise_core::config::ConfigOverrides;
use cartwise_core::domain::recommendation::{ExtractedRecommendation, MatchStrategy};
use cartwise_core::errors::ApplicationError;
use cartwise_core::recommendations::RecommendationExtractor;
use clap::Args;
use serde::Serialize;

use crate::commands::{async_runtime, catalog_path, load_catalog, load_config, CommandResult};

const COMMAND: &str = "extract";

#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    #[arg(long, help = "JSON product catalog the reply is validated against")]
    pub catalog: Option<PathBuf>,
    #[arg(long, conflicts_with = "reply_file", help = "Assistant reply text")]
    pub reply: Option<String>,
    #[arg(long, help = "File containing the assistant reply")]
    pub reply_file: Option<PathBuf>,
    #[arg(long, help = "Only honor PRODUCT_RECOMMENDATION tags")]
    pub tagged_only: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractionReport {
    cleaned_text: String,
    recommendations: Vec<ProvenancedRecommendation>,
}

#[derive(Debug, Serialize)]
struct ProvenancedRecommendation {
    #[serde(flatten)]
    recommendation: ExtractedRecommendation,
    strategy: Option<MatchStrategy>,
}

pub fn run(args: ExtractArgs) -> CommandResult {
    let reply = match (&args.reply, &args.reply_file) {
        (Some(reply), _) => reply.clone(),
        (None, Some(path)) => match fs::read_to_string(path) {
            Ok(reply) => reply,
            Err(error) => {
                return CommandResult::from_error(
                    COMMAND,
                    "reply_read",
                    ApplicationError::invalid_input(format!(
                        "could not read reply file `{}`: {error}",
                        path.display()
                    )),
                    4,
                );
            }
        },
        (None, None) => {
            return CommandResult::from_error(
                COMMAND,
                "missing_reply",
                ApplicationError::invalid_input("pass --reply or --reply-file"),
                2,
            );
        }
    };

    let overrides =
        ConfigOverrides { catalog_path: args.catalog.clone(), ..ConfigOverrides::default() };
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
    let products = match runtime.block_on(load_catalog(COMMAND, &path)) {
        Ok(products) => products,
        Err(result) => return result,
    };

    let extractor = if args.tagged_only {
        RecommendationExtractor::tagged_only()
    } else {
        RecommendationExtractor::new()
    };
    let extraction = extractor.extract(&reply, &Catalog::new(products));

    CommandResult::success_with_data(
        COMMAND,
        ExtractionReport {
            cleaned_text: extraction.cleaned_text,
            recommendations: extraction
                .recommendations
                .into_iter()
                .map(|recommendation| ProvenancedRecommendation {
                    strategy: recommendation.strategy,
                    recommendation,
                })
                .collect(),
        },
    )
}
