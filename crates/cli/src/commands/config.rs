use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cartwise_core::config::{AppConfig, LoadOptions};
use cartwise_core::errors::ApplicationError;
use toml::Value;

use crate::commands::CommandResult;

const COMMAND: &str = "config";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::from_error(
                COMMAND,
                "config_validation",
                ApplicationError::configuration(format!("config validation failed: {error}")),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let catalog_path = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());

    let entries = [
        ("llm.enabled", config.llm.enabled.to_string(), "CARTWISE_LLM_ENABLED"),
        ("llm.provider", config.llm.provider.as_str().to_string(), "CARTWISE_LLM_PROVIDER"),
        ("llm.model", config.llm.model.clone(), "CARTWISE_LLM_MODEL"),
        (
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            "CARTWISE_LLM_BASE_URL",
        ),
        ("llm.api_key", llm_api_key.to_string(), "CARTWISE_LLM_API_KEY"),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), "CARTWISE_LLM_TIMEOUT_SECS"),
        (
            "retrieval.passthrough_threshold",
            config.retrieval.passthrough_threshold.to_string(),
            "CARTWISE_RETRIEVAL_PASSTHROUGH_THRESHOLD",
        ),
        (
            "retrieval.use_llm_intent",
            config.retrieval.use_llm_intent.to_string(),
            "CARTWISE_RETRIEVAL_USE_LLM_INTENT",
        ),
        (
            "escalation.ticket_timeout_secs",
            config.escalation.ticket_timeout_secs.to_string(),
            "CARTWISE_ESCALATION_TICKET_TIMEOUT_SECS",
        ),
        (
            "escalation.min_prior_turns",
            config.escalation.min_prior_turns.to_string(),
            "CARTWISE_ESCALATION_MIN_PRIOR_TURNS",
        ),
        (
            "runtime.reply_timeout_secs",
            config.runtime.reply_timeout_secs.to_string(),
            "CARTWISE_RUNTIME_REPLY_TIMEOUT_SECS",
        ),
        (
            "runtime.max_recommendations",
            config.runtime.max_recommendations.to_string(),
            "CARTWISE_RUNTIME_MAX_RECOMMENDATIONS",
        ),
        ("catalog.path", catalog_path, "CARTWISE_CATALOG_PATH"),
        ("logging.level", config.logging.level.clone(), "CARTWISE_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "CARTWISE_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .iter()
            .map(|(key, value, env_key)| render_line(key, value, source(*key, *env_key))),
    );

    CommandResult::success(COMMAND, lines.join("\n"))
}

fn detect_config_path() -> Option<PathBuf> {
    ["cartwise.toml", "config/cartwise.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
