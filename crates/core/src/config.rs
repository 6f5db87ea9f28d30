use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::escalation::EscalationPolicy;
use crate::retrieval::{
    CandidateSelector, IntentBudgets, ScoreCalculator, ScoringWeights,
    DEFAULT_PASSTHROUGH_THRESHOLD,
};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub escalation: EscalationConfig,
    pub runtime: RuntimeConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub intent_max_tokens: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalConfig {
    pub passthrough_threshold: usize,
    pub use_llm_intent: bool,
    pub budgets: IntentBudgets,
    pub weights: ScoringWeights,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscalationConfig {
    pub min_prior_turns: usize,
    pub ticket_timeout_secs: u64,
    pub min_issue_chars: usize,
    pub max_issue_chars: usize,
    pub excerpt_turns: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub reply_timeout_secs: u64,
    pub max_history_turns: usize,
    pub max_recommendations: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(alias = "open_ai")]
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_enabled: Option<bool>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub passthrough_threshold: Option<usize>,
    pub use_llm_intent: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                enabled: true,
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                temperature: 0.7,
                max_tokens: 1024,
                intent_max_tokens: 256,
            },
            retrieval: RetrievalConfig {
                passthrough_threshold: DEFAULT_PASSTHROUGH_THRESHOLD,
                use_llm_intent: true,
                budgets: IntentBudgets::default(),
                weights: ScoringWeights::default(),
            },
            escalation: EscalationConfig::from(EscalationPolicy::default()),
            runtime: RuntimeConfig {
                reply_timeout_secs: 30,
                max_history_turns: 50,
                max_recommendations: 10,
            },
            catalog: CatalogConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl From<EscalationPolicy> for EscalationConfig {
    fn from(policy: EscalationPolicy) -> Self {
        Self {
            min_prior_turns: policy.min_prior_turns,
            ticket_timeout_secs: 10,
            min_issue_chars: policy.min_issue_chars,
            max_issue_chars: policy.max_issue_chars,
            excerpt_turns: policy.excerpt_turns,
        }
    }
}

impl EscalationConfig {
    pub fn policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            min_prior_turns: self.min_prior_turns,
            min_issue_chars: self.min_issue_chars,
            max_issue_chars: self.max_issue_chars,
            excerpt_turns: self.excerpt_turns,
        }
    }
}

impl RetrievalConfig {
    pub fn candidate_selector(&self) -> CandidateSelector {
        CandidateSelector::new(
            ScoreCalculator::with_weights(self.weights),
            self.budgets,
            self.passthrough_threshold,
        )
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cartwise.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(intent_max_tokens) = llm.intent_max_tokens {
                self.llm.intent_max_tokens = intent_max_tokens;
            }
        }

        if let Some(retrieval) = patch.retrieval {
            if let Some(passthrough_threshold) = retrieval.passthrough_threshold {
                self.retrieval.passthrough_threshold = passthrough_threshold;
            }
            if let Some(use_llm_intent) = retrieval.use_llm_intent {
                self.retrieval.use_llm_intent = use_llm_intent;
            }
            if let Some(budgets) = retrieval.budgets {
                self.retrieval.budgets = budgets;
            }
            if let Some(weights) = retrieval.weights {
                self.retrieval.weights = weights;
            }
        }

        if let Some(escalation) = patch.escalation {
            if let Some(min_prior_turns) = escalation.min_prior_turns {
                self.escalation.min_prior_turns = min_prior_turns;
            }
            if let Some(ticket_timeout_secs) = escalation.ticket_timeout_secs {
                self.escalation.ticket_timeout_secs = ticket_timeout_secs;
            }
            if let Some(min_issue_chars) = escalation.min_issue_chars {
                self.escalation.min_issue_chars = min_issue_chars;
            }
            if let Some(max_issue_chars) = escalation.max_issue_chars {
                self.escalation.max_issue_chars = max_issue_chars;
            }
            if let Some(excerpt_turns) = escalation.excerpt_turns {
                self.escalation.excerpt_turns = excerpt_turns;
            }
        }

        if let Some(runtime) = patch.runtime {
            if let Some(reply_timeout_secs) = runtime.reply_timeout_secs {
                self.runtime.reply_timeout_secs = reply_timeout_secs;
            }
            if let Some(max_history_turns) = runtime.max_history_turns {
                self.runtime.max_history_turns = max_history_turns;
            }
            if let Some(max_recommendations) = runtime.max_recommendations {
                self.runtime.max_recommendations = max_recommendations;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = Some(path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CARTWISE_LLM_ENABLED") {
            self.llm.enabled = parse_bool("CARTWISE_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CARTWISE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CARTWISE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CARTWISE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CARTWISE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("CARTWISE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("CARTWISE_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("CARTWISE_LLM_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("CARTWISE_RETRIEVAL_PASSTHROUGH_THRESHOLD") {
            self.retrieval.passthrough_threshold =
                parse_usize("CARTWISE_RETRIEVAL_PASSTHROUGH_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_RETRIEVAL_USE_LLM_INTENT") {
            self.retrieval.use_llm_intent =
                parse_bool("CARTWISE_RETRIEVAL_USE_LLM_INTENT", &value)?;
        }

        if let Some(value) = read_env("CARTWISE_ESCALATION_TICKET_TIMEOUT_SECS") {
            self.escalation.ticket_timeout_secs =
                parse_u64("CARTWISE_ESCALATION_TICKET_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_ESCALATION_MIN_PRIOR_TURNS") {
            self.escalation.min_prior_turns =
                parse_usize("CARTWISE_ESCALATION_MIN_PRIOR_TURNS", &value)?;
        }

        if let Some(value) = read_env("CARTWISE_RUNTIME_REPLY_TIMEOUT_SECS") {
            self.runtime.reply_timeout_secs =
                parse_u64("CARTWISE_RUNTIME_REPLY_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_RUNTIME_MAX_HISTORY_TURNS") {
            self.runtime.max_history_turns =
                parse_usize("CARTWISE_RUNTIME_MAX_HISTORY_TURNS", &value)?;
        }
        if let Some(value) = read_env("CARTWISE_RUNTIME_MAX_RECOMMENDATIONS") {
            self.runtime.max_recommendations =
                parse_usize("CARTWISE_RUNTIME_MAX_RECOMMENDATIONS", &value)?;
        }

        if let Some(value) = read_env("CARTWISE_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }

        let log_level =
            read_env("CARTWISE_LOGGING_LEVEL").or_else(|| read_env("CARTWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARTWISE_LOGGING_FORMAT").or_else(|| read_env("CARTWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = Some(catalog_path);
        }
        if let Some(passthrough_threshold) = overrides.passthrough_threshold {
            self.retrieval.passthrough_threshold = passthrough_threshold;
        }
        if let Some(use_llm_intent) = overrides.use_llm_intent {
            self.retrieval.use_llm_intent = use_llm_intent;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_retrieval(&self.retrieval)?;
        validate_escalation(&self.escalation)?;
        validate_runtime(&self.runtime)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cartwise.toml"), PathBuf::from("config/cartwise.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_timeout(key: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 || secs > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_timeout("llm.timeout_secs", llm.timeout_secs)?;

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }
    if llm.max_tokens == 0 || llm.intent_max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens and llm.intent_max_tokens must be greater than zero".to_string(),
        ));
    }

    if !llm.enabled {
        return Ok(());
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers (or set llm.enabled = false)"
                        .to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_retrieval(retrieval: &RetrievalConfig) -> Result<(), ConfigError> {
    let budgets = retrieval.budgets;
    let all_budgets = [
        budgets.search,
        budgets.recommendation,
        budgets.question,
        budgets.comparison,
        budgets.default,
    ];
    if all_budgets.contains(&0) {
        return Err(ConfigError::Validation(
            "retrieval.budgets entries must be greater than zero".to_string(),
        ));
    }

    let weights = retrieval.weights;
    let all_weights = [
        weights.category,
        weights.product_type,
        weights.color,
        weights.keyword,
        weights.price_max,
        weights.price_min,
        weights.price_range_bonus,
        weights.scenario,
        weights.name_word,
    ];
    if all_weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
        return Err(ConfigError::Validation(
            "retrieval.weights must be finite and non-negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_escalation(escalation: &EscalationConfig) -> Result<(), ConfigError> {
    validate_timeout("escalation.ticket_timeout_secs", escalation.ticket_timeout_secs)?;

    if escalation.max_issue_chars <= escalation.min_issue_chars {
        return Err(ConfigError::Validation(
            "escalation.max_issue_chars must be greater than escalation.min_issue_chars"
                .to_string(),
        ));
    }
    if escalation.excerpt_turns == 0 {
        return Err(ConfigError::Validation(
            "escalation.excerpt_turns must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_runtime(runtime: &RuntimeConfig) -> Result<(), ConfigError> {
    validate_timeout("runtime.reply_timeout_secs", runtime.reply_timeout_secs)?;

    if runtime.max_history_turns == 0 {
        return Err(ConfigError::Validation(
            "runtime.max_history_turns must be greater than zero".to_string(),
        ));
    }
    if runtime.max_recommendations == 0 {
        return Err(ConfigError::Validation(
            "runtime.max_recommendations must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    retrieval: Option<RetrievalPatch>,
    escalation: Option<EscalationPatch>,
    runtime: Option<RuntimePatch>,
    catalog: Option<CatalogPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    intent_max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrievalPatch {
    passthrough_threshold: Option<usize>,
    use_llm_intent: Option<bool>,
    budgets: Option<IntentBudgets>,
    weights: Option<ScoringWeights>,
}

#[derive(Debug, Default, Deserialize)]
struct EscalationPatch {
    min_prior_turns: Option<usize>,
    ticket_timeout_secs: Option<u64>,
    min_issue_chars: Option<usize>,
    max_issue_chars: Option<usize>,
    excerpt_turns: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RuntimePatch {
    reply_timeout_secs: Option<u64>,
    max_history_turns: Option<usize>,
    max_recommendations: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn write_config(dir: &TempDir, body: &str) -> Result<PathBuf, String> {
        let path = dir.path().join("cartwise.toml");
        fs::write(&path, body).map_err(|err| err.to_string())?;
        Ok(path)
    }

    #[test]
    fn defaults_match_documented_values() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;

        ensure(config.retrieval.passthrough_threshold == 50, "passthrough threshold is 50")?;
        ensure(config.retrieval.budgets.search == 10, "search budget is 10")?;
        ensure(config.retrieval.weights.name_word == 8.0, "name weight is 8")?;
        ensure(config.escalation.ticket_timeout_secs == 10, "ticket timeout is 10s")?;
        ensure(config.escalation.min_prior_turns == 2, "two prior turns are required")?;
        ensure(config.runtime.reply_timeout_secs == 30, "reply timeout is 30s")?;
        ensure(config.runtime.max_recommendations == 10, "ten recommendations are shown")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CARTWISE_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[llm]
provider = "openai"
api_key = "${TEST_CARTWISE_API_KEY}"
base_url = "https://api.openai.com/v1"
"#,
            )?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.provider == LlmProvider::OpenAi, "provider should come from file")?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be loaded from environment",
            )
        })();

        clear_vars(&["TEST_CARTWISE_API_KEY"]);
        result
    }

    #[test]
    fn nested_retrieval_tables_patch_individual_fields() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[retrieval]
passthrough_threshold = 0

[retrieval.budgets]
search = 3

[retrieval.weights]
name_word = 12.5

[escalation]
ticket_timeout_secs = 5
"#,
        )?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.retrieval.passthrough_threshold == 0, "threshold should be patched")?;
        ensure(config.retrieval.budgets.search == 3, "search budget should be patched")?;
        ensure(config.retrieval.budgets.recommendation == 20, "other budgets keep defaults")?;
        ensure(config.retrieval.weights.name_word == 12.5, "name weight should be patched")?;
        ensure(config.retrieval.weights.category == 10.0, "other weights keep defaults")?;
        ensure(config.escalation.ticket_timeout_secs == 5, "ticket timeout should be patched")?;
        ensure(
            config.retrieval.candidate_selector().budget_for(&Default::default()) == 15,
            "selector should use configured budgets",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARTWISE_LOG_LEVEL", "warn");
        env::set_var("CARTWISE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["CARTWISE_LOG_LEVEL", "CARTWISE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARTWISE_LLM_MODEL", "model-from-env");
        env::set_var("CARTWISE_RUNTIME_REPLY_TIMEOUT_SECS", "12");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[llm]
model = "model-from-file"

[runtime]
reply_timeout_secs = 20
max_recommendations = 6

[logging]
level = "warn"
"#,
            )?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    passthrough_threshold: Some(5),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.llm.model == "model-from-env", "env model should win over file")?;
            ensure(config.runtime.reply_timeout_secs == 12, "env timeout should win over file")?;
            ensure(config.runtime.max_recommendations == 6, "file value should win over default")?;
            ensure(config.retrieval.passthrough_threshold == 5, "override threshold should win")
        })();

        clear_vars(&["CARTWISE_LLM_MODEL", "CARTWISE_RUNTIME_REPLY_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn invalid_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARTWISE_ESCALATION_TICKET_TIMEOUT_SECS", "soon");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override but config load succeeded".to_string()),
            Err(error) => ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "CARTWISE_ESCALATION_TICKET_TIMEOUT_SECS"
                ),
                "error should name the offending variable",
            ),
        };

        clear_vars(&["CARTWISE_ESCALATION_TICKET_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARTWISE_LLM_PROVIDER", "anthropic");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")?;

            AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    llm_enabled: Some(false),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map(|_| ())
            .map_err(|err| format!("disabled llm should not need a key: {err}"))
        })();

        clear_vars(&["CARTWISE_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn missing_required_file_is_reported() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/definitely/not/here/cartwise.toml")),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("missing file must fail");

        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARTWISE_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars(&["CARTWISE_LLM_API_KEY"]);
        result
    }
}
