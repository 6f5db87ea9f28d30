pub mod chat;
pub mod config;
pub mod extract;
pub mod retrieve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cartwise_agent::collaborators::{CatalogProvider, JsonFileCatalog};
use cartwise_agent::llm::{HttpLlmClient, LlmClient};
use cartwise_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use cartwise_core::domain::product::Product;
use cartwise_core::errors::ApplicationError;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Default, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            message: Some(message.into()),
            ..CommandOutcome::default()
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(command: &str, data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => {
                let payload = CommandOutcome {
                    command: command.to_string(),
                    status: "ok".to_string(),
                    data: Some(data),
                    ..CommandOutcome::default()
                };
                Self { exit_code: 0, output: serialize_payload(payload) }
            }
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: Some(message.into()),
            ..CommandOutcome::default()
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Classifies an application failure for the operator under a fresh correlation id.
    pub fn from_error(
        command: &str,
        error_class: &str,
        error: ApplicationError,
        exit_code: u8,
    ) -> Self {
        let interface = error.into_interface(Uuid::new_v4().to_string());
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: Some(interface.to_string()),
            hint: Some(interface.user_message()),
            correlation_id: Some(interface.correlation_id().to_string()),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        let detail = error.to_string().replace('\\', "\\\\").replace('"', "\\\"");
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\
             \"error_class\":\"serialization\",\"message\":\"{detail}\"}}"
        )
    })
}

pub(crate) fn load_config(
    command: &str,
    overrides: ConfigOverrides,
) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }).map_err(|error| {
        CommandResult::from_error(
            command,
            "config_validation",
            ApplicationError::configuration(error),
            2,
        )
    })
}

pub(crate) fn async_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// `--catalog` wins over `[catalog].path`.
pub(crate) fn catalog_path(
    command: &str,
    explicit: Option<&Path>,
    config: &AppConfig,
) -> Result<PathBuf, CommandResult> {
    explicit.map(Path::to_path_buf).or_else(|| config.catalog.path.clone()).ok_or_else(|| {
        CommandResult::from_error(
            command,
            "missing_catalog",
            ApplicationError::invalid_input(
                "no catalog file given; pass --catalog or set [catalog].path",
            ),
            2,
        )
    })
}

pub(crate) async fn load_catalog(
    command: &str,
    path: &Path,
) -> Result<Vec<Product>, CommandResult> {
    JsonFileCatalog::new(path).all_products().await.map_err(|error| {
        CommandResult::from_error(
            command,
            "catalog_load",
            ApplicationError::integration(format!("{error:#}")),
            4,
        )
    })
}

/// `None` when the model is disabled or its client cannot be built.
pub(crate) fn model_client(config: &AppConfig) -> Option<Arc<dyn LlmClient>> {
    if !config.llm.enabled {
        return None;
    }
    match HttpLlmClient::from_config(&config.llm) {
        Ok(client) => Some(Arc::new(client)),
        Err(error) => {
            warn!(
                event_name = "cli.llm_unavailable",
                error = %error,
                "model client could not be built, continuing without it"
            );
            None
        }
    }
}
