use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use cartwise_core::config::{LlmConfig, LlmProvider};
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self { temperature: 0.7, max_tokens: 1024 }
    }
}

/// Opaque "generate text from a prompt" capability.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String>;
}

/// Text completion over HTTP for the configured provider.
#[derive(Debug)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    provider: LlmProvider,
    url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let base_url = match (&config.base_url, config.provider) {
            (Some(url), _) if !url.trim().is_empty() => {
                url.trim().trim_end_matches('/').to_string()
            }
            (_, LlmProvider::OpenAi) => OPENAI_DEFAULT_BASE_URL.to_string(),
            (_, LlmProvider::Anthropic) => ANTHROPIC_DEFAULT_BASE_URL.to_string(),
            (_, LlmProvider::Ollama) => bail!("llm.base_url is required for the ollama provider"),
        };
        let url = match config.provider {
            LlmProvider::OpenAi => format!("{base_url}/chat/completions"),
            LlmProvider::Anthropic => format!("{base_url}/v1/messages"),
            LlmProvider::Ollama => format!("{base_url}/api/generate"),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build llm http client")?;

        Ok(Self {
            client,
            provider: config.provider,
            url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("llm api key is not configured for {}", self.provider.as_str()))
    }

    async fn post_json<B, R>(&self, request: reqwest::RequestBuilder, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = request
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let snippet = response.text().await.unwrap_or_default();
            let snippet = snippet.chars().take(200).collect::<String>();
            bail!("{} returned {status}: {snippet}", self.url);
        }

        response
            .json::<R>()
            .await
            .with_context(|| format!("invalid response body from {}", self.url))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String> {
        let started = Instant::now();
        let text = match self.provider {
            LlmProvider::OpenAi => {
                let body = ChatRequest {
                    model: &self.model,
                    messages: vec![ChatMessage { role: "user", content: prompt }],
                    temperature: options.temperature,
                    max_tokens: options.max_tokens,
                };
                let request = self.client.post(&self.url).bearer_auth(self.api_key()?);
                let response: ChatResponse = self.post_json(request, &body).await?;
                response.choices.into_iter().next().map(|choice| choice.message.content)
            }
            LlmProvider::Anthropic => {
                let body = ChatRequest {
                    model: &self.model,
                    messages: vec![ChatMessage { role: "user", content: prompt }],
                    temperature: options.temperature,
                    max_tokens: options.max_tokens,
                };
                let request = self
                    .client
                    .post(&self.url)
                    .header("x-api-key", self.api_key()?)
                    .header("anthropic-version", ANTHROPIC_VERSION);
                let response: MessagesResponse = self.post_json(request, &body).await?;
                let text = response
                    .content
                    .into_iter()
                    .filter(|block| block.kind == "text")
                    .filter_map(|block| block.text)
                    .collect::<Vec<_>>()
                    .join("");
                (!text.is_empty()).then_some(text)
            }
            LlmProvider::Ollama => {
                let body = GenerateRequest {
                    model: &self.model,
                    prompt,
                    stream: false,
                    options: GenerateOptions {
                        temperature: options.temperature,
                        num_predict: options.max_tokens,
                    },
                };
                let request = self.client.post(&self.url);
                let response: GenerateResponse = self.post_json(request, &body).await?;
                Some(response.response)
            }
        };

        debug!(
            event_name = "llm.completed",
            provider = self.provider.as_str(),
            model = %self.model,
            prompt_len = prompt.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "completion finished"
        );

        text.filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!("{} returned an empty completion", self.provider.as_str()))
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}
