//! HTTP client for local model servers
//!
//! Two wire formats are supported:
//! - Ollama native API: `POST /api/chat`, `GET /api/tags`
//! - OpenAI-compatible API (LM Studio, llama.cpp server, ...):
//!   `POST /chat/completions`, `GET /models`
//!
//! Requests are non-streaming. Reasoning models may wrap their chain of
//! thought in `<think>` tags; that block is logged and stripped from replies.

use super::{ChatMessage, ChatReply, LanguageModel};
use crate::config::{NayukiConfig, Provider};
use crate::{NayukiError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const RETRY_BASE_DELAY_MS: u64 = 1_000;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const ERROR_DETAIL_MAX_CHARS: usize = 500;

static THINK_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").ok());

/// Model output with reasoning and final answer separated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Content of the `<think>` block, if any
    pub thinking: Option<String>,
    /// Everything outside the `<think>` block
    pub response: String,
}

/// Split `<think>...</think>` reasoning from the answer.
pub fn parse_think_tags(content: &str) -> ParsedResponse {
    if let Some(re) = THINK_BLOCK.as_ref() {
        if let Some(caps) = re.captures(content) {
            let thinking = caps.get(1).map(|m| m.as_str().trim().to_string());
            let response = re.replace_all(content, "").trim().to_string();
            return ParsedResponse { thinking, response };
        }
    }
    if let Some(rest) = content.trim_start().strip_prefix("<think>") {
        // Unterminated block: the model never got to an answer
        return ParsedResponse {
            thinking: Some(rest.trim().to_string()),
            response: String::new(),
        };
    }
    ParsedResponse {
        thinking: None,
        response: content.trim().to_string(),
    }
}

// ─── Ollama native API types ────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

// ─── OpenAI-compatible API types ────────────────────────────────────

#[derive(Debug, Serialize)]
struct CompletionsRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    #[serde(default)]
    choices: Vec<CompletionsChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionsChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ─── Client ─────────────────────────────────────────────────────────

/// [`LanguageModel`] over HTTP
pub struct ModelClient {
    client: Client,
    model: String,
    provider: Provider,
    base_url: String,
    chat_retries: u32,
}

impl ModelClient {
    pub fn new(config: &NayukiConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("nayuki/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| NayukiError::Llm(format!("failed to build HTTP client: {e}")))?;

        info!(
            "Model client: provider={}, model={}, base_url={}, retries={}",
            config.provider, config.model, config.base_url, config.chat_retries
        );

        Ok(Self {
            client,
            model: config.model.clone(),
            provider: config.provider,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_retries: config.chat_retries,
        })
    }

    /// Exponential backoff: 1s, 2s, 4s, ...
    fn retry_backoff(attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(exp))
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        status.is_server_error()
    }

    fn is_retryable_error(msg: &str) -> bool {
        msg.contains("timeout")
            || msg.contains("network")
            || msg.contains("retryable")
            || msg.contains("error sending request")
            || msg.contains("connection")
    }

    /// One request, no retries. Returns the raw message content.
    async fn send_chat(&self, messages: &[ChatMessage]) -> Result<String> {
        match self.provider {
            Provider::Ollama => {
                let url = format!("{}/api/chat", self.base_url);
                let request = OllamaChatRequest {
                    model: &self.model,
                    messages,
                    stream: false,
                };
                let response = self
                    .client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(Self::map_reqwest_error)?;
                let response = Self::check_response_status(response).await?;
                let body: OllamaChatResponse = response
                    .json()
                    .await
                    .map_err(|e| NayukiError::Llm(format!("invalid response: {e}")))?;
                body.message
                    .and_then(|m| m.content)
                    .ok_or_else(|| NayukiError::Llm("response has no message content".to_string()))
            }
            Provider::OpenAi => {
                let url = format!("{}/chat/completions", self.base_url);
                let request = CompletionsRequest {
                    model: &self.model,
                    messages,
                    stream: false,
                };
                let response = self
                    .client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(Self::map_reqwest_error)?;
                let response = Self::check_response_status(response).await?;
                let body: CompletionsResponse = response
                    .json()
                    .await
                    .map_err(|e| NayukiError::Llm(format!("invalid response: {e}")))?;
                body.choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| NayukiError::Llm("response has no choices".to_string()))
            }
        }
    }

    async fn check_response_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = extract_error_detail(&body);
        let detail = truncate_error_detail(&detail, ERROR_DETAIL_MAX_CHARS);
        let prefix = if Self::is_retryable_status(status) {
            "retryable API error"
        } else {
            "API error"
        };
        if detail.is_empty() {
            Err(NayukiError::Llm(format!("{prefix} {status}")))
        } else {
            Err(NayukiError::Llm(format!("{prefix} {status}: {detail}")))
        }
    }

    fn map_reqwest_error(e: reqwest::Error) -> NayukiError {
        if e.is_timeout() {
            NayukiError::Llm(format!("timeout: {e}"))
        } else if e.is_connect() {
            NayukiError::Llm(format!("network: {e}"))
        } else {
            NayukiError::Llm(e.to_string())
        }
    }
}

#[async_trait]
impl LanguageModel for ModelClient {
    fn model(&self) -> &str {
        &self.model
    }

    /// Chat with `chat_retries` extra attempts on retryable failures.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatReply> {
        debug!("Chat request with {} messages", messages.len());

        let max_attempts = self.chat_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = Self::retry_backoff(attempt);
                warn!(
                    "Chat request failed (attempt {}/{}), retrying in {:?}...",
                    attempt, max_attempts, delay
                );
                tokio::time::sleep(delay).await;
            }
            attempt += 1;

            let started = Instant::now();
            match self.send_chat(messages).await {
                Ok(content) => {
                    let latency = started.elapsed();
                    let parsed = parse_think_tags(&content);
                    if let Some(thinking) = &parsed.thinking {
                        debug!("Model thinking: {}", thinking);
                    }
                    return Ok(ChatReply::new(parsed.response, latency));
                }
                Err(e) => {
                    if attempt < max_attempts && Self::is_retryable_error(&e.to_string()) {
                        continue;
                    }
                    if attempt > 1 {
                        return Err(NayukiError::Llm(format!(
                            "failed after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Single attempt; summarization is best-effort.
    async fn summarize(&self, prompt: &str) -> Result<String> {
        debug!("Summarize request, prompt length: {}", prompt.len());
        let content = self.send_chat(&[ChatMessage::user(prompt)]).await?;
        Ok(parse_think_tags(&content).response)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = match self.provider {
            Provider::Ollama => format!("{}/api/tags", self.base_url),
            Provider::OpenAi => format!("{}/models", self.base_url),
        };
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;
        let response = Self::check_response_status(response).await?;

        let names = match self.provider {
            Provider::Ollama => response
                .json::<OllamaTagsResponse>()
                .await
                .map_err(|e| NayukiError::Llm(format!("invalid model list: {e}")))?
                .models
                .into_iter()
                .map(|m| m.name)
                .collect(),
            Provider::OpenAi => response
                .json::<ModelsResponse>()
                .await
                .map_err(|e| NayukiError::Llm(format!("invalid model list: {e}")))?
                .data
                .into_iter()
                .map(|m| m.id)
                .collect(),
        };
        Ok(names)
    }
}

/// Pull the human-readable message out of an error body.
fn extract_error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        // Ollama: {"error": "model 'x' not found"}
        if let Some(msg) = value.get("error").and_then(|e| e.as_str()) {
            return msg.to_string();
        }
        // OpenAI-compatible: {"error": {"message": "..."}}
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = value.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    // Keep user-facing failures to one line
    trimmed.lines().next().unwrap_or_default().to_string()
}

fn truncate_error_detail(detail: &str, max_chars: usize) -> String {
    if detail.chars().count() <= max_chars {
        return detail.to_string();
    }

    let mut truncated = detail.chars().take(max_chars).collect::<String>();
    truncated.push_str("... [truncated]");
    truncated
}
