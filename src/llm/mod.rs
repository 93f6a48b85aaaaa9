//! Language-model capability
//!
//! The session only talks to [`LanguageModel`]; [`ModelClient`] is the HTTP
//! adapter for local model servers.

mod client;

pub use client::{parse_think_tags, ModelClient};

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Approximate characters per token for throughput estimation
const APPROX_CHARS_PER_TOKEN: usize = 4;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completed chat call with rough throughput figures
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub latency: Duration,
    pub approx_tokens: usize,
    pub tokens_per_second: f64,
}

impl ChatReply {
    pub fn new(text: String, latency: Duration) -> Self {
        let approx_tokens = (text.chars().count() / APPROX_CHARS_PER_TOKEN).max(1);
        let secs = latency.as_secs_f64();
        let tokens_per_second = if secs > 0.0 {
            approx_tokens as f64 / secs
        } else {
            0.0
        };
        Self {
            text,
            latency,
            approx_tokens,
            tokens_per_second,
        }
    }
}

/// Chat/summarize capability of a language-model backend
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model name, for display
    fn model(&self) -> &str;

    /// Send the full message list and return the assistant's reply
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatReply>;

    /// Condense `prompt` into a short text
    async fn summarize(&self, prompt: &str) -> Result<String>;

    /// Models installed on the backend
    async fn list_models(&self) -> Result<Vec<String>>;
}
