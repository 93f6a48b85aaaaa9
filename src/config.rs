//! Startup configuration
//!
//! Resolution order (highest wins):
//!   1. CLI flags (applied by `main` through the `with_*` builders)
//!   2. Environment variables
//!   3. `<root>/config.toml`
//!   4. Built-in defaults

use crate::{NayukiError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "qwen2.5:7b";
pub const DEFAULT_HISTORY_KEEP: usize = 14;
pub const DEFAULT_SUMMARIZE_EVERY: usize = 20;
const DEFAULT_ASSISTANT_NAME: &str = "Nayuki";
const DEFAULT_USER_NAME: &str = "Nick";
const DEFAULT_LANGUAGE: &str = "Traditional Chinese";

/// Wire format of the model server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Ollama native API (`/api/chat`, `/api/tags`)
    Ollama,
    /// OpenAI-compatible API (`/chat/completions`, `/models`), e.g. LM Studio
    #[serde(alias = "lmstudio", alias = "openai-compatible")]
    OpenAi,
}

impl Provider {
    pub fn parse(name: &str) -> Option<Provider> {
        match name.trim().to_lowercase().as_str() {
            "ollama" => Some(Provider::Ollama),
            "openai" | "lmstudio" | "openai-compatible" => Some(Provider::OpenAi),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::OpenAi => "openai",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Ollama => "http://localhost:11434",
            Provider::OpenAi => "http://localhost:1234/v1",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for Nayuki. Fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct NayukiConfig {
    /// Project root; `memory/` and `logs/` live under it
    pub root: PathBuf,

    /// Model name passed to the model server
    pub model: String,

    /// How many most-recent turns are replayed into each request
    pub history_keep: usize,

    /// Number of log lines between automatic memory condensations
    pub summarize_every: usize,

    pub provider: Provider,

    /// Base URL of the model server
    pub base_url: String,

    /// Extra attempts for a failed chat call (0 = no retries)
    pub chat_retries: u32,

    /// Per-request timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,

    pub assistant_name: String,
    pub user_name: String,

    /// Language the persona replies in and summaries are written in
    pub language: String,

    /// External text-to-speech command; the reply is piped to its stdin
    pub tts_command: Option<Vec<String>>,

    /// External speech-to-text command; its stdout is the transcript
    pub stt_command: Option<Vec<String>>,
}

/// On-disk `config.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    model: Option<String>,
    history_keep: Option<usize>,
    summarize_every: Option<usize>,
    provider: Option<Provider>,
    base_url: Option<String>,
    chat_retries: Option<u32>,
    request_timeout_secs: Option<u64>,
    assistant_name: Option<String>,
    user_name: Option<String>,
    language: Option<String>,
    tts_command: Option<Vec<String>>,
    stt_command: Option<Vec<String>>,
}

impl NayukiConfig {
    /// Defaults rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        let provider = Provider::Ollama;
        Self {
            root,
            model: DEFAULT_MODEL.to_string(),
            history_keep: DEFAULT_HISTORY_KEEP,
            summarize_every: DEFAULT_SUMMARIZE_EVERY,
            provider,
            base_url: provider.default_base_url().to_string(),
            chat_retries: 0,
            request_timeout: None,
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            user_name: DEFAULT_USER_NAME.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            tts_command: None,
            stt_command: None,
        }
    }

    /// Load `<root>/config.toml` and the process environment on top of the defaults.
    pub fn load(root: PathBuf) -> Result<Self> {
        Self::load_with_env(root, |key| std::env::var(key).ok())
    }

    /// Same as [`NayukiConfig::load`] with an injectable environment lookup.
    pub fn load_with_env<F>(root: PathBuf, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(root);
        let mut explicit_base_url = None;

        let config_file = config.config_file();
        if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)?;
            let file: ConfigToml = toml::from_str(&content).map_err(|e| {
                NayukiError::Config(format!("{}: {}", config_file.display(), e))
            })?;
            explicit_base_url = file.base_url.clone();
            config.apply_file(file);
        }

        if let Some(model) = env("NAYUKI_MODEL").or_else(|| env("MODEL")) {
            config.model = model;
        }
        if let Some(value) = env("NAYUKI_HISTORY_KEEP") {
            config.history_keep = parse_number("NAYUKI_HISTORY_KEEP", &value)?;
        }
        if let Some(value) = env("NAYUKI_SUMMARIZE_EVERY") {
            config.summarize_every = parse_number("NAYUKI_SUMMARIZE_EVERY", &value)?;
        }
        if let Some(value) = env("NAYUKI_CHAT_RETRIES") {
            config.chat_retries = parse_number("NAYUKI_CHAT_RETRIES", &value)?;
        }
        if let Some(value) = env("NAYUKI_TIMEOUT_SECS") {
            let secs: u64 = parse_number("NAYUKI_TIMEOUT_SECS", &value)?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(value) = env("NAYUKI_PROVIDER") {
            config.provider = Provider::parse(&value).ok_or_else(|| {
                NayukiError::Config(format!("NAYUKI_PROVIDER: unknown provider '{}'", value))
            })?;
        }
        if let Some(url) = env("NAYUKI_BASE_URL").or_else(|| env("OLLAMA_HOST")) {
            explicit_base_url = Some(url);
        }
        if let Some(cmd) = env("NAYUKI_TTS_COMMAND") {
            config.tts_command = split_command(&cmd);
        }
        if let Some(cmd) = env("NAYUKI_STT_COMMAND") {
            config.stt_command = split_command(&cmd);
        }

        config.base_url = match explicit_base_url {
            Some(url) => normalize_base_url(&url),
            None => config.provider.default_base_url().to_string(),
        };

        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigToml) {
        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(keep) = file.history_keep {
            self.history_keep = keep;
        }
        if let Some(every) = file.summarize_every {
            self.summarize_every = every;
        }
        if let Some(provider) = file.provider {
            self.provider = provider;
        }
        if let Some(retries) = file.chat_retries {
            self.chat_retries = retries;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(name) = file.assistant_name {
            self.assistant_name = name;
        }
        if let Some(name) = file.user_name {
            self.user_name = name;
        }
        if let Some(language) = file.language {
            self.language = language;
        }
        self.tts_command = file.tts_command.filter(|c| !c.is_empty());
        self.stt_command = file.stt_command.filter(|c| !c.is_empty());
    }

    /// Reject settings the rest of the crate cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.summarize_every == 0 {
            return Err(NayukiError::Config(
                "summarize_every must be greater than 0".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(NayukiError::Config("model must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_history_keep(mut self, keep: usize) -> Self {
        self.history_keep = keep;
        self
    }

    pub fn with_summarize_every(mut self, every: usize) -> Self {
        self.summarize_every = every;
        self
    }

    /// Switches provider. A base URL still at the old provider's default
    /// follows the new provider; an explicitly set one is kept.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        if self.base_url == self.provider.default_base_url() {
            self.base_url = provider.default_base_url().to_string();
        }
        self.provider = provider;
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = normalize_base_url(url);
        self
    }

    pub fn with_chat_retries(mut self, retries: u32) -> Self {
        self.chat_retries = retries;
        self
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.root.join("memory")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn chat_log(&self) -> PathBuf {
        self.memory_dir().join("chat_log.jsonl")
    }

    pub fn long_memory(&self) -> PathBuf {
        self.memory_dir().join("long_memory.txt")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| NayukiError::Config(format!("{}: invalid number '{}'", key, value)))
}

fn split_command(value: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = value.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

/// `OLLAMA_HOST` is commonly given as `host:port`; add a scheme and drop the trailing slash.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}
