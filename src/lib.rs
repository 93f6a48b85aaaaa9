//! Nayuki - local conversational assistant
//!
//! A single-user chat assistant that:
//! - Forwards conversation turns to a locally hosted language model
//! - Keeps an append-only turn log and a bounded recall window
//! - Periodically condenses the log into a long-term memory summary

pub mod commands;
pub mod config;
pub mod event_log;
pub mod llm;
pub mod memory;
pub mod session;
pub mod speech;
pub mod stats;

pub use commands::{classify, Command, Input, SpeakArg};
pub use config::{NayukiConfig, Provider};
pub use event_log::EventLog;
pub use llm::{ChatMessage, ChatReply, LanguageModel, ModelClient, Role};
pub use memory::{ConversationAssembler, MemoryStore, Summarizer, Turn};
pub use session::{CommandOutcome, Flow, Session, SessionState};
pub use speech::{CommandListener, CommandSpeaker, Listener, Speaker};

/// Result type for Nayuki operations
pub type Result<T> = std::result::Result<T, NayukiError>;

/// Errors that can occur in Nayuki
#[derive(Debug, thiserror::Error)]
pub enum NayukiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NayukiError {
    /// Message without the variant prefix, for callers that add their own label
    pub fn detail(&self) -> String {
        match self {
            NayukiError::Config(msg) | NayukiError::Llm(msg) | NayukiError::Speech(msg) => {
                msg.clone()
            }
            NayukiError::Io(e) => e.to_string(),
            NayukiError::Json(e) => e.to_string(),
        }
    }
}
