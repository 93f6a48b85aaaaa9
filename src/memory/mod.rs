//! Memory module for Nayuki
//!
//! Provides the turn log / long-term memory store, conversation assembly and
//! threshold-triggered summarization.

mod context;
mod store;
mod summarize;

pub use context::{persona_prompt, ConversationAssembler, LONG_TERM_MEMORY_HEADER};
pub use store::{now_iso, MemoryStore, Turn, TurnRole};
pub use summarize::{merge_memory, should_summarize, Summarizer, SUMMARY_MAX_LINES};
