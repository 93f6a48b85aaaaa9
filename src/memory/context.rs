//! Builds the message list sent to the model for one conversation turn

use super::store::{MemoryStore, TurnRole};
use crate::config::NayukiConfig;
use crate::llm::ChatMessage;
use crate::Result;

/// Header of the system message that carries long-term memory
pub const LONG_TERM_MEMORY_HEADER: &str = "Long-term memory (summary):";

/// Persona directives for the first system message
pub fn persona_prompt(config: &NayukiConfig) -> String {
    format!(
        r#"You are {assistant}, {user}'s local personal assistant.
Style: concise and practical, like an engineering partner. Do not use emoji.
Principles:
- Prefer concrete next steps and commands that can be run right away
- When unsure, list what needs to be confirmed and the smallest test that would confirm it
- Reply mainly in {language}"#,
        assistant = config.assistant_name,
        user = config.user_name,
        language = config.language,
    )
}

/// Assembles: persona, long-term memory (if any), recent window, new input.
pub struct ConversationAssembler<'a> {
    store: &'a MemoryStore,
    persona: &'a str,
    history_keep: usize,
}

impl<'a> ConversationAssembler<'a> {
    pub fn new(store: &'a MemoryStore, persona: &'a str, history_keep: usize) -> Self {
        Self {
            store,
            persona,
            history_keep,
        }
    }

    /// Ordered messages for a request answering `user_text`. Reads the store, writes nothing.
    pub async fn build_messages(&self, user_text: &str) -> Result<Vec<ChatMessage>> {
        let mut messages = vec![ChatMessage::system(self.persona)];

        let memory = self.store.load_long_term().await?;
        if !memory.is_empty() {
            messages.push(ChatMessage::system(format!(
                "{}\n{}",
                LONG_TERM_MEMORY_HEADER, memory
            )));
        }

        for turn in self.store.load_recent(self.history_keep).await? {
            messages.push(match turn.role {
                TurnRole::User => ChatMessage::user(turn.content),
                TurnRole::Assistant => ChatMessage::assistant(turn.content),
            });
        }

        messages.push(ChatMessage::user(user_text));
        Ok(messages)
    }
}
