//! Threshold-triggered condensation of the turn log into long-term memory.
//!
//! After every completed exchange the raw line count `L` of the turn log is
//! checked. When `L` is a positive multiple of `summarize_every`, the last
//! `summarize_every` raw lines are sent to the model and the returned summary
//! is appended, timestamped, to the long-term memory file.
//!
//! The trigger assumes lines arrive in user/assistant pairs. An odd append
//! shifts the boundary; this is left as is.

use super::store::MemoryStore;
use crate::config::NayukiConfig;
use crate::llm::LanguageModel;
use crate::{NayukiError, Result};
use chrono::Local;
use tracing::info;

/// Upper bound on summary length requested from the model
pub const SUMMARY_MAX_LINES: usize = 5;

/// `true` iff `line_count` is a positive multiple of `every`
pub fn should_summarize(line_count: usize, every: usize) -> bool {
    every > 0 && line_count >= every && line_count % every == 0
}

/// Append a stamped summary block to existing memory text.
pub fn merge_memory(old: &str, stamp: &str, summary: &str) -> String {
    format!("{}\n\n[{}]\n{}", old, stamp, summary.trim())
        .trim()
        .to_string()
}

pub struct Summarizer {
    summarize_every: usize,
    user_name: String,
    language: String,
}

impl Summarizer {
    pub fn new(config: &NayukiConfig) -> Self {
        Self {
            summarize_every: config.summarize_every,
            user_name: config.user_name.clone(),
            language: config.language.clone(),
        }
    }

    pub fn summarize_every(&self) -> usize {
        self.summarize_every
    }

    /// Prompt asking the model to condense `log_excerpt`
    pub fn build_prompt(&self, log_excerpt: &str) -> String {
        format!(
            "Condense the following conversation log into a long-term memory summary of at most {max} lines. \
Include: what {user} is currently working on, {user}'s preferences (for example, no emoji), \
and recent decisions. Write it in {language}.\n\n{log_excerpt}",
            max = SUMMARY_MAX_LINES,
            user = self.user_name,
            language = self.language,
        )
    }

    /// Summarize if the turn log just reached a multiple of `summarize_every`.
    ///
    /// Returns `Ok(true)` when long-term memory was updated. Model failures
    /// are returned to the caller, which decides how loudly to report them.
    pub async fn maybe_summarize(
        &self,
        store: &MemoryStore,
        model: &dyn LanguageModel,
    ) -> Result<bool> {
        let line_count = store.line_count().await?;
        if !should_summarize(line_count, self.summarize_every) {
            return Ok(false);
        }

        info!(
            "Summarization triggered ({} lines, every {})",
            line_count, self.summarize_every
        );

        let recent = store.recent_raw_lines(self.summarize_every).await?;
        let prompt = self.build_prompt(&recent.join("\n"));
        let summary = model.summarize(&prompt).await?;
        if summary.trim().is_empty() {
            return Err(NayukiError::Llm("model returned an empty summary".to_string()));
        }

        let stamp = Local::now().format("%Y-%m-%d %H:%M").to_string();
        let old = store.load_long_term().await?;
        store
            .write_long_term(&merge_memory(&old, &stamp, &summary))
            .await?;

        info!("Long-term memory updated ({} chars)", summary.len());
        Ok(true)
    }
}
