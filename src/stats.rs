//! `/stats` diagnostic report

use crate::config::NayukiConfig;
use crate::llm::LanguageModel;
use crate::memory::MemoryStore;
use crate::Result;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Read-only snapshot of configuration, storage and backend state
pub async fn format_stats(
    config: &NayukiConfig,
    store: &MemoryStore,
    model: &dyn LanguageModel,
    speak_enabled: bool,
) -> Result<String> {
    let chat_lines = store.line_count().await?;
    let long_mem_exists = store.has_long_term();
    let long_mem_mb = store.long_term_size().await? as f64 / BYTES_PER_MB;
    let ollama_models =
        std::env::var("OLLAMA_MODELS").unwrap_or_else(|_| "(unknown)".to_string());

    let mut parts = vec![
        format!("model={}", model.model()),
        format!("provider={} ({})", config.provider, config.base_url),
        format!("history_keep={}", config.history_keep),
        format!("summarize_every={}", config.summarize_every),
        format!("project_root={}", config.root.display()),
        format!(
            "chat_log={} (lines={})",
            store.chat_log_path().display(),
            chat_lines
        ),
        format!(
            "long_memory={} (exists={}, size={:.2}MB)",
            store.long_term_path().display(),
            long_mem_exists,
            long_mem_mb
        ),
        format!("ollama_models_env={}", ollama_models),
        format!("speak_enabled={}", speak_enabled),
        String::new(),
        "Installed models:".to_string(),
    ];

    match model.list_models().await {
        Ok(models) if models.is_empty() => parts.push("(none)".to_string()),
        Ok(models) => parts.extend(models),
        Err(e) => parts.push(format!("model list error: {}", e)),
    }

    Ok(parts.join("\n"))
}
