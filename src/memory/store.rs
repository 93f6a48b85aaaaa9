//! File-backed memory: an append-only JSONL turn log plus one long-term
//! memory text file that is rewritten on every update.

use crate::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// One recorded message. Serialized as `{"role","content","ts"}` on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    /// Local time, ISO-8601 with second precision. Empty on records written without one.
    #[serde(default)]
    pub ts: String,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            ts: ts.into(),
        }
    }

    pub fn user(content: impl Into<String>, ts: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content, ts)
    }

    pub fn assistant(content: impl Into<String>, ts: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content, ts)
    }
}

/// Current local time as `YYYY-MM-DDTHH:MM:SS`
pub fn now_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Owner of `chat_log.jsonl` and `long_memory.txt`
#[derive(Debug, Clone)]
pub struct MemoryStore {
    chat_log: PathBuf,
    long_memory: PathBuf,
}

impl MemoryStore {
    pub fn new(chat_log: PathBuf, long_memory: PathBuf) -> Self {
        Self {
            chat_log,
            long_memory,
        }
    }

    /// Store with the standard file names inside `memory_dir`
    pub fn in_dir(memory_dir: &Path) -> Self {
        Self::new(
            memory_dir.join("chat_log.jsonl"),
            memory_dir.join("long_memory.txt"),
        )
    }

    pub fn chat_log_path(&self) -> &Path {
        &self.chat_log
    }

    pub fn long_term_path(&self) -> &Path {
        &self.long_memory
    }

    /// Append one turn as a new JSON line. Write failures propagate.
    pub async fn append_turn(&self, turn: &Turn) -> Result<()> {
        self.append_turns(std::slice::from_ref(turn)).await
    }

    /// Append several turns with a single write, so an exchange lands whole.
    pub async fn append_turns(&self, turns: &[Turn]) -> Result<()> {
        if let Some(parent) = self.chat_log.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut buf = String::new();
        for turn in turns {
            buf.push_str(&serde_json::to_string(turn)?);
            buf.push('\n');
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.chat_log)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// All well-formed turns in log order. Unparseable lines are dropped.
    pub async fn read_all(&self) -> Result<Vec<Turn>> {
        let Some(content) = self.read_chat_log().await? else {
            return Ok(Vec::new());
        };

        let mut turns = Vec::new();
        for (index, line) in content.lines().enumerate() {
            match serde_json::from_str::<Turn>(line) {
                Ok(turn) => turns.push(turn),
                Err(e) => debug!("Skipping chat log line {}: {}", index + 1, e),
            }
        }
        Ok(turns)
    }

    /// The last `n` turns of [`MemoryStore::read_all`], oldest first.
    pub async fn load_recent(&self, n: usize) -> Result<Vec<Turn>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut turns = self.read_all().await?;
        let start = turns.len().saturating_sub(n);
        Ok(turns.split_off(start))
    }

    /// Delete the turn log. Long-term memory is not touched.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.chat_log).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Raw line count of the turn log, malformed lines included
    pub async fn line_count(&self) -> Result<usize> {
        Ok(self
            .read_chat_log()
            .await?
            .map(|content| content.lines().count())
            .unwrap_or(0))
    }

    /// The last `n` raw lines of the turn log, verbatim
    pub async fn recent_raw_lines(&self, n: usize) -> Result<Vec<String>> {
        let Some(content) = self.read_chat_log().await? else {
            return Ok(Vec::new());
        };
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(n);
        Ok(lines[start..].iter().map(|l| l.to_string()).collect())
    }

    /// Long-term memory, trimmed; empty when there is none yet.
    pub async fn load_long_term(&self) -> Result<String> {
        match fs::read_to_string(&self.long_memory).await {
            Ok(content) => Ok(content.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite long-term memory with `trim(text)` plus one newline.
    /// Blank text removes the file so it never holds an empty summary.
    pub async fn write_long_term(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return match fs::remove_file(&self.long_memory).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }
        if let Some(parent) = self.long_memory.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.long_memory, format!("{}\n", text)).await?;
        Ok(())
    }

    /// Size of the long-term memory file in bytes, 0 if absent
    pub async fn long_term_size(&self) -> Result<u64> {
        match fs::metadata(&self.long_memory).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub fn has_long_term(&self) -> bool {
        self.long_memory.exists()
    }

    async fn read_chat_log(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.chat_log).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
