//! Plain-text event journal at `logs/app.log`
//!
//! One line per event: `[YYYY-MM-DD HH:MM:SS] <message>`, local time.
//! Diagnostics go through `tracing`; this file records what happened in the
//! session for the user.

use crate::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

const LOG_FILE_NAME: &str = "app.log";

#[derive(Debug, Clone)]
pub struct EventLog {
    file_path: PathBuf,
}

impl EventLog {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            file_path: log_dir.join(LOG_FILE_NAME),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Append one event line, creating the log directory if needed.
    pub async fn log(&self, message: &str) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await?;
        file.write_all(format!("[{}] {}\n", stamp, message).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }

    /// Like [`EventLog::log`], but a failed write only produces a warning.
    pub async fn record(&self, message: &str) {
        if let Err(e) = self.log(message).await {
            warn!("Failed to write event log {:?}: {}", self.file_path, e);
        }
    }
}
