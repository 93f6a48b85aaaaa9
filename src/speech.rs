//! Speech capabilities
//!
//! [`Speaker`] reads replies aloud, [`Listener`] captures one utterance.
//! Both are optional; the shipped adapters drive external programs
//! (e.g. `espeak`, `say`, a whisper wrapper script) as subprocesses.

use crate::{NayukiError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Text-to-speech. Failures are swallowed by the implementation.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str);
}

/// Speech-to-text. An empty string means nothing was captured.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn listen_once(&self) -> Result<String>;
}

/// Pipes the text to an external program's stdin and waits for it to finish
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    /// `argv[0]` is the program; `None` when `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    async fn run(&self, text: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| NayukiError::Speech(format!("failed to start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            // Dropping stdin closes the pipe so the program sees EOF
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NayukiError::Speech(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    async fn speak(&self, text: &str) {
        debug!("Speaking {} chars via {}", text.len(), self.program);
        if let Err(e) = self.run(text).await {
            warn!("Speech output failed: {}", e);
        }
    }
}

/// Runs an external program and returns its trimmed stdout as the transcript
pub struct CommandListener {
    program: String,
    args: Vec<String>,
}

impl CommandListener {
    /// `argv[0]` is the program; `None` when `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl Listener for CommandListener {
    async fn listen_once(&self) -> Result<String> {
        debug!("Listening via {}", self.program);
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|e| NayukiError::Speech(format!("failed to start {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(NayukiError::Speech(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
