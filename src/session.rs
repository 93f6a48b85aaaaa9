//! Interactive session loop
//!
//! One input is fully processed (classification, model call, persistence,
//! summarization, speech) before the next line is read.
//!
//! Per line: `Idle -> Dispatching -> (ExecutingCommand | Conversing) -> Idle`,
//! with `/exit` or end of input leading to `Exited`.

use crate::commands::{classify, Command, Input, SpeakArg};
use crate::config::NayukiConfig;
use crate::event_log::EventLog;
use crate::llm::LanguageModel;
use crate::memory::{now_iso, persona_prompt, ConversationAssembler, MemoryStore, Summarizer, Turn};
use crate::speech::{Listener, Speaker};
use crate::stats::format_stats;
use crate::{NayukiError, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

/// Process-local state mutated by control commands. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub speak_enabled: bool,
}

/// Whether the loop keeps reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Result of executing a control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Nothing more to do for this input
    Handled,
    /// Leave the loop
    Exit,
    /// Continue with this text as an ordinary conversation turn
    Converse(String),
}

pub struct Session<W: Write> {
    config: NayukiConfig,
    store: MemoryStore,
    events: EventLog,
    summarizer: Summarizer,
    persona: String,
    model: Box<dyn LanguageModel>,
    speaker: Option<Box<dyn Speaker>>,
    listener: Option<Box<dyn Listener>>,
    state: SessionState,
    out: W,
}

impl<W: Write> Session<W> {
    pub fn new(config: NayukiConfig, model: Box<dyn LanguageModel>, out: W) -> Self {
        let store = MemoryStore::new(config.chat_log(), config.long_memory());
        let events = EventLog::new(&config.log_dir());
        let summarizer = Summarizer::new(&config);
        let persona = persona_prompt(&config);
        Self {
            config,
            store,
            events,
            summarizer,
            persona,
            model,
            speaker: None,
            listener: None,
            state: SessionState::default(),
            out,
        }
    }

    pub fn with_speaker(mut self, speaker: Box<dyn Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn with_listener(mut self, listener: Box<dyn Listener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Print the banner and record the start event.
    pub async fn start(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "{} model={}",
            self.config.assistant_name,
            self.model.model()
        )?;
        let commands: Vec<String> = Command::all()
            .iter()
            .map(|cmd| format!("{} {}", cmd.usage(), cmd.description()))
            .collect();
        writeln!(self.out, "Commands: {}\n", commands.join(", "))?;

        info!("Session started, model={}", self.model.model());
        self.events
            .record(&format!("App start model={}", self.model.model()))
            .await;
        Ok(())
    }

    /// Read lines until `/exit` or end of input.
    ///
    /// An error inside one turn aborts that turn only; it is logged and shown
    /// as one line. Only failures writing to the console end the loop.
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            write!(self.out, "{}> ", self.config.user_name)?;
            self.out.flush()?;

            let Some(line) = lines.next_line().await? else {
                writeln!(self.out)?;
                info!("End of input");
                self.events.record("App exit (end of input)").await;
                return Ok(());
            };

            match self.handle_line(&line).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return Ok(()),
                Err(e) => self.report_turn_error(&e).await?,
            }
        }
    }

    /// Process one line of input.
    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        let text = match classify(line) {
            Input::Conversation(text) => text,
            Input::Command(cmd) => match self.execute(cmd).await? {
                CommandOutcome::Handled => return Ok(Flow::Continue),
                CommandOutcome::Exit => return Ok(Flow::Exit),
                CommandOutcome::Converse(text) => text,
            },
        };

        self.converse(&text).await?;
        Ok(Flow::Continue)
    }

    /// Execute a control command against the store and session state.
    pub async fn execute(&mut self, cmd: Command) -> Result<CommandOutcome> {
        match cmd {
            Command::Exit => {
                info!("Exit requested");
                self.events.record("App exit").await;
                Ok(CommandOutcome::Exit)
            }
            Command::Mem => {
                let memory = self.store.load_long_term().await?;
                if memory.is_empty() {
                    writeln!(self.out, "(no long-term memory yet)\n")?;
                } else {
                    writeln!(self.out, "{}\n", memory)?;
                }
                Ok(CommandOutcome::Handled)
            }
            Command::Reset => {
                self.store.clear().await?;
                writeln!(
                    self.out,
                    "Cleared {} (long-term memory kept)\n",
                    self.store.chat_log_path().display()
                )?;
                info!("Chat log cleared");
                self.events.record("Chat reset").await;
                Ok(CommandOutcome::Handled)
            }
            Command::Stats => {
                let report = format_stats(
                    &self.config,
                    &self.store,
                    self.model.as_ref(),
                    self.state.speak_enabled,
                )
                .await?;
                writeln!(self.out, "{}\n", report)?;
                Ok(CommandOutcome::Handled)
            }
            Command::Speak(arg) => {
                let enabled = match arg {
                    SpeakArg::On => true,
                    SpeakArg::Off => false,
                    SpeakArg::Invalid => {
                        writeln!(self.out, "Usage: {}\n", cmd.usage())?;
                        return Ok(CommandOutcome::Handled);
                    }
                };
                self.state.speak_enabled = enabled;
                writeln!(self.out, "speak_enabled={}", enabled)?;
                if enabled && self.speaker.is_none() {
                    writeln!(self.out, "(no speech output configured, set tts_command)")?;
                }
                writeln!(self.out)?;
                self.events
                    .record(&format!("speak_enabled={}", enabled))
                    .await;
                Ok(CommandOutcome::Handled)
            }
            Command::Ptt => self.push_to_talk().await,
        }
    }

    async fn push_to_talk(&mut self) -> Result<CommandOutcome> {
        let Some(listener) = &self.listener else {
            writeln!(
                self.out,
                "(push-to-talk unavailable, set stt_command)\n"
            )?;
            return Ok(CommandOutcome::Handled);
        };

        let spoken = match listener.listen_once().await {
            Ok(text) => text,
            Err(e) => {
                warn!("Listen failed: {}", e);
                self.events.record(&format!("STT error: {}", e.detail())).await;
                writeln!(self.out, "Speech capture failed: {}\n", e)?;
                return Ok(CommandOutcome::Handled);
            }
        };

        let spoken = spoken.trim();
        if spoken.is_empty() {
            writeln!(self.out, "(empty input, cancelled)\n")?;
            return Ok(CommandOutcome::Handled);
        }

        writeln!(self.out, "{} (voice) {}", self.config.user_name, spoken)?;
        Ok(CommandOutcome::Converse(spoken.to_string()))
    }

    /// One conversation exchange. A failed model call persists nothing.
    async fn converse(&mut self, text: &str) -> Result<()> {
        let messages =
            ConversationAssembler::new(&self.store, &self.persona, self.config.history_keep)
                .build_messages(text)
                .await?;

        let reply = match self.model.chat(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                let detail = e.detail();
                error!("LLM call failed: {}", detail);
                self.events.record(&format!("LLM error: {}", detail)).await;
                writeln!(self.out, "LLM call failed: {}\n", detail)?;
                return Ok(());
            }
        };

        writeln!(
            self.out,
            "{} ({:.2}s | ~{:.1} tok/s)\n{}\n",
            self.config.assistant_name,
            reply.latency.as_secs_f64(),
            reply.tokens_per_second,
            reply.text
        )?;

        if self.state.speak_enabled {
            if let Some(speaker) = &self.speaker {
                speaker.speak(&reply.text).await;
            }
        }

        let ts = now_iso();
        self.store
            .append_turns(&[
                Turn::user(text, ts.as_str()),
                Turn::assistant(reply.text.as_str(), ts.as_str()),
            ])
            .await?;

        if let Err(e) = self
            .summarizer
            .maybe_summarize(&self.store, self.model.as_ref())
            .await
        {
            warn!("Summarization failed: {}", e);
            self.events.record(&format!("Summarize error: {}", e.detail())).await;
        }

        Ok(())
    }

    async fn report_turn_error(&mut self, e: &NayukiError) -> Result<()> {
        error!("Turn aborted: {}", e);
        self.events.record(&format!("Turn error: {}", e)).await;
        writeln!(self.out, "Error: {}\n", e)?;
        Ok(())
    }
}
