//! Control command classification
//!
//! Input starting with one of the known slash words is a control command;
//! everything else (including unknown slash words) is conversation.

use std::fmt;

/// Argument of `/speak`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakArg {
    On,
    Off,
    /// Anything other than exactly one `on`/`off` argument
    Invalid,
}

/// Recognized control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Leave the assistant
    Exit,
    /// Show long-term memory
    Mem,
    /// Clear the turn log (long-term memory is kept)
    Reset,
    /// Show configuration and storage diagnostics
    Stats,
    /// Toggle spoken replies
    Speak(SpeakArg),
    /// Capture one utterance and send it as a conversation turn
    Ptt,
}

/// Result of classifying one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Conversation(String),
}

impl Command {
    /// Commands listed in the startup banner, in display order
    pub fn all() -> &'static [Command] {
        &[
            Command::Exit,
            Command::Mem,
            Command::Reset,
            Command::Stats,
            Command::Speak(SpeakArg::On),
            Command::Ptt,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Exit => "exit",
            Command::Mem => "mem",
            Command::Reset => "reset",
            Command::Stats => "stats",
            Command::Speak(_) => "speak",
            Command::Ptt => "ptt",
        }
    }

    /// Usage form shown to the user
    pub fn usage(&self) -> &'static str {
        match self {
            Command::Speak(_) => "/speak on|off",
            Command::Exit => "/exit",
            Command::Mem => "/mem",
            Command::Reset => "/reset",
            Command::Stats => "/stats",
            Command::Ptt => "/ptt",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::Exit => "leave",
            Command::Mem => "show long-term memory",
            Command::Reset => "clear the chat log (long-term memory is kept)",
            Command::Stats => "show configuration and storage status",
            Command::Speak(_) => "read replies aloud",
            Command::Ptt => "push-to-talk: speak one turn",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

/// Classify trimmed user input. Pure; no side effects.
pub fn classify(input: &str) -> Input {
    let input = input.trim();
    let command = match input {
        "/exit" => Some(Command::Exit),
        "/mem" => Some(Command::Mem),
        "/reset" => Some(Command::Reset),
        "/stats" => Some(Command::Stats),
        "/ptt" => Some(Command::Ptt),
        _ if input.starts_with("/speak") => Some(Command::Speak(parse_speak_arg(input))),
        _ => None,
    };

    match command {
        Some(cmd) => Input::Command(cmd),
        None => Input::Conversation(input.to_string()),
    }
}

fn parse_speak_arg(input: &str) -> SpeakArg {
    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.len() != 2 || parts[0] != "/speak" {
        return SpeakArg::Invalid;
    }
    match parts[1].to_lowercase().as_str() {
        "on" => SpeakArg::On,
        "off" => SpeakArg::Off,
        _ => SpeakArg::Invalid,
    }
}
