//! Integration tests for the Nayuki session and memory pipeline

use async_trait::async_trait;
use nayuki::memory::{MemoryStore, Summarizer, Turn, LONG_TERM_MEMORY_HEADER};
use nayuki::{
    ChatMessage, ChatReply, CommandOutcome, ConversationAssembler, Flow, LanguageModel, Listener,
    NayukiConfig, NayukiError, Role, Session, Speaker,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ─── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct ModelLog {
    chats: Vec<Vec<ChatMessage>>,
    summaries: Vec<String>,
}

struct FakeModel {
    log: Arc<Mutex<ModelLog>>,
    fail_chat: bool,
    fail_summarize: bool,
}

impl FakeModel {
    fn new() -> (Self, Arc<Mutex<ModelLog>>) {
        let log = Arc::new(Mutex::new(ModelLog::default()));
        let model = Self {
            log: log.clone(),
            fail_chat: false,
            fail_summarize: false,
        };
        (model, log)
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> nayuki::Result<ChatReply> {
        let mut log = self.log.lock().unwrap();
        log.chats.push(messages.to_vec());
        if self.fail_chat {
            return Err(NayukiError::Llm("network: connection refused".to_string()));
        }
        Ok(ChatReply::new(
            format!("reply {}", log.chats.len()),
            Duration::from_millis(500),
        ))
    }

    async fn summarize(&self, prompt: &str) -> nayuki::Result<String> {
        self.log.lock().unwrap().summaries.push(prompt.to_string());
        if self.fail_summarize {
            return Err(NayukiError::Llm("timeout: summarize".to_string()));
        }
        Ok("- building a CLI\n- prefers no emoji".to_string())
    }

    async fn list_models(&self) -> nayuki::Result<Vec<String>> {
        Ok(vec!["fake-model:latest".to_string()])
    }
}

struct FakeSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Speaker for FakeSpeaker {
    async fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}

struct FakeListener {
    transcript: String,
}

#[async_trait]
impl Listener for FakeListener {
    async fn listen_once(&self) -> nayuki::Result<String> {
        Ok(self.transcript.clone())
    }
}

fn test_config(temp_dir: &TempDir) -> NayukiConfig {
    NayukiConfig::new(temp_dir.path().to_path_buf())
}

fn output_of(session: &Session<Vec<u8>>) -> String {
    String::from_utf8_lossy(session.output()).to_string()
}

fn app_log(config: &NayukiConfig) -> String {
    std::fs::read_to_string(config.log_dir().join("app.log")).unwrap_or_default()
}

// ─── Memory store properties ────────────────────────────────────────

/// load_recent(n) returns exactly the last min(n, total) turns in order
#[tokio::test]
async fn test_load_recent_returns_tail_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let store = MemoryStore::in_dir(&temp_dir.path().join("memory"));

    let mut expected = Vec::new();
    for total in 0..6 {
        for n in 0..8 {
            let recent: Vec<String> = store
                .load_recent(n)
                .await
                .unwrap()
                .into_iter()
                .map(|t| t.content)
                .collect();
            let start = expected.len().saturating_sub(n);
            assert_eq!(recent, expected[start..].to_vec(), "total={} n={}", total, n);
        }
        let content = format!("turn {}", total);
        store.append_turn(&Turn::user(content.as_str(), "t")).await.unwrap();
        expected.push(content);
    }
}

#[tokio::test]
async fn test_long_term_round_trip_is_trimmed() {
    let temp_dir = TempDir::new().unwrap();
    let store = MemoryStore::in_dir(&temp_dir.path().join("memory"));

    for text in ["plain", "  padded \n\n", "multi\nline\n", "\n\n長期記憶\n"] {
        store.write_long_term(text).await.unwrap();
        assert_eq!(store.load_long_term().await.unwrap(), text.trim());
        let raw = std::fs::read_to_string(store.long_term_path()).unwrap();
        assert!(raw.ends_with('\n') && !raw.ends_with("\n\n"));
    }
}

// ─── Summarization trigger ──────────────────────────────────────────

/// With summarize_every=20: 19 lines trigger nothing, the 20th triggers once
#[tokio::test]
async fn test_summarize_fires_exactly_at_multiple() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir).with_summarize_every(20);
    let store = MemoryStore::new(config.chat_log(), config.long_memory());
    let summarizer = Summarizer::new(&config);
    let (model, log) = FakeModel::new();

    for i in 0..19 {
        store
            .append_turn(&Turn::user(format!("line {}", i), "t"))
            .await
            .unwrap();
        assert!(!summarizer.maybe_summarize(&store, &model).await.unwrap());
    }
    assert!(log.lock().unwrap().summaries.is_empty());

    store.append_turn(&Turn::assistant("line 19", "t")).await.unwrap();
    assert!(summarizer.maybe_summarize(&store, &model).await.unwrap());

    let log = log.lock().unwrap();
    assert_eq!(log.summaries.len(), 1);
    assert!(log.summaries[0].contains("line 0"));
    assert!(log.summaries[0].contains("line 19"));

    let memory = store.load_long_term().await.unwrap();
    assert!(memory.starts_with('['));
    assert!(memory.ends_with("- prefers no emoji"));
}

#[tokio::test]
async fn test_summaries_accumulate_with_blank_line() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir).with_summarize_every(2);
    let store = MemoryStore::new(config.chat_log(), config.long_memory());
    store.write_long_term("[2024-01-01 09:00]\nolder summary").await.unwrap();
    let summarizer = Summarizer::new(&config);
    let (model, _log) = FakeModel::new();

    store.append_turn(&Turn::user("q", "t")).await.unwrap();
    store.append_turn(&Turn::assistant("a", "t")).await.unwrap();
    assert!(summarizer.maybe_summarize(&store, &model).await.unwrap());

    let memory = store.load_long_term().await.unwrap();
    assert!(memory.starts_with("[2024-01-01 09:00]\nolder summary\n\n["));
}

// ─── Conversation assembly ──────────────────────────────────────────

/// history_keep=2, turns A, B, C, then "D": persona, B, C, D
#[tokio::test]
async fn test_window_excludes_older_turns() {
    let temp_dir = TempDir::new().unwrap();
    let store = MemoryStore::in_dir(&temp_dir.path().join("memory"));
    for content in ["A", "B", "C"] {
        store.append_turn(&Turn::user(content, "t")).await.unwrap();
    }

    let messages = ConversationAssembler::new(&store, "persona", 2)
        .build_messages("D")
        .await
        .unwrap();

    assert_eq!(
        messages,
        vec![
            ChatMessage::system("persona"),
            ChatMessage::user("B"),
            ChatMessage::user("C"),
            ChatMessage::user("D"),
        ]
    );
}

#[tokio::test]
async fn test_message_count_invariant() {
    let temp_dir = TempDir::new().unwrap();
    let store = MemoryStore::in_dir(&temp_dir.path().join("memory"));

    for stored in 0..5usize {
        for keep in 0..4usize {
            for with_memory in [false, true] {
                if with_memory {
                    store.write_long_term("memo").await.unwrap();
                } else {
                    store.write_long_term("").await.unwrap();
                }
                let messages = ConversationAssembler::new(&store, "persona", keep)
                    .build_messages("new")
                    .await
                    .unwrap();
                let expected = 1 + usize::from(with_memory) + keep.min(stored) + 1;
                assert_eq!(messages.len(), expected);
                assert_eq!(messages[0].role, Role::System);
                assert_eq!(messages.last(), Some(&ChatMessage::user("new")));
                if with_memory {
                    assert!(messages[1].content.starts_with(LONG_TERM_MEMORY_HEADER));
                }
            }
        }
        store
            .append_turn(&Turn::user(format!("s{}", stored), "t"))
            .await
            .unwrap();
    }
}

// ─── Session loop ───────────────────────────────────────────────────

#[tokio::test]
async fn test_conversation_turn_is_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let (model, log) = FakeModel::new();
    let mut session = Session::new(config, Box::new(model), Vec::new());

    let flow = session.handle_line("  what's up?  ").await.unwrap();
    assert_eq!(flow, Flow::Continue);

    let turns = session.store().read_all().await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].content, "what's up?");
    assert_eq!(turns[1].content, "reply 1");
    assert_eq!(turns[0].ts, turns[1].ts);

    assert!(output_of(&session).contains("Nayuki (0.50s | ~2.0 tok/s)\nreply 1"));
    assert_eq!(log.lock().unwrap().chats[0].len(), 2);
}

#[tokio::test]
async fn test_second_turn_sees_first_exchange() {
    let temp_dir = TempDir::new().unwrap();
    let (model, log) = FakeModel::new();
    let mut session = Session::new(test_config(&temp_dir), Box::new(model), Vec::new());

    session.handle_line("first").await.unwrap();
    session.handle_line("second").await.unwrap();

    let log = log.lock().unwrap();
    let second = &log.chats[1];
    assert_eq!(second.len(), 4);
    assert_eq!(second[1], ChatMessage::user("first"));
    assert_eq!(second[2], ChatMessage::assistant("reply 1"));
    assert_eq!(second[3], ChatMessage::user("second"));
}

#[tokio::test]
async fn test_chat_failure_appends_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let (mut model, log) = FakeModel::new();
    model.fail_chat = true;
    let mut session = Session::new(config.clone(), Box::new(model), Vec::new());

    let flow = session.handle_line("hello").await.unwrap();
    assert_eq!(flow, Flow::Continue);
    assert!(session.store().read_all().await.unwrap().is_empty());
    let events = app_log(&config);
    assert!(events.contains("LLM error: network: connection refused"));
    assert!(!events.contains("LLM error: LLM error"));
    assert!(output_of(&session).contains("LLM call failed: network: connection refused\n"));

    // Still responsive afterwards
    assert_eq!(session.handle_line("/mem").await.unwrap(), Flow::Continue);
    assert_eq!(log.lock().unwrap().chats.len(), 1);
}

#[tokio::test]
async fn test_session_summarizes_on_cadence() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir).with_summarize_every(4);
    let (model, log) = FakeModel::new();
    let mut session = Session::new(config, Box::new(model), Vec::new());

    session.handle_line("one").await.unwrap();
    assert!(log.lock().unwrap().summaries.is_empty());
    session.handle_line("two").await.unwrap();
    assert_eq!(log.lock().unwrap().summaries.len(), 1);

    let memory = session.store().load_long_term().await.unwrap();
    assert!(memory.contains("- building a CLI"));
}

#[tokio::test]
async fn test_summarize_failure_is_silent() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir).with_summarize_every(2);
    let (mut model, _log) = FakeModel::new();
    model.fail_summarize = true;
    let mut session = Session::new(config.clone(), Box::new(model), Vec::new());

    assert_eq!(session.handle_line("hi").await.unwrap(), Flow::Continue);

    assert_eq!(session.store().read_all().await.unwrap().len(), 2);
    assert_eq!(session.store().load_long_term().await.unwrap(), "");
    assert!(app_log(&config).contains("Summarize error: timeout: summarize"));
    assert!(!output_of(&session).contains("Summarize"));
}

#[tokio::test]
async fn test_reset_keeps_long_term_memory() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let (model, _log) = FakeModel::new();
    let mut session = Session::new(config.clone(), Box::new(model), Vec::new());

    for i in 0..5 {
        session
            .store()
            .append_turn(&Turn::user(format!("t{}", i), "t"))
            .await
            .unwrap();
    }
    session.store().write_long_term("keep me").await.unwrap();

    assert_eq!(session.handle_line("/reset").await.unwrap(), Flow::Continue);

    assert!(session.store().read_all().await.unwrap().is_empty());
    assert_eq!(session.store().load_long_term().await.unwrap(), "keep me");
    assert!(app_log(&config).contains("Chat reset"));
}

#[tokio::test]
async fn test_mem_shows_placeholder_then_memory() {
    let temp_dir = TempDir::new().unwrap();
    let (model, _log) = FakeModel::new();
    let mut session = Session::new(test_config(&temp_dir), Box::new(model), Vec::new());

    session.handle_line("/mem").await.unwrap();
    assert!(output_of(&session).contains("(no long-term memory yet)"));

    session.store().write_long_term("likes green tea").await.unwrap();
    session.handle_line("/mem").await.unwrap();
    assert!(output_of(&session).contains("likes green tea"));
}

#[tokio::test]
async fn test_speak_toggle_and_usage() {
    let temp_dir = TempDir::new().unwrap();
    let (model, _log) = FakeModel::new();
    let spoken = Arc::new(Mutex::new(Vec::new()));
    let mut session = Session::new(test_config(&temp_dir), Box::new(model), Vec::new())
        .with_speaker(Box::new(FakeSpeaker {
            spoken: spoken.clone(),
        }));

    session.handle_line("quiet turn").await.unwrap();
    assert!(spoken.lock().unwrap().is_empty());

    session.handle_line("/speak maybe").await.unwrap();
    assert!(!session.state().speak_enabled);
    assert!(output_of(&session).contains("Usage: /speak on|off"));

    session.handle_line("/speak on").await.unwrap();
    assert!(session.state().speak_enabled);
    session.handle_line("loud turn").await.unwrap();
    assert_eq!(*spoken.lock().unwrap(), vec!["reply 2".to_string()]);

    session.handle_line("/speak off").await.unwrap();
    assert!(!session.state().speak_enabled);
}

#[tokio::test]
async fn test_ptt_falls_through_to_conversation() {
    let temp_dir = TempDir::new().unwrap();
    let (model, log) = FakeModel::new();
    let mut session = Session::new(test_config(&temp_dir), Box::new(model), Vec::new())
        .with_listener(Box::new(FakeListener {
            transcript: "remind me about tea".to_string(),
        }));

    let outcome = session.execute(nayuki::Command::Ptt).await.unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::Converse("remind me about tea".to_string())
    );
    assert!(log.lock().unwrap().chats.is_empty());

    session.handle_line("/ptt").await.unwrap();
    let turns = session.store().read_all().await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].content, "remind me about tea");
}

#[tokio::test]
async fn test_ptt_empty_capture_cancels() {
    let temp_dir = TempDir::new().unwrap();
    let (model, log) = FakeModel::new();
    let mut session = Session::new(test_config(&temp_dir), Box::new(model), Vec::new())
        .with_listener(Box::new(FakeListener {
            transcript: "   ".to_string(),
        }));

    session.handle_line("/ptt").await.unwrap();
    assert!(output_of(&session).contains("(empty input, cancelled)"));
    assert!(log.lock().unwrap().chats.is_empty());
    assert!(session.store().read_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ptt_without_listener() {
    let temp_dir = TempDir::new().unwrap();
    let (model, log) = FakeModel::new();
    let mut session = Session::new(test_config(&temp_dir), Box::new(model), Vec::new());

    session.handle_line("/ptt").await.unwrap();
    assert!(output_of(&session).contains("push-to-talk unavailable"));
    assert!(log.lock().unwrap().chats.is_empty());
}

#[tokio::test]
async fn test_stats_report() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let (model, _log) = FakeModel::new();
    let mut session = Session::new(config, Box::new(model), Vec::new());

    session.handle_line("hello").await.unwrap();
    session.handle_line("/stats").await.unwrap();

    let output = output_of(&session);
    assert!(output.contains("model=fake-model"));
    assert!(output.contains("history_keep=14"));
    assert!(output.contains("summarize_every=20"));
    assert!(output.contains("(lines=2)"));
    assert!(output.contains("exists=false, size=0.00MB"));
    assert!(output.contains("Installed models:\nfake-model:latest"));
}

#[tokio::test]
async fn test_exit_ends_run_loop() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let (model, log) = FakeModel::new();
    let mut session = Session::new(config.clone(), Box::new(model), Vec::new());

    session.start().await.unwrap();
    let input: &[u8] = b"hello\n\n/exit\nnever read\n";
    session.run(input).await.unwrap();

    assert_eq!(log.lock().unwrap().chats.len(), 1);
    let events = app_log(&config);
    assert!(events.contains("App start model=fake-model"));
    assert!(events.contains("App exit"));
    assert!(output_of(&session).contains("Commands: /exit"));
}

#[tokio::test]
async fn test_end_of_input_exits_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let (model, _log) = FakeModel::new();
    let mut session = Session::new(config.clone(), Box::new(model), Vec::new());

    let input: &[u8] = b"/stats\n";
    session.run(input).await.unwrap();
    assert!(app_log(&config).contains("App exit (end of input)"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_storage_failure_aborts_turn_only() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    std::fs::create_dir_all(config.memory_dir()).unwrap();
    // A directory where the chat log should be
    std::fs::create_dir_all(config.chat_log()).unwrap();
    let (model, _log) = FakeModel::new();
    let mut session = Session::new(config.clone(), Box::new(model), Vec::new());

    let input: &[u8] = b"hello\n/exit\n";
    session.run(input).await.unwrap();

    assert!(output_of(&session).contains("Error: IO error"));
    assert!(app_log(&config).contains("Turn error"));
    assert!(app_log(&config).contains("App exit"));
}
