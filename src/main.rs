//! Nayuki CLI
//!
//! Interactive chat with a local model, with rolling long-term memory.

use clap::Parser;
use nayuki::config::Provider;
use nayuki::{CommandListener, CommandSpeaker, ModelClient, NayukiConfig, Session};
use std::io;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Nayuki - local assistant with long-term memory
#[derive(Parser, Debug)]
#[command(name = "nayuki")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root holding memory/, logs/ and config.toml [env: NAYUKI_ROOT]
    #[arg(short = 'C', long)]
    root: Option<PathBuf>,

    /// Model name [env: NAYUKI_MODEL, MODEL]
    #[arg(short, long)]
    model: Option<String>,

    /// Number of recent turns replayed into each request
    #[arg(long)]
    history_keep: Option<usize>,

    /// Condense the chat log into long-term memory every N lines
    #[arg(long)]
    summarize_every: Option<usize>,

    /// Model server wire format: ollama or openai
    #[arg(long)]
    provider: Option<String>,

    /// Base URL of the model server
    #[arg(long)]
    base_url: Option<String>,

    /// Extra attempts for a failed chat call
    #[arg(long)]
    retries: Option<u32>,

    /// Verbose diagnostics on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let root = resolve_root(cli.root.clone())?;
    let config = apply_cli(NayukiConfig::load(root)?, &cli)?;
    info!("Project root: {:?}", config.root);

    let model = ModelClient::new(&config)?;
    let mut session = Session::new(config.clone(), Box::new(model), io::stdout());
    if let Some(speaker) = config.tts_command.as_deref().and_then(CommandSpeaker::from_argv) {
        session = session.with_speaker(Box::new(speaker));
    }
    if let Some(listener) = config.stt_command.as_deref().and_then(CommandListener::from_argv) {
        session = session.with_listener(Box::new(listener));
    }

    session.start().await?;
    session.run(BufReader::new(tokio::io::stdin())).await?;

    Ok(())
}

/// `--root`, then `NAYUKI_ROOT`, then the current directory
fn resolve_root(cli_root: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let root = match cli_root.or_else(|| std::env::var("NAYUKI_ROOT").ok().map(PathBuf::from)) {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&root)?;
    Ok(std::fs::canonicalize(&root)?)
}

/// CLI flags override every other configuration source
fn apply_cli(mut config: NayukiConfig, cli: &Cli) -> anyhow::Result<NayukiConfig> {
    if let Some(model) = &cli.model {
        config = config.with_model(model.as_str());
    }
    if let Some(keep) = cli.history_keep {
        config = config.with_history_keep(keep);
    }
    if let Some(every) = cli.summarize_every {
        config = config.with_summarize_every(every);
    }
    if let Some(name) = &cli.provider {
        let provider = Provider::parse(name)
            .ok_or_else(|| anyhow::anyhow!("unknown provider '{}' (expected ollama or openai)", name))?;
        if provider != config.provider {
            config = config.with_provider(provider);
        }
    }
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url);
    }
    if let Some(retries) = cli.retries {
        config = config.with_chat_retries(retries);
    }
    config.validate()?;
    Ok(config)
}
