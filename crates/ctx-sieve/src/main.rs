//! `sieve`: run the pruning engine over a recorded conversation.
//!
//! Transcripts are JSON: either an array of messages or an object with a
//! `messages` array, in the format of [`ctx_sieve::Message`].
//!
//! # Examples
//!
//! ```sh
//! # What would be pruned?
//! sieve analyze session.json --config .sieve/config.json
//!
//! # Print the pruned transcript
//! sieve analyze session.json --apply > pruned.json
//!
//! # Token breakdown and statistics after one pass
//! sieve stats session.json
//!
//! # Config file tooling
//! sieve schema > sieve.schema.json
//! sieve check-config .sieve/config.json
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ctx_sieve::engine::report;
use ctx_sieve::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Context-pruning decision engine for coding-agent conversations.
#[derive(Parser)]
#[command(name = "sieve", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log engine decisions at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run one pruning pass over a transcript and report the decisions.
    Analyze {
        /// Transcript JSON file.
        transcript: PathBuf,
        /// Config override file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the pruned transcript instead of the decisions.
        #[arg(long)]
        apply: bool,
        /// Print decisions as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print context breakdown and statistics after one pass.
    Stats {
        transcript: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the config file JSON Schema.
    Schema,
    /// Validate a config file against the schema.
    CheckConfig { file: PathBuf },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Transcript {
    Bare(Vec<Message>),
    Wrapped { messages: Vec<Message> },
}

impl Transcript {
    fn into_messages(self) -> Vec<Message> {
        match self {
            Transcript::Bare(messages) | Transcript::Wrapped { messages } => messages,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Command::Analyze { config, .. } | Command::Stats { config, .. } => config.clone(),
        _ => None,
    };
    let debug = cli.verbose || config_path.as_deref().is_some_and(config_requests_debug);
    let level = if debug { LevelFilter::DEBUG } else { LevelFilter::WARN };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(level)
        .init();

    let result = match cli.command {
        Command::Analyze {
            transcript,
            config,
            apply,
            json,
        } => analyze(&transcript, config.as_deref(), apply, json).await,
        Command::Stats { transcript, config } => stats(&transcript, config.as_deref()).await,
        Command::Schema => print_json(&SieveConfig::json_schema()),
        Command::CheckConfig { file } => check_config(&file).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Whether the config file asks for debug logging. Read before the
/// subscriber is installed, so failures here are silent.
fn config_requests_debug(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .and_then(|v| v.get("debug").and_then(|d| d.as_bool()))
        .unwrap_or(false)
}

fn load_config(path: Option<&Path>) -> SieveConfig {
    path.map(SieveConfig::load).unwrap_or_default()
}

async fn load_transcript(path: &Path) -> Result<Vec<Message>, String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read transcript {}: {e}", path.display()))?;
    let transcript: Transcript = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse transcript {}: {e}", path.display()))?;
    Ok(transcript.into_messages())
}

/// Replay `messages` into a fresh manager and run one pass.
fn run_pass(config: SieveConfig, messages: &mut [Message]) -> (ContextManager, TransformOutcome) {
    let mut manager = ContextManager::new(config).with_notification_sink(LogNotifier);
    manager.on_session_created("cli");
    manager.replay(messages);
    debug!(
        "Replayed {} message(s) over {} turn(s)",
        messages.len(),
        manager.state().turn
    );
    let outcome = manager.transform(messages);
    (manager, outcome)
}

fn print_json(value: &impl serde::Serialize) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize output: {e}"))?;
    println!("{text}");
    Ok(())
}

async fn analyze(
    transcript: &Path,
    config: Option<&Path>,
    apply: bool,
    as_json: bool,
) -> Result<(), String> {
    let mut messages = load_transcript(transcript).await?;
    let (mut manager, outcome) = run_pass(load_config(config), &mut messages);
    manager.on_idle().await;

    if apply {
        return print_json(&messages);
    }
    if as_json {
        return print_json(&json!({
            "applied": outcome.applied,
            "tokens_saved": outcome.tokens_saved(),
            "nudge": outcome.nudge,
            "notification": outcome.notification,
            "usage": {
                "estimated_tokens": outcome.usage.estimated_tokens,
                "limit": outcome.usage.limit,
            },
        }));
    }

    if outcome.applied.is_empty() {
        println!("Nothing to prune.");
    }
    for r in &outcome.applied {
        println!(
            "{:<18} {:<24} {:<8} ~{:>6} tokens  {}",
            r.strategy.to_string(),
            r.target,
            r.tool,
            r.tokens_saved,
            r.reason
        );
    }
    if !outcome.applied.is_empty() {
        println!(
            "\n{} item(s), ~{} tokens saved",
            outcome.applied.len(),
            report::thousands(outcome.tokens_saved())
        );
    }
    if let Some(nudge) = &outcome.nudge {
        println!("\n{nudge}");
    }
    Ok(())
}

async fn stats(transcript: &Path, config: Option<&Path>) -> Result<(), String> {
    let mut messages = load_transcript(transcript).await?;
    let (manager, _) = run_pass(load_config(config), &mut messages);
    println!(
        "{}\n\n{}",
        report::format_context_breakdown(&manager.context_breakdown(&messages)),
        manager.format_stats()
    );
    Ok(())
}

async fn check_config(file: &Path) -> Result<(), String> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("Failed to read config {}: {e}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| format!("Failed to parse config: {e}"))?;

    let violations = SieveConfig::validate_json(&value);
    if violations.is_empty() {
        println!("{}: ok", file.display());
        return Ok(());
    }
    for v in &violations {
        println!("{v}");
    }
    Err(format!("{} violation(s) in {}", violations.len(), file.display()))
}
