//! Command-line interface for recapd.
//!
//! `handle` is the queue-consumer entrypoint: it reads one storage-event
//! envelope (file or stdin), runs the ingestion pipeline, and exits non-zero
//! on fatal outcomes so the queue runtime counts a failed receive. The other
//! commands are operator conveniences over the local meetings database.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{
    ChatCompletionsClient, HttpObjectStore, LeaseStore, LogNotifier, MemoryLeaseStore, Notifier,
    RedisLeaseStore, TelegramClient, WhisperApiClient,
};
use crate::config::Config;
use crate::core::{JobOutcome, Orchestrator, SkipReason};
use crate::db::Database;
use crate::ingest::FfmpegExtractor;

/// recapd - meeting-recording ingestion worker
#[derive(Parser, Debug)]
#[command(name = "recapd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path (defaults to ./recapd.yaml, then ~/.recapd/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Handle one queue message (storage-event envelope)
    Handle {
        /// Event JSON file (reads from stdin if not provided)
        #[arg(short, long)]
        event: Option<PathBuf>,
    },

    /// List recent meetings
    Meetings {
        /// Maximum number of meetings to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one meeting with its participants
    Show {
        /// Meeting id
        id: i64,

        /// Print the full transcript as well
        #[arg(long)]
        transcript: bool,
    },

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match self.command {
            Commands::Handle { event } => handle_event(config, event).await,
            Commands::Meetings { limit } => list_meetings(&config, limit),
            Commands::Show { id, transcript } => show_meeting(&config, id, transcript),
            Commands::Config => show_config(&config),
        }
    }
}

/// Run the ingestion pipeline for one queue message
async fn handle_event(config: Config, event_file: Option<PathBuf>) -> Result<()> {
    let body = if let Some(path) = event_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read event file: {}", path.display()))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read event from stdin")?;
        buffer
    };

    if body.trim().is_empty() {
        anyhow::bail!("No event provided. Use --event <file> or pipe the envelope to stdin");
    }

    let orchestrator = build_orchestrator(&config)?;

    match orchestrator.handle_message(&body).await {
        Ok(JobOutcome::Completed {
            meeting_id,
            title,
            elapsed_secs,
            ..
        }) => {
            eprintln!(
                "✅ Meeting {} ingested in {}s: {}",
                meeting_id, elapsed_secs, title
            );
            Ok(())
        }
        Ok(JobOutcome::Skipped { object_key, reason }) => {
            let reason_str = match reason {
                SkipReason::LeaseHeld => "another worker holds the lease",
                SkipReason::AlreadyProcessed => "already processed",
            };
            eprintln!("⏭ Skipped {}: {}", object_key, reason_str);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Ingestion failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Wire collaborator clients from configuration
fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let endpoint = config
        .storage_endpoint
        .clone()
        .context("storage.endpoint is required (or RECAPD_STORAGE_ENDPOINT)")?;
    let stt_api_key = config
        .stt_api_key
        .clone()
        .context("STT API key is required (RECAPD_STT_API_KEY or GROQ_API_KEY)")?;
    let llm_api_key = config
        .llm_api_key
        .clone()
        .context("LLM API key is required (RECAPD_LLM_API_KEY or GROQ_API_KEY)")?;

    let store = Arc::new(HttpObjectStore::new(endpoint, config.storage_token.clone()));

    let leases: Arc<dyn LeaseStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisLeaseStore::new(url)?),
        None => {
            tracing::warn!(
                "No redis_url configured: using the in-process lease store \
                 (safe only with a single worker)"
            );
            Arc::new(MemoryLeaseStore::new())
        }
    };

    let extractor = Arc::new(FfmpegExtractor::new(
        config.chunk_secs,
        config.chunk_overlap_secs,
    ));

    let stt = Arc::new(WhisperApiClient::new(
        config.stt_base_url.clone(),
        stt_api_key,
        config.stt_model.clone(),
        config.stt_language.clone(),
    ));

    let digest = Arc::new(ChatCompletionsClient::new(
        config.llm_base_url.clone(),
        llm_api_key,
        config.llm_model.clone(),
    ));

    let notifier: Arc<dyn Notifier> = match config.telegram.clone() {
        Some(telegram) => Arc::new(TelegramClient::from_config(telegram)),
        None => Arc::new(LogNotifier),
    };

    let db = Arc::new(Database::open(&config.db_path)?);

    Ok(Orchestrator::new(
        store,
        leases,
        extractor,
        stt,
        digest,
        notifier,
        db,
        config.pipeline_settings(),
    ))
}

/// List recent meetings
fn list_meetings(config: &Config, limit: usize) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let meetings = db.list_recent(limit)?;

    if meetings.is_empty() {
        println!("No meetings yet. Run 'recapd handle' on a storage event to ingest one.");
        return Ok(());
    }

    println!(
        "{:<6} {:<32} {:<30} {:<10} {:<20}",
        "ID", "FILE", "TITLE", "DURATION", "CREATED"
    );
    println!("{}", "-".repeat(100));

    for meeting in meetings {
        let title = truncate(&meeting.title, 28);
        let filename = truncate(&meeting.filename, 30);
        let duration_secs = meeting.duration_ms / 1000;

        println!(
            "{:<6} {:<32} {:<30} {:<10} {:<20}",
            meeting.id,
            filename,
            title,
            format!("{}m{:02}s", duration_secs / 60, duration_secs % 60),
            meeting.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    Ok(())
}

/// Show one meeting in detail
fn show_meeting(config: &Config, id: i64, with_transcript: bool) -> Result<()> {
    let db = Database::open(&config.db_path)?;

    let meeting = db
        .get_meeting(id)?
        .with_context(|| format!("Meeting {} not found", id))?;
    let participants = db.participants_for(id)?;

    println!();
    println!("Meeting {}", meeting.id);
    println!("══════════════════════════════════════════════════════════════");
    println!("Title:    {}", meeting.title);
    println!("Source:   {}", meeting.filename);
    println!(
        "Duration: {}m{:02}s",
        meeting.duration_ms / 60000,
        (meeting.duration_ms / 1000) % 60
    );
    println!("Created:  {}", meeting.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!();
    println!("Short summary:");
    println!("  {}", meeting.short_summary);
    println!();
    println!("Summary:");
    println!("{}", meeting.summary);

    if !participants.is_empty() {
        println!();
        println!("Participants:");
        for participant in &participants {
            println!("  - {} ({})", participant.name, participant.role);
        }
    }

    if with_transcript {
        println!();
        println!("Transcript:");
        println!("{}", meeting.transcription);
    }

    Ok(())
}

/// Show the resolved configuration
fn show_config(config: &Config) -> Result<()> {
    println!();
    println!("recapd configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!(
        "Config file:  {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - env + defaults)".to_string())
    );
    println!();
    println!(
        "Storage:      {}",
        config.storage_endpoint.as_deref().unwrap_or("(unset)")
    );
    println!(
        "Coordination: {}",
        config.redis_url.as_deref().unwrap_or("(in-process)")
    );
    println!("Database:     {}", config.db_path.display());
    println!();
    println!("STT:          {} ({})", config.stt_base_url, config.stt_model);
    println!(
        "Language:     {}",
        config.stt_language.as_deref().unwrap_or("(autodetect)")
    );
    println!("LLM:          {} ({})", config.llm_base_url, config.llm_model);
    println!(
        "Notifier:     {}",
        if config.telegram.is_some() {
            "telegram"
        } else {
            "log"
        }
    );
    println!();
    println!("Pipeline:");
    println!("  Chunk length:  {}s", config.chunk_secs);
    println!("  Chunk overlap: {}s", config.chunk_overlap_secs);
    println!("  Workers:       {}", config.transcribe_workers);
    println!(
        "  Retry:         {} attempts, {}ms base, x{}",
        config.retry.max_attempts, config.retry.initial_delay_ms, config.retry.backoff_multiplier
    );
    println!("  Deadline:      {}s", config.deadline_secs);
    println!("  Lease TTL:     {}s", config.lease_ttl_secs);

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let truncated: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long meeting title", 10), "a very ...");
    }
}
