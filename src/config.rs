//! Worker configuration.
//!
//! Sources (highest priority first):
//! 1. Environment variables (`RECAPD_*`, plus the conventional
//!    `GROQ_API_KEY` / `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`)
//! 2. Config file (`--config <path>`, `./recapd.yaml`, or
//!    `~/.recapd/config.yaml`)
//! 3. Defaults
//!
//! The loaded `Config` is passed down explicitly; collaborator clients are
//! constructed from it once per process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::TelegramConfig;
use crate::core::{PipelineSettings, RetryPolicy};

/// Raw config file schema (matches the YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub stt: SttSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    pub endpoint: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SttSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineSection {
    pub chunk_secs: Option<u64>,
    pub chunk_overlap_secs: Option<u64>,
    pub transcribe_workers: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub lease_ttl_secs: Option<u64>,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Object store endpoint; required for `handle`, optional otherwise
    pub storage_endpoint: Option<String>,
    pub storage_token: Option<String>,

    /// Coordination store; `None` falls back to the in-process lease store
    /// (single-worker deployments only)
    pub redis_url: Option<String>,

    pub stt_base_url: String,
    pub stt_api_key: Option<String>,
    pub stt_model: String,
    pub stt_language: Option<String>,

    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,

    pub telegram: Option<TelegramConfig>,

    pub db_path: PathBuf,

    pub chunk_secs: u64,
    pub chunk_overlap_secs: u64,
    pub transcribe_workers: usize,
    pub deadline_secs: u64,
    pub lease_ttl_secs: u64,
    pub retry: RetryPolicy,

    /// Path of the config file actually loaded (if any)
    pub config_file: Option<PathBuf>,
}

const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_STT_MODEL: &str = "whisper-large-v3";
const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

impl Config {
    /// Load configuration from file + environment + defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let (file, config_file) = match find_config_file(explicit_path) {
            Some(path) => (load_config_file(&path)?, Some(path)),
            None => (ConfigFile::default(), None),
        };

        let telegram = match (
            env_var("TELEGRAM_BOT_TOKEN"),
            env_var("TELEGRAM_CHAT_ID"),
            file.telegram,
        ) {
            (Some(bot_token), Some(chat_id), _) => Some(TelegramConfig { bot_token, chat_id }),
            (_, _, from_file) => from_file,
        };

        let db_path = env_var("RECAPD_DB")
            .map(PathBuf::from)
            .or_else(|| file.db_path.map(PathBuf::from))
            .unwrap_or_else(default_db_path);

        let config = Self {
            storage_endpoint: env_var("RECAPD_STORAGE_ENDPOINT").or(file.storage.endpoint),
            storage_token: env_var("RECAPD_STORAGE_TOKEN").or(file.storage.token),
            redis_url: env_var("RECAPD_REDIS_URL").or(file.redis_url),
            stt_base_url: env_var("RECAPD_STT_BASE_URL")
                .or(file.stt.base_url)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            stt_api_key: env_var("RECAPD_STT_API_KEY")
                .or_else(|| env_var("GROQ_API_KEY"))
                .or(file.stt.api_key),
            stt_model: env_var("RECAPD_STT_MODEL")
                .or(file.stt.model)
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            stt_language: env_var("RECAPD_STT_LANGUAGE").or(file.stt.language),
            llm_base_url: env_var("RECAPD_LLM_BASE_URL")
                .or(file.llm.base_url)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            llm_api_key: env_var("RECAPD_LLM_API_KEY")
                .or_else(|| env_var("GROQ_API_KEY"))
                .or(file.llm.api_key),
            llm_model: env_var("RECAPD_LLM_MODEL")
                .or(file.llm.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            telegram,
            db_path,
            chunk_secs: file.pipeline.chunk_secs.unwrap_or(600),
            chunk_overlap_secs: file.pipeline.chunk_overlap_secs.unwrap_or(0),
            transcribe_workers: file.pipeline.transcribe_workers.unwrap_or(5),
            deadline_secs: file.pipeline.deadline_secs.unwrap_or(840),
            lease_ttl_secs: file.pipeline.lease_ttl_secs.unwrap_or(900),
            retry: file.pipeline.retry.unwrap_or_default(),
            config_file,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that break the pipeline's timing invariants
    pub fn validate(&self) -> Result<()> {
        if self.deadline_secs >= self.lease_ttl_secs {
            anyhow::bail!(
                "deadline_secs ({}) must be shorter than lease_ttl_secs ({}) \
                 or a live run can lose its lease mid-flight",
                self.deadline_secs,
                self.lease_ttl_secs
            );
        }

        if self.chunk_overlap_secs >= self.chunk_secs {
            anyhow::bail!(
                "chunk_overlap_secs ({}) must be smaller than chunk_secs ({})",
                self.chunk_overlap_secs,
                self.chunk_secs
            );
        }

        if self.transcribe_workers == 0 {
            anyhow::bail!("transcribe_workers must be at least 1");
        }

        Ok(())
    }

    /// Orchestrator settings derived from this configuration
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            transcribe_workers: self.transcribe_workers,
            retry: self.retry.clone(),
            deadline: Duration::from_secs(self.deadline_secs),
            lease_ttl: Duration::from_secs(self.lease_ttl_secs),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".recapd")
        .join("meetings.db")
}

/// Locate the config file: explicit path, then working directory, then home
fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from("recapd.yaml");
    if local.exists() {
        return Some(local);
    }

    let home = dirs::home_dir()?.join(".recapd").join("config.yaml");
    if home.exists() {
        return Some(home);
    }

    None
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
