//! recapd - meeting-recording ingestion worker
//!
//! A single-flight pipeline triggered by storage-event queue messages: fetch
//! the recording, extract and chunk its audio track, transcribe the chunks in
//! parallel with retry, reassemble a time-aligned subtitle transcript, derive
//! a structured digest, and persist the meeting atomically. The whole run
//! sits under a hard wall-clock deadline, with a distributed lease against
//! duplicate concurrent processing and idempotent handling of re-delivery.
//!
//! # Architecture
//!
//! - `adapters`: external collaborators behind async traits (object storage,
//!   coordination store, speech-to-text, digest model, operator channel)
//! - `core`: orchestration (deadline race, retry, error taxonomy)
//! - `ingest`: media extraction and bounded-parallel transcription
//! - `domain`: events, transcripts, meetings
//! - `db`: SQLite persistence with transactional writes
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Handle one queue message
//! cat event.json | recapd handle
//!
//! # Inspect results
//! recapd meetings
//! recapd show 3 --transcript
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use core::{JobError, JobOutcome, Orchestrator, PipelineSettings, RetryPolicy, SkipReason};
pub use db::Database;
pub use domain::{IngestionJob, MeetingAnalysis, NewMeeting, Transcript};
