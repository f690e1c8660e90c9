//! Job error taxonomy and terminal outcomes.
//!
//! Lease contention and already-processed files are outcomes, not errors:
//! the handler reports them as successes so the queue stops redelivering.
//! Everything in `JobError` is fatal for the job and feeds the queue's own
//! redelivery / dead-letter policy.

use thiserror::Error;

/// Fatal job failures, tagged by the pipeline stage that raised them.
/// The `{0:#}` display carries the inner error's full context chain into
/// notifications and logs.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),

    #[error("media extraction failed: {0:#}")]
    Media(anyhow::Error),

    #[error("transcription failed: {0:#}")]
    Transcription(anyhow::Error),

    #[error("digest failed: {0:#}")]
    Digest(anyhow::Error),

    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),

    /// The deadline timer won the race against the pipeline
    #[error("deadline of {deadline_secs}s exceeded")]
    DeadlineExceeded { deadline_secs: u64 },
}

impl JobError {
    /// Stage label used in notifications and logs
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Media(_) => "extract",
            Self::Transcription(_) => "transcribe",
            Self::Digest(_) => "digest",
            Self::Persistence(_) => "persist",
            Self::DeadlineExceeded { .. } => "deadline",
        }
    }
}

/// Why a job was skipped without running the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another worker holds the lease for this file
    LeaseHeld,

    /// A meeting row already exists for this filename
    AlreadyProcessed,
}

/// Terminal outcome of handling one queue message
#[derive(Debug)]
pub enum JobOutcome {
    /// Pipeline ran to completion and the meeting was persisted
    Completed {
        meeting_id: i64,
        title: String,
        duration_ms: u64,
        elapsed_secs: u64,
    },

    /// Job skipped before any expensive work
    Skipped {
        object_key: String,
        reason: SkipReason,
    },
}

impl JobOutcome {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}
