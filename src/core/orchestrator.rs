//! Per-job pipeline orchestration.
//!
//! One queue message drives one job:
//! lease → idempotency check → fetch → extract → transcribe → assemble →
//! digest → persist, the whole pipeline raced against a deadline timer.
//! Scratch cleanup and lease release run on every exit path, and every
//! terminal outcome emits exactly one operator notification.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tempfile::TempDir;
use tracing::{error, info, instrument, warn};

use crate::adapters::{DigestModel, LeaseStore, Notifier, ObjectStore, SpeechToText};
use crate::db::Database;
use crate::domain::{assemble, IngestionJob, NewMeeting};
use crate::ingest::{transcribe_chunks, MediaExtractor};

use super::error::{JobError, JobOutcome, SkipReason};
use super::retry::RetryPolicy;

/// Worker-level tunables
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum simultaneous in-flight transcription calls
    pub transcribe_workers: usize,

    /// Per-chunk transcription retry policy
    pub retry: RetryPolicy,

    /// Wall-clock budget for one job. Must stay under the lease TTL so a
    /// legitimate run never loses its lease mid-flight.
    pub deadline: Duration,

    /// Lease time-to-live; also the staleness bound for orphaned leases
    pub lease_ttl: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            transcribe_workers: 5,
            retry: RetryPolicy::default(),
            deadline: Duration::from_secs(840),
            lease_ttl: Duration::from_secs(900),
        }
    }
}

/// Result of a pipeline run that reached persistence
struct CompletedJob {
    meeting_id: i64,
    title: String,
    duration_ms: u64,
}

/// Pipeline orchestrator. Collaborator clients are constructed once per
/// process and injected here; there are no ambient globals.
pub struct Orchestrator {
    store: Arc<dyn ObjectStore>,
    leases: Arc<dyn LeaseStore>,
    extractor: Arc<dyn MediaExtractor>,
    stt: Arc<dyn SpeechToText>,
    digest: Arc<dyn DigestModel>,
    notifier: Arc<dyn Notifier>,
    db: Arc<Database>,
    settings: PipelineSettings,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        leases: Arc<dyn LeaseStore>,
        extractor: Arc<dyn MediaExtractor>,
        stt: Arc<dyn SpeechToText>,
        digest: Arc<dyn DigestModel>,
        notifier: Arc<dyn Notifier>,
        db: Arc<Database>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            leases,
            extractor,
            stt,
            digest,
            notifier,
            db,
            settings,
        }
    }

    /// Handle one queue message end to end.
    ///
    /// Skips (lease held, already processed) return `Ok` so the queue stops
    /// redelivering; fatal failures and deadline expiry return `Err` so the
    /// queue's redelivery / dead-letter policy stays the outer retry loop.
    pub async fn handle_message(&self, body: &str) -> Result<JobOutcome> {
        let job = match IngestionJob::from_message(body) {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "Unparseable queue message");
                self.notify(&format!("❌ Unparseable storage event: {:#}", e))
                    .await;
                return Err(e);
            }
        };

        info!(bucket = %job.bucket, key = %job.key, "Ingestion job received");

        // Mutual exclusion across workers. Contention is an expected outcome:
        // report success so the queue does not redeliver indefinitely.
        let acquired = self
            .leases
            .acquire(&job.mutex_key, self.settings.lease_ttl)
            .await;

        match acquired {
            Ok(true) => {}
            Ok(false) => {
                info!(key = %job.key, "Lease held elsewhere, skipping");
                self.notify(&format!(
                    "⏭ Skipped {}: another worker is processing it",
                    job.key
                ))
                .await;
                return Ok(JobOutcome::Skipped {
                    object_key: job.key,
                    reason: SkipReason::LeaseHeld,
                });
            }
            Err(e) => {
                error!(error = %e, "Lease acquisition failed");
                self.notify(&format!(
                    "❌ Ingestion failed for {}: coordination store unavailable: {:#}",
                    job.key, e
                ))
                .await;
                return Err(e);
            }
        }

        let outcome = self.run_locked(&job).await;

        // The lease is ours on every path that reaches here
        if let Err(e) = self.leases.release(&job.mutex_key).await {
            warn!(key = %job.mutex_key, error = %e, "Lease release failed (TTL will expire it)");
        }

        match outcome {
            Ok(outcome) => Ok(outcome),
            Err(job_error) => Err(job_error.into()),
        }
    }

    /// Everything that happens while holding the lease
    async fn run_locked(&self, job: &IngestionJob) -> Result<JobOutcome, JobError> {
        // Idempotent re-delivery: a meeting row for this filename means the
        // work is already done.
        match self.db.find_by_filename(&job.key) {
            Ok(Some(existing)) => {
                info!(key = %job.key, meeting_id = existing.id, "Already processed, skipping");
                self.notify(&format!(
                    "⏭ Skipped {}: already processed (meeting {})",
                    job.key, existing.id
                ))
                .await;
                return Ok(JobOutcome::Skipped {
                    object_key: job.key.clone(),
                    reason: SkipReason::AlreadyProcessed,
                });
            }
            Ok(None) => {}
            Err(e) => {
                let err = JobError::Persistence(e);
                self.notify_failure(&job.key, &err).await;
                return Err(err);
            }
        }

        // Scratch storage is exclusive to this run; concurrent jobs in the
        // same process never share a path.
        let scratch = match tempfile::Builder::new().prefix("recapd-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                let err = JobError::Fetch(
                    anyhow::Error::new(e).context("Failed to create scratch directory"),
                );
                self.notify_failure(&job.key, &err).await;
                return Err(err);
            }
        };

        let started = Instant::now();
        let deadline = self.settings.deadline;

        // Race the pipeline against the deadline timer. On expiry the stage
        // future is dropped wherever it is suspended; cleanup still runs.
        let raced = tokio::time::timeout(deadline, self.run_stages(job, scratch.path())).await;

        let result = match raced {
            Ok(result) => result,
            Err(_) => Err(JobError::DeadlineExceeded {
                deadline_secs: deadline.as_secs(),
            }),
        };

        self.cleanup_scratch(scratch);

        match result {
            Ok(completed) => {
                let elapsed_secs = started.elapsed().as_secs();
                info!(
                    key = %job.key,
                    meeting_id = completed.meeting_id,
                    elapsed_secs,
                    "Ingestion completed"
                );
                self.notify(&format!(
                    "✅ Meeting ingested: {}\nSource: {}\nDuration: {}\nProcessed in {}s",
                    completed.title,
                    job.key,
                    format_duration_ms(completed.duration_ms),
                    elapsed_secs,
                ))
                .await;

                Ok(JobOutcome::Completed {
                    meeting_id: completed.meeting_id,
                    title: completed.title,
                    duration_ms: completed.duration_ms,
                    elapsed_secs,
                })
            }
            Err(err) => {
                match &err {
                    JobError::DeadlineExceeded { deadline_secs } => {
                        error!(key = %job.key, deadline_secs, "Ingestion timed out");
                        self.notify(&format!(
                            "⏱ Ingestion timed out for {} after {}s (scratch cleaned, lease released)",
                            job.key, deadline_secs
                        ))
                        .await;
                    }
                    other => {
                        error!(key = %job.key, stage = other.stage(), error = %other, "Ingestion failed");
                        self.notify_failure(&job.key, other).await;
                    }
                }
                Err(err)
            }
        }
    }

    /// The sequential pipeline stages; only chunk transcription fans out
    #[instrument(skip(self, job, scratch), fields(key = %job.key))]
    async fn run_stages(
        &self,
        job: &IngestionJob,
        scratch: &Path,
    ) -> Result<CompletedJob, JobError> {
        // Fetch the recording to scratch storage
        let source_path = scratch.join(source_file_name(&job.key));
        info!("Fetching object");
        self.store
            .fetch(&job.bucket, &job.key, &source_path)
            .await
            .map_err(JobError::Fetch)?;

        // Probe, normalize, and segment the audio track
        info!("Extracting audio");
        let extracted = self
            .extractor
            .extract(&source_path, scratch)
            .await
            .map_err(JobError::Media)?;

        // Bounded-parallel transcription with per-chunk retry
        info!(chunks = extracted.chunks.len(), "Transcribing chunks");
        let chunk_transcripts = transcribe_chunks(
            Arc::clone(&self.stt),
            extracted.chunks,
            self.settings.retry.clone(),
            self.settings.transcribe_workers,
        )
        .await
        .map_err(JobError::Transcription)?;

        // Deterministic reassembly into one subtitle document
        let transcript = assemble(&chunk_transcripts);
        let transcript_text = transcript.render();

        // Structured digest from the full transcript
        info!(blocks = transcript.blocks.len(), "Generating digest");
        let analysis = self
            .digest
            .digest(&transcript_text)
            .await
            .map_err(JobError::Digest)?;

        // Atomic persistence of the meeting and its participants
        info!("Persisting meeting");
        let record =
            NewMeeting::from_analysis(analysis, &job.key, transcript_text, extracted.duration_ms);
        let meeting_id = self
            .db
            .insert_meeting(&record)
            .map_err(JobError::Persistence)?;

        Ok(CompletedJob {
            meeting_id,
            title: record.title,
            duration_ms: record.duration_ms,
        })
    }

    fn cleanup_scratch(&self, scratch: TempDir) {
        let path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(path = %path.display(), error = %e, "Scratch cleanup failed");
        }
    }

    async fn notify_failure(&self, key: &str, err: &JobError) {
        self.notify(&format!(
            "❌ Ingestion failed for {} at stage '{}': {:#}",
            key,
            err.stage(),
            err
        ))
        .await;
    }

    /// Best-effort operator notification; failures never mask the job result
    async fn notify(&self, text: &str) {
        if let Err(e) = self.notifier.send(text).await {
            warn!(error = %e, "Operator notification failed");
        }
    }
}

/// Scratch file name for the fetched object, preserving the key's extension
fn source_file_name(key: &str) -> String {
    match Path::new(key).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("source.{}", ext),
        None => "source".to_string(),
    }
}

fn format_duration_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}m {:02}s", total_secs / 60, total_secs % 60)
}
