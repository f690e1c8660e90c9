//! Bounded-parallel chunk transcription.
//!
//! Chunks are submitted in source order through a semaphore of `workers`
//! permits; completion order is unconstrained and results are re-sorted by
//! chunk ordinal before assembly. Each call retries with exponential backoff;
//! once a chunk exhausts its attempts the whole job fails.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::adapters::SpeechToText;
use crate::core::retry::{retry_with_backoff, RetryPolicy};
use crate::domain::ChunkTranscript;
use crate::ingest::extractor::AudioChunk;

/// Transcribe every chunk with at most `workers` calls in flight.
///
/// A chunk's audio file is deleted as soon as its transcription succeeds; the
/// scratch directory sweep covers chunks of failed runs.
pub async fn transcribe_chunks(
    stt: Arc<dyn SpeechToText>,
    chunks: Vec<AudioChunk>,
    policy: RetryPolicy,
    workers: usize,
) -> Result<Vec<ChunkTranscript>> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks: JoinSet<Result<ChunkTranscript>> = JoinSet::new();

    for chunk in chunks {
        let stt = Arc::clone(&stt);
        let semaphore = Arc::clone(&semaphore);
        let policy = policy.clone();

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .context("Transcription semaphore closed")?;

            let op_name = format!("transcribe chunk {}", chunk.ordinal);
            let transcription =
                retry_with_backoff(&policy, &op_name, || stt.transcribe(&chunk.path)).await?;

            debug!(
                ordinal = chunk.ordinal,
                segments = transcription.segments.len(),
                "Chunk transcribed"
            );

            // The chunk is no longer needed once transcribed
            if let Err(e) = tokio::fs::remove_file(&chunk.path).await {
                warn!(path = %chunk.path.display(), error = %e, "Failed to delete chunk");
            }

            Ok(ChunkTranscript {
                ordinal: chunk.ordinal,
                start_ms: chunk.start_ms,
                text: transcription.text,
                segments: transcription.segments,
            })
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let transcript = joined.context("Transcription task panicked")??;
        results.push(transcript);
    }

    results.sort_by_key(|t| t.ordinal);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::stt::ChunkTranscription;
    use crate::domain::TranscriptSegment;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fake STT that records the maximum number of in-flight calls
    struct ConcurrencyProbe {
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_seen: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SpeechToText for ConcurrencyProbe {
        async fn transcribe(&self, audio: &Path) -> Result<ChunkTranscription> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(current, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(ChunkTranscription {
                text: audio.display().to_string(),
                segments: vec![TranscriptSegment {
                    start: 0.0,
                    end: 1.0,
                    text: "ok".to_string(),
                }],
            })
        }
    }

    fn make_chunks(n: usize) -> Vec<AudioChunk> {
        (0..n)
            .map(|i| AudioChunk {
                path: PathBuf::from(format!("/nonexistent/chunk-{}.mp3", i)),
                start_ms: i as u64 * 600_000,
                ordinal: i,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let stt: Arc<dyn SpeechToText> = probe.clone();

        let results = transcribe_chunks(stt, make_chunks(12), RetryPolicy::default(), 3)
            .await
            .unwrap();

        assert_eq!(results.len(), 12);
        assert!(probe.max_seen.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_results_sorted_by_ordinal() {
        let stt: Arc<dyn SpeechToText> = Arc::new(ConcurrencyProbe::new());

        let results = transcribe_chunks(stt, make_chunks(8), RetryPolicy::default(), 5)
            .await
            .unwrap();

        let ordinals: Vec<usize> = results.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, (0..8).collect::<Vec<_>>());
        assert_eq!(results[3].start_ms, 3 * 600_000);
    }

    /// Fake STT that always fails
    struct AlwaysFails;

    #[async_trait]
    impl SpeechToText for AlwaysFails {
        async fn transcribe(&self, _audio: &Path) -> Result<ChunkTranscription> {
            anyhow::bail!("service unavailable")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_failure_fails_the_job() {
        let stt: Arc<dyn SpeechToText> = Arc::new(AlwaysFails);

        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay_ms: 10,
            ..Default::default()
        };

        let result = transcribe_chunks(stt, make_chunks(3), policy, 2).await;
        assert!(result.is_err());
    }
}
