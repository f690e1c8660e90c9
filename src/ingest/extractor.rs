//! Audio extraction and segmentation.
//!
//! Shells out to ffprobe/ffmpeg: probe the container duration, transcode the
//! audio track to mono 16 kHz MP3, then trim fixed-length chunks in a second
//! per-chunk pass. Chunk start offsets are materialized up front so an
//! overlap between consecutive chunks is just a smaller stride.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// One audio chunk on scratch storage, owned exclusively by the running job
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub path: PathBuf,

    /// Start offset from the beginning of the recording, in ms
    pub start_ms: u64,

    /// Position in ascending start-offset order
    pub ordinal: usize,
}

/// Result of the extraction stage
#[derive(Debug, Clone)]
pub struct ExtractedAudio {
    pub duration_ms: u64,
    pub chunks: Vec<AudioChunk>,
}

/// Media extraction collaborator. The ffmpeg-backed implementation is the
/// production one; tests substitute a fake so CI needs no media toolchain.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Probe `input`, normalize its audio track, and split it into chunks
    /// under `out_dir`.
    async fn extract(&self, input: &Path, out_dir: &Path) -> Result<ExtractedAudio>;
}

/// ffmpeg/ffprobe-backed extractor
pub struct FfmpegExtractor {
    chunk_secs: u64,
    overlap_secs: u64,
}

impl FfmpegExtractor {
    pub fn new(chunk_secs: u64, overlap_secs: u64) -> Self {
        Self {
            chunk_secs,
            overlap_secs,
        }
    }

    fn ffmpeg_path() -> String {
        std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string())
    }

    fn ffprobe_path() -> String {
        std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string())
    }

    /// Probe the container duration in milliseconds
    async fn probe_duration_ms(&self, input: &Path) -> Result<u64> {
        let output = Command::new(Self::ffprobe_path())
            .args(["-v", "error"])
            .args(["-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run ffprobe")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffprobe failed: {}", stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let seconds: f64 = stdout
            .trim()
            .parse()
            .with_context(|| format!("Unparseable ffprobe duration: {:?}", stdout.trim()))?;

        Ok((seconds * 1000.0).round() as u64)
    }

    /// Transcode the audio track to mono 16 kHz MP3
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let result = Command::new(Self::ffmpeg_path())
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-i")
            .arg(input)
            .args(["-vn", "-ac", "1", "-ar", "16000", "-codec:a", "libmp3lame"])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run ffmpeg")?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            anyhow::bail!("ffmpeg transcode failed: {}", stderr.trim());
        }

        Ok(())
    }

    /// Trim one chunk out of the normalized audio (stream copy, no re-encode)
    async fn trim_chunk(&self, audio: &Path, start_ms: u64, output: &Path) -> Result<()> {
        let start = format!("{:.3}", start_ms as f64 / 1000.0);
        let length = self.chunk_secs.to_string();

        let result = Command::new(Self::ffmpeg_path())
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-ss", &start, "-t", &length])
            .arg("-i")
            .arg(audio)
            .args(["-acodec", "copy"])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run ffmpeg")?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            anyhow::bail!("ffmpeg chunk trim failed: {}", stderr.trim());
        }

        Ok(())
    }
}

#[async_trait]
impl MediaExtractor for FfmpegExtractor {
    async fn extract(&self, input: &Path, out_dir: &Path) -> Result<ExtractedAudio> {
        let duration_ms = self.probe_duration_ms(input).await?;
        if duration_ms == 0 {
            anyhow::bail!("Media has zero duration: {}", input.display());
        }

        let audio_path = out_dir.join("audio.mp3");
        self.transcode(input, &audio_path).await?;
        debug!(audio = %audio_path.display(), "Audio track normalized");

        let starts = chunk_starts_ms(duration_ms, self.chunk_secs, self.overlap_secs);
        let mut chunks = Vec::with_capacity(starts.len());

        for (ordinal, start_ms) in starts.into_iter().enumerate() {
            let chunk_path = out_dir.join(format!("chunk-{:04}.mp3", ordinal));
            self.trim_chunk(&audio_path, start_ms, &chunk_path).await?;

            chunks.push(AudioChunk {
                path: chunk_path,
                start_ms,
                ordinal,
            });
        }

        info!(
            duration_ms,
            chunks = chunks.len(),
            "Audio extracted and segmented"
        );

        Ok(ExtractedAudio {
            duration_ms,
            chunks,
        })
    }
}

/// Chunk start offsets: `i * (chunk_len - overlap)` while inside the
/// recording. With the default overlap of 0 this yields consecutive chunks.
pub fn chunk_starts_ms(duration_ms: u64, chunk_secs: u64, overlap_secs: u64) -> Vec<u64> {
    let stride_ms = chunk_secs.saturating_sub(overlap_secs).max(1) * 1000;

    let mut starts = Vec::new();
    let mut start = 0u64;
    while start < duration_ms {
        starts.push(start);
        start += stride_ms;
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twenty_minutes_yields_two_chunks() {
        // 20-minute recording, 600s chunks: starts at 0 and 600000
        let starts = chunk_starts_ms(1_200_000, 600, 0);
        assert_eq!(starts, vec![0, 600_000]);
    }

    #[test]
    fn test_partial_tail_chunk_included() {
        let starts = chunk_starts_ms(1_250_000, 600, 0);
        assert_eq!(starts, vec![0, 600_000, 1_200_000]);
    }

    #[test]
    fn test_overlap_shrinks_stride() {
        let starts = chunk_starts_ms(1_200_000, 600, 60);
        assert_eq!(starts, vec![0, 540_000, 1_080_000]);
    }

    #[test]
    fn test_short_recording_single_chunk() {
        let starts = chunk_starts_ms(45_000, 600, 0);
        assert_eq!(starts, vec![0]);
    }

    #[test]
    fn test_degenerate_overlap_still_advances() {
        // overlap >= chunk length must not loop forever
        let starts = chunk_starts_ms(5_000, 10, 10);
        assert_eq!(starts.len(), 5);
    }
}
