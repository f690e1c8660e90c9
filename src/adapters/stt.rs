//! Speech-to-text client.
//!
//! Targets OpenAI-compatible `/audio/transcriptions` endpoints (OpenAI, Groq,
//! and friends) with `verbose_json` output so per-segment timestamps come back
//! alongside the text. Temperature is pinned to 0.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::domain::TranscriptSegment;

/// Transcription of one audio chunk
#[derive(Debug, Clone)]
pub struct ChunkTranscription {
    /// Full plain-text transcription
    pub text: String,

    /// Timestamped segments, offsets in seconds relative to the chunk start
    pub segments: Vec<TranscriptSegment>,
}

/// Speech-to-text collaborator
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<ChunkTranscription>;
}

/// Verbose transcription response shape
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

/// Client for an OpenAI-compatible transcription API
pub struct WhisperApiClient {
    base_url: String,
    api_key: String,
    model: String,
    /// Optional language hint; autodetect when unset
    language: Option<String>,
    client: reqwest::Client,
}

impl WhisperApiClient {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        language: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            language,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperApiClient {
    async fn transcribe(&self, audio: &Path) -> Result<ChunkTranscription> {
        let file_name = audio
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let file_bytes = tokio::fs::read(audio)
            .await
            .with_context(|| format!("Failed to read audio chunk {}", audio.display()))?;

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("temperature", "0");

        if let Some(ref language) = self.language {
            form = form.text("language", language.clone());
        }

        let url = format!("{}/audio/transcriptions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Transcription API error {}: {}", status, body.trim());
        }

        let verbose: VerboseTranscription = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        Ok(ChunkTranscription {
            text: verbose.text.trim().to_string(),
            segments: verbose.segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_response_parsing() {
        let json = r#"{
            "text": " hello world ",
            "segments": [
                { "id": 0, "start": 0.0, "end": 2.4, "text": "hello", "temperature": 0.0 },
                { "start": 2.4, "end": 4.1, "text": "world" }
            ]
        }"#;

        let parsed: VerboseTranscription = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[1].text, "world");
        assert!((parsed.segments[0].end - 2.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_segments_default_to_empty() {
        let parsed: VerboseTranscription =
            serde_json::from_str(r#"{ "text": "no segments" }"#).unwrap();
        assert!(parsed.segments.is_empty());
    }
}
