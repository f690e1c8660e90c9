//! Meeting digest generation via a structured-output language model.
//!
//! One `/chat/completions` call per job with a JSON-schema-constrained
//! response, decoded straight into [`MeetingAnalysis`]. This stage is the
//! nondeterminism boundary of the pipeline: tests assert on schema shape,
//! never on generated text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::domain::MeetingAnalysis;

const DIGEST_SYSTEM_PROMPT: &str = "You analyze meeting transcripts. Given a \
subtitle-formatted transcript, produce: a concise descriptive title; a \
thorough summary of the topics discussed and decisions made; a short summary \
of at most 255 characters; and the list of participants with their apparent \
roles. Include only participants who actually speak in the transcript, never \
people who are merely mentioned. Respond with the requested JSON only.";

/// Structured-generation collaborator
#[async_trait]
pub trait DigestModel: Send + Sync {
    /// Derive the structured digest for a full transcript.
    async fn digest(&self, transcript: &str) -> Result<MeetingAnalysis>;
}

// OpenAI-compatible response shapes
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// Client for an OpenAI-compatible chat-completions API with JSON-schema
/// structured output
pub struct ChatCompletionsClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    /// Output schema the model must conform to
    fn analysis_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "summary": { "type": "string" },
                "short_summary": { "type": "string" },
                "participants": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "role": { "type": "string" }
                        },
                        "required": ["name", "role"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["title", "summary", "short_summary", "participants"],
            "additionalProperties": false
        })
    }
}

#[async_trait]
impl DigestModel for ChatCompletionsClient {
    async fn digest(&self, transcript: &str) -> Result<MeetingAnalysis> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": DIGEST_SYSTEM_PROMPT },
                { "role": "user", "content": transcript }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "meeting_analysis",
                    "strict": true,
                    "schema": Self::analysis_schema()
                }
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Digest request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Digest API error {}: {}", status, text.trim());
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse digest response")?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .context("Digest response contains no choices")?
            .message
            .content;

        let analysis: MeetingAnalysis = serde_json::from_str(&content)
            .context("Digest output does not match the analysis schema")?;

        Ok(analysis.clamp_short_summary())
    }
}
