//! Meeting records and the structured digest derived from a transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Soft cap on the short summary, matching the persisted column width
pub const SHORT_SUMMARY_MAX_CHARS: usize = 255;

/// Structured digest produced by the language model for one transcript.
///
/// Never persisted on its own; merged into a [`NewMeeting`] at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingAnalysis {
    pub title: String,
    pub summary: String,
    pub short_summary: String,
    #[serde(default)]
    pub participants: Vec<ParticipantEntry>,
}

/// A speaking participant identified in the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantEntry {
    pub name: String,
    pub role: String,
}

impl MeetingAnalysis {
    /// Clamp the short summary to the persisted column width. The model is
    /// instructed to stay under the cap, but the cap is enforced here so an
    /// overlong generation cannot fail the write.
    pub fn clamp_short_summary(mut self) -> Self {
        if self.short_summary.chars().count() > SHORT_SUMMARY_MAX_CHARS {
            self.short_summary = self
                .short_summary
                .chars()
                .take(SHORT_SUMMARY_MAX_CHARS)
                .collect();
        }
        self
    }
}

/// A meeting row ready to be inserted, together with its participants
#[derive(Debug, Clone)]
pub struct NewMeeting {
    /// Object key of the source recording; unique per processed file and the
    /// natural idempotency key
    pub filename: String,
    pub title: String,
    pub summary: String,
    pub short_summary: String,
    /// Full subtitle-formatted transcript
    pub transcription: String,
    pub duration_ms: u64,
    pub participants: Vec<ParticipantEntry>,
}

impl NewMeeting {
    pub fn from_analysis(
        analysis: MeetingAnalysis,
        filename: &str,
        transcription: String,
        duration_ms: u64,
    ) -> Self {
        let analysis = analysis.clamp_short_summary();
        Self {
            filename: filename.to_string(),
            title: analysis.title,
            summary: analysis.summary,
            short_summary: analysis.short_summary,
            transcription,
            duration_ms,
            participants: analysis.participants,
        }
    }
}

/// A persisted meeting row
#[derive(Debug, Clone, Serialize)]
pub struct Meeting {
    pub id: i64,
    pub filename: String,
    pub title: String,
    pub summary: String,
    pub short_summary: String,
    pub transcription: String,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// A persisted participant row
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub meeting_id: i64,
}
