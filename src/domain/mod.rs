//! Domain types for the ingestion worker.
//!
//! - Events: the storage-event trigger and the job derived from it
//! - Transcripts: segments, chunks, and subtitle assembly
//! - Meetings: the persisted records and the model-derived digest

pub mod event;
pub mod meeting;
pub mod transcript;

// Re-export commonly used types
pub use event::{derive_mutex_key, IngestionJob};
pub use meeting::{Meeting, MeetingAnalysis, NewMeeting, Participant, ParticipantEntry};
pub use transcript::{assemble, format_timestamp, ChunkTranscript, Transcript, TranscriptSegment};
