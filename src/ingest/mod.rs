//! Media ingestion stages.
//!
//! The object fetcher lives in `adapters::storage`; this module owns what
//! happens to the file once it is on scratch storage:
//!
//! 1. **Extractor**: probe duration, normalize the audio track, split into
//!    fixed-length chunks
//! 2. **Transcribe**: bounded-parallel chunk transcription with retry

pub mod extractor;
pub mod transcribe;

pub use extractor::{chunk_starts_ms, AudioChunk, ExtractedAudio, FfmpegExtractor, MediaExtractor};
pub use transcribe::transcribe_chunks;
