//! Adapter interfaces for external collaborators.
//!
//! Each collaborator the pipeline touches (object storage, the coordination
//! store, speech-to-text, the digest model, the operator channel) sits behind
//! an async trait so the orchestrator can be exercised end-to-end with
//! in-process fakes.

pub mod lease;
pub mod llm;
pub mod storage;
pub mod stt;
pub mod telegram;

pub use lease::{LeaseStore, MemoryLeaseStore, RedisLeaseStore};
pub use llm::{ChatCompletionsClient, DigestModel};
pub use storage::{HttpObjectStore, ObjectStore};
pub use stt::{ChunkTranscription, SpeechToText, WhisperApiClient};
pub use telegram::{LogNotifier, Notifier, TelegramClient, TelegramConfig};
