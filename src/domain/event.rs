//! Storage-event envelope parsing.
//!
//! The queue delivers one JSON storage-event envelope per message: a list of
//! records, each naming a bucket and an object key. Keys arrive URL-encoded.
//! Only the first record is processed per invocation.

use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Storage-event envelope as delivered on the queue
#[derive(Debug, Deserialize)]
pub struct StorageEventEnvelope {
    #[serde(rename = "Records")]
    pub records: Vec<StorageRecord>,
}

#[derive(Debug, Deserialize)]
pub struct StorageRecord {
    pub s3: ObjectEntity,
}

#[derive(Debug, Deserialize)]
pub struct ObjectEntity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

/// One ingestion job, derived from a queue message. Transient: lives for the
/// duration of one handler invocation and is never persisted.
#[derive(Debug, Clone)]
pub struct IngestionJob {
    /// Source bucket name
    pub bucket: String,

    /// Object key, URL-decoded
    pub key: String,

    /// Lease key guarding against duplicate concurrent processing
    pub mutex_key: String,
}

impl IngestionJob {
    /// Parse a queue message body into a job.
    ///
    /// Takes the first record of the envelope; additional records are ignored
    /// (the bucket notification configuration emits one record per upload).
    pub fn from_message(body: &str) -> Result<Self> {
        let envelope: StorageEventEnvelope =
            serde_json::from_str(body).context("Failed to parse storage event envelope")?;

        let record = envelope
            .records
            .into_iter()
            .next()
            .context("Storage event envelope contains no records")?;

        let bucket = record.s3.bucket.name;
        let key = urlencoding::decode(&record.s3.object.key)
            .context("Object key is not valid percent-encoding")?
            .into_owned();

        let mutex_key = derive_mutex_key(&bucket, &key);

        Ok(Self {
            bucket,
            key,
            mutex_key,
        })
    }
}

/// Derive the lease key for an object: `meeting:lease:{hash16}`.
///
/// Hashing keeps the key short and free of characters the coordination store
/// might treat specially, while staying deterministic across workers.
pub fn derive_mutex_key(bucket: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bucket.as_bytes());
    hasher.update(b"/");
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();

    format!("meeting:lease:{}", hex::encode(&digest[..8]))
}
