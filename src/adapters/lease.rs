//! Distributed mutual-exclusion lease.
//!
//! One lease per source file guards against duplicate concurrent processing.
//! `acquire` is atomic set-if-absent with a TTL; contention is an expected
//! outcome, not an error. `release` deletes unconditionally, and the TTL is
//! the only staleness bound if a worker dies without releasing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Key-value coordination store used for per-file leases
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Set the key only if absent. Returns whether the caller now holds it.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Delete the key unconditionally.
    async fn release(&self, key: &str) -> Result<()>;
}

/// Redis-backed lease store (`SET key value NX EX ttl`)
pub struct RedisLeaseStore {
    client: redis::Client,
    /// Per-process value stored under the lease key, for observability when
    /// inspecting the coordination store by hand
    holder_id: String,
}

impl RedisLeaseStore {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .with_context(|| format!("Invalid redis URL: {}", redis_url))?;

        Ok(Self {
            client,
            holder_id: uuid::Uuid::new_v4().to_string(),
        })
    }
}

#[async_trait]
impl LeaseStore for RedisLeaseStore {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to redis")?;

        // NX: only set if absent; EX: expiry in seconds. Replies OK or nil.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&self.holder_id)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .context("Lease acquire failed")?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to redis")?;

        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .context("Lease release failed")?;

        Ok(())
    }
}

/// In-process lease store. Backs tests and single-worker local runs where no
/// coordination store is configured.
#[derive(Default)]
pub struct MemoryLeaseStore {
    leases: Mutex<HashMap<String, Instant>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| anyhow::anyhow!("Lease map poisoned: {}", e))?;

        let now = Instant::now();
        match leases.get(key) {
            Some(expires_at) if *expires_at > now => Ok(false),
            _ => {
                leases.insert(key.to_string(), now + ttl);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| anyhow::anyhow!("Lease map poisoned: {}", e))?;

        leases.remove(key);
        Ok(())
    }
}
