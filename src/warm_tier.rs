//! Warm tier (L2) - adapter over a Redis-compatible key-value store
//!
//! The engine consumes the `WarmTierStore` trait, never a concrete client,
//! so tests can substitute an in-memory double and deployments can swap the
//! backing store. Every call in the Redis adapter runs under a bounded
//! timeout; a slow or dead server shows up as a `WarmTier` error, never as a
//! hung future.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

use crate::error::{CacheError, Result};

/// Upper bound on keys per variadic DEL so a namespace-wide clear cannot
/// produce an oversized command or starve the server
const DEL_BATCH_SIZE: usize = 500;

/// Durable, shared key-value store with per-key TTL
///
/// Keys passed to this trait are already namespaced by the engine. TTLs are
/// expressed in whole seconds, the warm store's native unit.
#[async_trait]
pub trait WarmTierStore: Send + Sync {
    /// Fetch the raw serialized payload for a key, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a raw payload with a per-key TTL
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Remove a key; deleting an absent key is a no-op
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove a batch of keys. Backends that support variadic deletes
    /// should override this to avoid one round-trip per key.
    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Enumerate all keys starting with `prefix`
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Liveness probe
    async fn ping(&self) -> Result<()>;
}

/// `WarmTierStore` backed by a Redis-compatible server
pub struct RedisWarmTier {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisWarmTier {
    /// Connect and verify the server is reachable.
    ///
    /// An unreachable warm tier at construction time is a configuration
    /// problem and fails fast rather than degrading silently.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Configuration(format!("invalid warm tier URL: {}", e)))?;

        let conn = timeout(op_timeout, client.get_connection_manager())
            .await
            .map_err(|_| {
                CacheError::Configuration(format!("warm tier unreachable at {}", url))
            })?
            .map_err(|e| {
                CacheError::Configuration(format!("warm tier connection failed: {}", e))
            })?;

        let store = Self { conn, op_timeout };
        store
            .ping()
            .await
            .map_err(|e| CacheError::Configuration(format!("warm tier ping failed: {}", e)))?;

        info!("Connected to warm tier at {}", url);
        Ok(store)
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = redis::RedisResult<T>>,
    ) -> Result<T> {
        match timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(CacheError::WarmTier(format!(
                "operation timed out after {}ms",
                self.op_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl WarmTierStore for RedisWarmTier {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.bounded(async move {
            let reply: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            Ok(reply)
        })
        .await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        self.bounded(async move {
            let _: () = redis::cmd("SETEX")
                .arg(key)
                .arg(ttl_secs)
                .arg(value)
                .query_async(&mut conn)
                .await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.bounded(async move {
            let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        for chunk in keys.chunks(DEL_BATCH_SIZE) {
            let mut conn = self.conn.clone();
            let chunk = chunk.to_vec();
            self.bounded(async move {
                let _: i64 = redis::cmd("DEL").arg(&chunk).query_async(&mut conn).await?;
                Ok(())
            })
            .await?;
        }
        Ok(())
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}*", prefix);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let mut conn = self.conn.clone();
            let pattern = pattern.clone();
            let (next, batch) = self
                .bounded(async move {
                    let reply: (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(100)
                        .query_async(&mut conn)
                        .await?;
                    Ok(reply)
                })
                .await?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let reply: String = self
            .bounded(async move {
                let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok(reply)
            })
            .await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(CacheError::WarmTier(format!(
                "unexpected ping reply: {}",
                reply
            )))
        }
    }
}
