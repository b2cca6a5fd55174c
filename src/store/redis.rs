//! Redis-backed shared state store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use tracing::debug;

use super::{Store, StoreError};

/// A [`Store`] backed by Redis.
///
/// Holds a connection manager that transparently reconnects; the manager is
/// cheap to clone, so every operation clones its own handle and the store can
/// be shared freely across concurrent callers. Every round-trip runs under a
/// short deadline so a slow or partitioned Redis degrades into a
/// [`StoreError::Timeout`] instead of blocking the request path.
pub struct RedisStore {
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379/`).
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(map_redis_err)?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(map_redis_err)?;

        debug!(url = %url, "Connected to Redis store");

        Ok(Self {
            manager,
            op_timeout,
        })
    }

    /// Build a store from an existing connection manager.
    pub fn from_manager(manager: ConnectionManager, op_timeout: Duration) -> Self {
        Self {
            manager,
            op_timeout,
        }
    }

    async fn deadline<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, RedisError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(map_redis_err),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }
}

fn map_redis_err(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_timeout() || e.is_connection_refusal() || e.is_connection_dropped() {
        StoreError::Unreachable(e.to_string())
    } else {
        StoreError::Protocol(e.to_string())
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    // Redis expirations are whole seconds; round up so a short TTL never
    // becomes an immediate expiry.
    ttl.as_secs().max(1)
}

#[async_trait]
impl Store for RedisStore {
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>, StoreError> {
        let mut conn = self.manager.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.get(key);
        }

        // Fetch as strings so a non-numeric value degrades to "missing"
        // instead of a reply-type error.
        let raw: Vec<Option<String>> = self.deadline(pipe.query_async(&mut conn)).await?;

        Ok(raw
            .into_iter()
            .map(|v| v.and_then(|s| s.parse::<i64>().ok()))
            .collect())
    }

    async fn set_many(&self, entries: &[(String, i64)], ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.set_ex(key, *value, ttl_secs(ttl)).ignore();
        }

        let _: () = self.deadline(pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        self.deadline(conn.incr(key, 1i64)).await
    }

    async fn decrement(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        self.deadline(conn.decr(key, 1i64)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: bool = self.deadline(conn.expire(key, ttl_secs(ttl) as i64)).await?;
        Ok(())
    }
}
