//! Shared state store abstraction.
//!
//! All limiter state lives in a store shared by every serving process. The
//! [`Store`] trait captures the primitives the decision engine relies on:
//! batched atomic reads and writes, native increment/decrement, and per-key
//! expiration. Implementations must not cache counter values across calls.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to the shared store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, dropped, I/O).
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// A store round-trip exceeded its deadline.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store replied with something structurally unexpected.
    #[error("store protocol error: {0}")]
    Protocol(String),
}

/// Trait for shared state store implementations.
///
/// Each batched operation must be atomic against interleaved reads and writes
/// from other processes on the same keys: a caller never observes a torn
/// half-written pair. Values that exist but are not parseable as integers are
/// reported as missing rather than as errors.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch several keys in one atomic batch. Missing keys yield `None`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>, StoreError>;

    /// Write several keys in one atomic batch, setting each key's expiration
    /// to `ttl`.
    async fn set_many(&self, entries: &[(String, i64)], ttl: Duration) -> Result<(), StoreError>;

    /// Atomically increment a key by one, creating it at zero first if absent.
    /// Returns the post-increment value.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    /// Atomically decrement a key by one, creating it at zero first if absent.
    /// Returns the post-decrement value.
    async fn decrement(&self, key: &str) -> Result<i64, StoreError>;

    /// Set or refresh the expiration on a key. A missing key is a no-op.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;
}
