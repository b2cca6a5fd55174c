//! In-process shared state store.
//!
//! Backs the limiter with a concurrent map instead of a remote store. Useful
//! for tests and for single-process deployments where cross-process sharing is
//! not needed. Expiration is enforced lazily on access.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Store, StoreError};

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }
}

/// A [`Store`] held entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys. Primarily useful for tests.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, key: &str) -> Option<i64> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                drop(entry);
                self.entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value),
            None => None,
        }
    }

    fn add(&self, key: &str, delta: i64) -> i64 {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });
        if entry.is_expired(now) {
            entry.value = 0;
            entry.expires_at = None;
        }
        entry.value += delta;
        entry.value
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>, StoreError> {
        Ok(keys.iter().map(|k| self.read(k)).collect())
    }

    async fn set_many(&self, entries: &[(String, i64)], ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Some(Instant::now() + ttl);
        for (key, value) in entries {
            self.entries.insert(
                key.clone(),
                Entry {
                    value: *value,
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.add(key, 1))
    }

    async fn decrement(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.add(key, -1))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_many_missing_keys() {
        let store = MemoryStore::new();
        let values = store
            .get_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![None, None]);
    }

    #[tokio::test]
    async fn test_set_many_then_get_many_preserves_order() {
        let store = MemoryStore::new();
        store
            .set_many(
                &[("a".to_string(), 1), ("b".to_string(), 2)],
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let values = store
            .get_many(&["b".to_string(), "a".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some(2), Some(1), None]);
    }

    #[tokio::test]
    async fn test_increment_creates_at_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("counter").await.unwrap(), 1);
        assert_eq!(store.increment("counter").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_decrement_creates_at_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.decrement("counter").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_expiration_evicts() {
        let store = MemoryStore::new();
        store
            .set_many(&[("k".to_string(), 5)], Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        let values = store.get_many(&["k".to_string()]).await.unwrap();
        assert_eq!(values, vec![None]);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_expire_refreshes_deadline() {
        let store = MemoryStore::new();
        store
            .set_many(&[("k".to_string(), 5)], Duration::from_millis(10))
            .await
            .unwrap();
        store
            .expire("k", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        let values = store.get_many(&["k".to_string()]).await.unwrap();
        assert_eq!(values, vec![Some(5)]);
    }

    #[tokio::test]
    async fn test_increment_after_expiry_restarts_at_zero() {
        let store = MemoryStore::new();
        store
            .set_many(&[("k".to_string(), 9)], Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.increment("k").await.unwrap(), 1);
    }
}
