//! Token bucket engine for instantaneous burst control.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::store::{Store, StoreError};

use super::keys::KeySpace;

/// Refills and persists per-identifier token bucket state.
///
/// State lives entirely in the shared store; this struct holds only
/// configuration and a store handle, so concurrent callers share nothing in
/// process. Races between callers on the same identifier can over-grant a
/// bounded number of tokens, never under-grant.
pub(crate) struct TokenBucket {
    store: Arc<dyn Store>,
    keys: KeySpace,
    capacity: i64,
    refill_period_millis: u64,
    idle_expiry: Duration,
}

impl TokenBucket {
    pub(crate) fn new(
        store: Arc<dyn Store>,
        keys: KeySpace,
        capacity: i64,
        refill_period: Duration,
        idle_expiry: Duration,
    ) -> Self {
        Self {
            store,
            keys,
            capacity,
            refill_period_millis: refill_period.as_millis().max(1) as u64,
            idle_expiry,
        }
    }

    /// Credit the bucket for elapsed time, persist the result, and return the
    /// token count BEFORE any consumption by the caller.
    ///
    /// Missing or unreadable state means a fresh identifier: a full bucket
    /// with the refill clock starting now. The last-refill instant advances
    /// only by whole periods actually credited, so fractional progress toward
    /// the next token survives frequent polling.
    pub(crate) async fn refill(
        &self,
        identifier: &str,
        now_millis: u64,
    ) -> Result<i64, StoreError> {
        let tokens_key = self.keys.tokens(identifier);
        let refill_key = self.keys.last_refill(identifier);

        let state = self
            .store
            .get_many(&[tokens_key.clone(), refill_key.clone()])
            .await?;

        let tokens = state[0].unwrap_or(self.capacity);
        let last_refill = state[1]
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(now_millis);

        let elapsed = now_millis.saturating_sub(last_refill);
        let tokens_to_add = (elapsed / self.refill_period_millis) as i64;

        let new_tokens = self.capacity.min(tokens + tokens_to_add);
        let new_last_refill = last_refill + tokens_to_add as u64 * self.refill_period_millis;

        trace!(
            identifier = %identifier,
            tokens = tokens,
            credited = tokens_to_add,
            new_tokens = new_tokens,
            "Refilled token bucket"
        );

        self.store
            .set_many(
                &[
                    (tokens_key, new_tokens),
                    (refill_key, new_last_refill as i64),
                ],
                self.idle_expiry,
            )
            .await?;

        Ok(new_tokens)
    }

    /// Consume one token. Called only after a fully admitted request.
    pub(crate) async fn consume(&self, identifier: &str) -> Result<(), StoreError> {
        self.store.decrement(&self.keys.tokens(identifier)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const START: u64 = 1_700_000_000_000;

    fn bucket(store: Arc<MemoryStore>, capacity: i64, period_millis: u64) -> TokenBucket {
        TokenBucket::new(
            store,
            KeySpace::new("test"),
            capacity,
            Duration::from_millis(period_millis),
            Duration::from_secs(7200),
        )
    }

    async fn stored(store: &MemoryStore, key: &str) -> Option<i64> {
        store.get_many(&[key.to_string()]).await.unwrap()[0]
    }

    #[tokio::test]
    async fn test_fresh_identifier_starts_full() {
        let store = Arc::new(MemoryStore::new());
        let bucket = bucket(store.clone(), 10, 6_000);

        let tokens = bucket.refill("client", START).await.unwrap();
        assert_eq!(tokens, 10);

        // Persisted state matches the lazy-initial values.
        assert_eq!(stored(&store, "test:tokens:client").await, Some(10));
        assert_eq!(stored(&store, "test:refill:client").await, Some(START as i64));
    }

    #[tokio::test]
    async fn test_one_whole_period_credits_one_token() {
        let store = Arc::new(MemoryStore::new());
        let bucket = bucket(store.clone(), 10, 6_000);

        bucket.refill("client", START).await.unwrap();
        for _ in 0..10 {
            bucket.consume("client").await.unwrap();
        }
        assert_eq!(stored(&store, "test:tokens:client").await, Some(0));

        // 7s elapsed: one period credited, 1s of progress retained.
        let tokens = bucket.refill("client", START + 7_000).await.unwrap();
        assert_eq!(tokens, 1);
        assert_eq!(
            stored(&store, "test:refill:client").await,
            Some((START + 6_000) as i64)
        );
    }

    #[tokio::test]
    async fn test_sub_period_progress_is_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let bucket = bucket(store.clone(), 10, 6_000);

        bucket.refill("client", START).await.unwrap();
        for _ in 0..10 {
            bucket.consume("client").await.unwrap();
        }

        // Polling every 2s never advances the refill clock until a whole
        // period has accumulated.
        assert_eq!(bucket.refill("client", START + 2_000).await.unwrap(), 0);
        assert_eq!(bucket.refill("client", START + 4_000).await.unwrap(), 0);
        assert_eq!(bucket.refill("client", START + 6_000).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tokens_clamp_at_capacity() {
        let store = Arc::new(MemoryStore::new());
        let bucket = bucket(store.clone(), 10, 6_000);

        bucket.refill("client", START).await.unwrap();
        bucket.consume("client").await.unwrap();

        // A week idle still refills to exactly capacity.
        let tokens = bucket
            .refill("client", START + 7 * 24 * 3_600_000)
            .await
            .unwrap();
        assert_eq!(tokens, 10);
    }

    #[tokio::test]
    async fn test_zero_elapsed_refill_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let bucket = bucket(store.clone(), 10, 6_000);

        bucket.refill("client", START).await.unwrap();
        bucket.consume("client").await.unwrap();
        let tokens_before = stored(&store, "test:tokens:client").await;
        let refill_before = stored(&store, "test:refill:client").await;

        let tokens = bucket.refill("client", START).await.unwrap();
        assert_eq!(Some(tokens), tokens_before);
        assert_eq!(stored(&store, "test:refill:client").await, refill_before);
    }

    #[tokio::test]
    async fn test_full_replenish_after_capacity_periods() {
        let store = Arc::new(MemoryStore::new());
        let bucket = bucket(store.clone(), 10, 6_000);

        bucket.refill("client", START).await.unwrap();
        for _ in 0..10 {
            bucket.consume("client").await.unwrap();
        }

        let tokens = bucket
            .refill("client", START + 10 * 6_000)
            .await
            .unwrap();
        assert_eq!(tokens, 10);
    }
}
