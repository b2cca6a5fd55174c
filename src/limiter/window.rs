//! Sliding window counter engine for sustained-rate control.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::store::{Store, StoreError};

use super::keys::{epoch_start, KeySpace};

/// Extra lifetime on a window counter beyond the window itself, so the
/// previous epoch's counter is still readable while it overlaps the rolling
/// window.
const COUNTER_GRACE: Duration = Duration::from_secs(60);

/// Estimates the request count over a rolling window by blending the current
/// and previous fixed-window counters.
///
/// The blend is exact at epoch boundaries and approximates a true sliding log
/// in between, which is enough to smooth out the boundary bursts a naive
/// fixed window admits.
pub(crate) struct SlidingWindow {
    store: Arc<dyn Store>,
    keys: KeySpace,
    limit: i64,
    window_millis: u64,
}

impl SlidingWindow {
    pub(crate) fn new(
        store: Arc<dyn Store>,
        keys: KeySpace,
        limit: i64,
        window_duration: Duration,
    ) -> Self {
        Self {
            store,
            keys,
            limit,
            window_millis: window_duration.as_millis().max(1) as u64,
        }
    }

    pub(crate) fn limit(&self) -> i64 {
        self.limit
    }

    /// Estimate the effective request count over the trailing window ending
    /// at `now_millis`. Pure read; counters are mutated only by [`record`].
    ///
    /// [`record`]: SlidingWindow::record
    pub(crate) async fn estimate(
        &self,
        identifier: &str,
        now_millis: u64,
    ) -> Result<i64, StoreError> {
        let current_start = epoch_start(now_millis, self.window_millis);
        let current_key = self.keys.window(identifier, current_start);

        // The very first epoch has no predecessor.
        let (current_count, previous_count) =
            match current_start.checked_sub(self.window_millis) {
                Some(previous_start) => {
                    let previous_key = self.keys.window(identifier, previous_start);
                    let counts = self.store.get_many(&[current_key, previous_key]).await?;
                    (counts[0].unwrap_or(0), counts[1].unwrap_or(0))
                }
                None => {
                    let counts = self.store.get_many(&[current_key]).await?;
                    (counts[0].unwrap_or(0), 0)
                }
            };

        // Fraction of the previous epoch still inside the rolling window.
        let elapsed_in_current = (now_millis - current_start) as f64;
        let overlap = 1.0 - elapsed_in_current / self.window_millis as f64;

        let estimated = (previous_count as f64 * overlap).floor() as i64 + current_count;

        trace!(
            identifier = %identifier,
            current = current_count,
            previous = previous_count,
            overlap = overlap,
            estimated = estimated,
            "Estimated sliding window count"
        );

        Ok(estimated)
    }

    /// Count an admitted request against the current epoch and refresh the
    /// counter's expiration. Called only on commit.
    pub(crate) async fn record(
        &self,
        identifier: &str,
        now_millis: u64,
    ) -> Result<(), StoreError> {
        let current_start = epoch_start(now_millis, self.window_millis);
        let current_key = self.keys.window(identifier, current_start);

        self.store.increment(&current_key).await?;
        self.store
            .expire(
                &current_key,
                Duration::from_millis(self.window_millis) + COUNTER_GRACE,
            )
            .await?;

        Ok(())
    }
}
