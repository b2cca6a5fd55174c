//! Hybrid admission decision engine.
//!
//! Composes the token bucket (instantaneous burst gate) and the sliding
//! window counter (sustained-rate gate) into a single boolean decision
//! against shared store state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::LimitsConfig;
use crate::error::Result;
use crate::store::{Store, StoreError};

use super::bucket::TokenBucket;
use super::clock::{Clock, SystemClock};
use super::keys::KeySpace;
use super::window::SlidingWindow;

/// What to do with a request when the shared store cannot be consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit the request. An unreachable limiter must not itself become an
    /// outage; limits go temporarily unenforced during store trouble.
    FailOpen,
    /// Deny the request, trading availability for strict enforcement.
    FailClosed,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailOpen
    }
}

/// Trait for admission gate implementations.
///
/// The surrounding server depends on this seam rather than a concrete
/// limiter; translating a `false` into a rate-limit-exceeded response is the
/// caller's job.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Decide whether a request from `identifier` may proceed.
    async fn allow(&self, identifier: &str) -> bool;
}

/// The hybrid rate limiter.
///
/// Holds only configuration and a store handle; all counter state lives in
/// the shared store, so any number of processes can serve the same
/// identifiers. Concurrent calls for one identifier race benignly: both may
/// read the same pre-commit counts and admit, transiently exceeding the
/// nominal limit by at most the number of genuinely concurrent racers. That
/// looseness is accepted by design; serializing it away would cost a
/// distributed lock on every request.
pub struct HybridLimiter {
    bucket: TokenBucket,
    window: SlidingWindow,
    failure_policy: FailurePolicy,
    clock: Arc<dyn Clock>,
}

impl HybridLimiter {
    /// Create a limiter over `store`, keyed under `namespace`.
    ///
    /// Fails fast on invalid limit configuration.
    pub fn new(
        limits: &LimitsConfig,
        failure_policy: FailurePolicy,
        namespace: impl Into<String>,
        store: Arc<dyn Store>,
    ) -> Result<Self> {
        Self::with_clock(limits, failure_policy, namespace, store, Arc::new(SystemClock))
    }

    /// Create a limiter with an explicit time source.
    pub fn with_clock(
        limits: &LimitsConfig,
        failure_policy: FailurePolicy,
        namespace: impl Into<String>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        limits.validate()?;

        let keys = KeySpace::new(namespace);
        let bucket = TokenBucket::new(
            store.clone(),
            keys.clone(),
            limits.bucket_capacity,
            limits.refill_period(),
            limits.idle_expiry(),
        );
        let window = SlidingWindow::new(
            store,
            keys,
            limits.window_limit,
            limits.window_duration(),
        );

        Ok(Self {
            bucket,
            window,
            failure_policy,
            clock,
        })
    }

    /// Decide whether a request from `identifier` may proceed, consuming one
    /// token and counting the request if so.
    ///
    /// The burst gate runs first and short-circuits: an empty bucket denies
    /// without paying for the window read. A window denial does not refund
    /// the refill already persisted; the token decrement happens only on
    /// commit, so the denied request loses nothing.
    pub async fn allow(&self, identifier: &str) -> bool {
        let now = self.clock.now_millis();

        let tokens = match self.bucket.refill(identifier, now).await {
            Ok(tokens) => tokens,
            Err(e) => return self.on_store_error("token_bucket", identifier, &e),
        };

        if tokens < 1 {
            debug!(identifier = %identifier, "Denied: burst capacity exhausted");
            return false;
        }

        let estimated = match self.window.estimate(identifier, now).await {
            Ok(estimated) => estimated,
            Err(e) => return self.on_store_error("sliding_window", identifier, &e),
        };

        if estimated >= self.window.limit() {
            debug!(
                identifier = %identifier,
                estimated = estimated,
                limit = self.window.limit(),
                "Denied: sustained rate limit exceeded"
            );
            return false;
        }

        // Commit. The two mutations are independent counters, each atomic on
        // its own; a failure here is logged but cannot retract the decision.
        if let Err(e) = self.bucket.consume(identifier).await {
            warn!(identifier = %identifier, error = %e, "Failed to consume token on commit");
        }
        if let Err(e) = self.window.record(identifier, now).await {
            warn!(identifier = %identifier, error = %e, "Failed to record request on commit");
        }

        trace!(
            identifier = %identifier,
            tokens_left = tokens - 1,
            estimated = estimated + 1,
            "Allowed"
        );
        true
    }

    fn on_store_error(&self, stage: &str, identifier: &str, error: &StoreError) -> bool {
        match self.failure_policy {
            FailurePolicy::FailOpen => {
                warn!(
                    stage = stage,
                    identifier = %identifier,
                    error = %error,
                    "Store error; failing open"
                );
                true
            }
            FailurePolicy::FailClosed => {
                warn!(
                    stage = stage,
                    identifier = %identifier,
                    error = %error,
                    "Store error; failing closed"
                );
                false
            }
        }
    }
}

#[async_trait]
impl AdmissionControl for HybridLimiter {
    async fn allow(&self, identifier: &str) -> bool {
        HybridLimiter::allow(self, identifier).await
    }
}
