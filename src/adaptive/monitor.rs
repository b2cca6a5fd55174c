//! Background loop that adjusts the governor from service health.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::health::{HealthSample, HealthSource};

use super::limiter::{AdaptiveLimiter, MIN_FACTOR};

/// Keep CPU utilization below this ratio.
const TARGET_CPU: f64 = 0.70;
/// Keep P95 latency below this many milliseconds.
const TARGET_P95_LATENCY_MS: f64 = 500.0;
/// Keep the server error rate below this fraction.
const TARGET_ERROR_RATE: f64 = 0.01;

/// Periodic task that polls a [`HealthSource`] and pushes the resulting
/// throttle factor into an [`AdaptiveLimiter`].
pub struct HealthMonitor {
    governor: Arc<AdaptiveLimiter>,
    source: Arc<dyn HealthSource>,
    interval: Duration,
}

impl HealthMonitor {
    /// Create a monitor polling `source` every `interval`.
    pub fn new(
        governor: Arc<AdaptiveLimiter>,
        source: Arc<dyn HealthSource>,
        interval: Duration,
    ) -> Self {
        Self {
            governor,
            source,
            interval,
        }
    }

    /// Run the check-and-adjust loop until the process exits.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Run the check-and-adjust loop until `shutdown` resolves.
    ///
    /// A failed health fetch keeps the current factor; the next tick tries
    /// again fresh.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: std::future::Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(self.interval);
        info!(interval = ?self.interval, "Adaptive health monitor started");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Adaptive health monitor stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.source.fetch().await {
                        Ok(sample) => {
                            let factor = throttle_factor(&sample);
                            self.governor.set_factor(factor);
                            debug!(
                                factor = factor,
                                ceiling = self.governor.ceiling(),
                                "Updated throttle factor"
                            );
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to fetch health metrics; keeping current rate");
                        }
                    }
                }
            }
        }
    }
}

/// Compute the throttle factor from a health sample.
///
/// Each metric contributes `target / current`; the most stressed metric
/// dictates the throttle. The result is clamped to `[0.1, 1.0]` so a healthy
/// service runs unthrottled and a melting one still serves a trickle. A
/// metric reading zero carries no signal and is treated as unstressed.
fn throttle_factor(sample: &HealthSample) -> f64 {
    fn ratio(target: f64, current: f64) -> f64 {
        if current > 0.0 {
            target / current
        } else {
            1.0
        }
    }

    ratio(TARGET_CPU, sample.cpu_utilization)
        .min(ratio(TARGET_P95_LATENCY_MS, sample.p95_latency_ms))
        .min(ratio(TARGET_ERROR_RATE, sample.error_rate))
        .clamp(MIN_FACTOR, 1.0)
}
