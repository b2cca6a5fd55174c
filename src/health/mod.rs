//! Service health metrics for the adaptive governor.
//!
//! The monitor only needs three numbers; where they come from is an adapter
//! concern behind [`HealthSource`].

mod prometheus;
mod simulated;

pub use prometheus::PrometheusSource;
pub use simulated::SimulatedSource;

use async_trait::async_trait;

use crate::error::Result;

/// A point-in-time sample of the protected service's health.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSample {
    /// CPU utilization as a ratio in `[0, 1]`.
    pub cpu_utilization: f64,
    /// 95th-percentile request latency in milliseconds.
    pub p95_latency_ms: f64,
    /// Fraction of requests failing with server errors, in `[0, 1]`.
    pub error_rate: f64,
}

/// Trait for components that can report service health.
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Fetch the current health sample.
    async fn fetch(&self) -> Result<HealthSample>;
}
