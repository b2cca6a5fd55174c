//! Synthetic health source for development and testing.

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::error::Result;

use super::{HealthSample, HealthSource};

/// Generates health samples with bounded random variance around a fixed base
/// load, standing in for a real metrics backend.
#[derive(Debug, Default)]
pub struct SimulatedSource;

impl SimulatedSource {
    /// Create a new simulated source.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HealthSource for SimulatedSource {
    async fn fetch(&self) -> Result<HealthSample> {
        let mut rng = rand::thread_rng();

        // Base load of 75% CPU, 600ms P95, 2% errors, with noise of
        // +/-5 points, +/-50ms, +/-0.5 points respectively.
        let cpu = 0.75 + rng.gen_range(-0.05..0.05);
        let latency = 600.0 + rng.gen_range(-50.0..50.0);
        let errors = 0.02 + rng.gen_range(-0.005..0.005);

        let sample = HealthSample {
            cpu_utilization: cpu.max(0.1),
            p95_latency_ms: latency.max(1.0),
            error_rate: errors.max(0.001),
        };

        debug!(
            cpu = sample.cpu_utilization,
            p95_ms = sample.p95_latency_ms,
            errors = sample.error_rate,
            "Simulated health sample"
        );

        Ok(sample)
    }
}
