//! Adaptive global throughput governor.
//!
//! A second, in-process limiting layer: a global requests-per-second ceiling
//! scaled by a health-derived factor. It shares nothing with the per-client
//! hybrid limiter and its store state; callers compose the two gates.

mod limiter;
mod monitor;

pub use limiter::AdaptiveLimiter;
pub use monitor::HealthMonitor;
