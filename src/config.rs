//! Configuration management for Floodgate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FloodgateError, Result};
use crate::limiter::FailurePolicy;

/// Main configuration for the Floodgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// Shared store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Hybrid limiter configuration
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Adaptive throughput governor configuration
    #[serde(default)]
    pub adaptive: AdaptiveConfig,

    /// What to do when the shared store cannot be consulted
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// Shared store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Key namespace for this limiter instance
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Per-operation store deadline in milliseconds
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            namespace: default_namespace(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_namespace() -> String {
    "floodgate".to_string()
}

fn default_op_timeout_ms() -> u64 {
    500
}

impl StoreConfig {
    /// Per-operation store deadline.
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

/// Hybrid limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum burst size (token bucket capacity)
    #[serde(default = "default_bucket_capacity")]
    pub bucket_capacity: i64,

    /// Time to refill one token, in milliseconds
    #[serde(default = "default_refill_period_ms")]
    pub refill_period_ms: u64,

    /// Maximum estimated requests per window
    #[serde(default = "default_window_limit")]
    pub window_limit: i64,

    /// Window duration in seconds
    #[serde(default = "default_window_duration_secs")]
    pub window_duration_secs: u64,

    /// Inactivity horizon after which an identifier's bucket state is
    /// reclaimed, in seconds
    #[serde(default = "default_idle_expiry_secs")]
    pub idle_expiry_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            bucket_capacity: default_bucket_capacity(),
            refill_period_ms: default_refill_period_ms(),
            window_limit: default_window_limit(),
            window_duration_secs: default_window_duration_secs(),
            idle_expiry_secs: default_idle_expiry_secs(),
        }
    }
}

fn default_bucket_capacity() -> i64 {
    10
}

fn default_refill_period_ms() -> u64 {
    6_000
}

fn default_window_limit() -> i64 {
    100
}

fn default_window_duration_secs() -> u64 {
    3_600
}

fn default_idle_expiry_secs() -> u64 {
    7_200
}

impl LimitsConfig {
    /// Time to refill one token.
    pub fn refill_period(&self) -> Duration {
        Duration::from_millis(self.refill_period_ms)
    }

    /// Duration of the sliding window.
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_duration_secs)
    }

    /// Bucket state inactivity horizon.
    pub fn idle_expiry(&self) -> Duration {
        Duration::from_secs(self.idle_expiry_secs)
    }

    /// Reject configurations the limiter cannot run with. Called once at
    /// startup; invalid limits are fatal, never a runtime path.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_capacity < 1 {
            return Err(FloodgateError::Config(
                "bucket_capacity must be at least 1".to_string(),
            ));
        }
        if self.refill_period_ms == 0 {
            return Err(FloodgateError::Config(
                "refill_period_ms must be non-zero".to_string(),
            ));
        }
        if self.window_limit < 1 {
            return Err(FloodgateError::Config(
                "window_limit must be at least 1".to_string(),
            ));
        }
        if self.window_duration_secs == 0 {
            return Err(FloodgateError::Config(
                "window_duration_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Adaptive throughput governor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Whether to run the health monitor and governor at all
    #[serde(default)]
    pub enabled: bool,

    /// Global throughput ceiling (requests per second) at factor 1.0
    #[serde(default = "default_base_rate_per_sec")]
    pub base_rate_per_sec: f64,

    /// Health polling interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Prometheus base URL; when absent, a simulated health source is used
    #[serde(default)]
    pub prometheus_url: Option<String>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_rate_per_sec: default_base_rate_per_sec(),
            poll_interval_secs: default_poll_interval_secs(),
            prometheus_url: None,
        }
    }
}

fn default_base_rate_per_sec() -> f64 {
    100.0
}

fn default_poll_interval_secs() -> u64 {
    10
}

impl AdaptiveConfig {
    /// Health polling interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Reject configurations the governor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.base_rate_per_sec <= 0.0 {
            return Err(FloodgateError::Config(
                "base_rate_per_sec must be positive".to_string(),
            ));
        }
        if self.enabled && self.poll_interval_secs == 0 {
            return Err(FloodgateError::Config(
                "poll_interval_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl FloodgateConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: FloodgateConfig = serde_yaml::from_str(&contents)
            .map_err(|e| FloodgateError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        if self.store.namespace.is_empty() {
            return Err(FloodgateError::Config(
                "store.namespace must not be empty".to_string(),
            ));
        }
        self.limits.validate()?;
        self.adaptive.validate()?;
        Ok(())
    }
}
