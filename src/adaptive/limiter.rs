//! Dynamically scaled global throughput ceiling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

/// The counting window for the governor's ceiling.
const GOVERNOR_WINDOW: Duration = Duration::from_secs(1);

/// Smallest factor the governor will apply, so the rate never drops to zero.
pub(crate) const MIN_FACTOR: f64 = 0.1;

/// A process-wide throughput governor with a health-adjustable ceiling.
///
/// Counts admissions in one-second windows with atomic updates; the
/// effective ceiling is `base_rate * factor`, where the factor is pushed in
/// by the health monitor.
pub struct AdaptiveLimiter {
    /// Requests per second allowed at factor 1.0
    base_rate: f64,
    /// Current throttle factor
    factor: RwLock<f64>,
    /// Admissions counted in the current window
    count: AtomicU64,
    /// When the current window started
    window_start: Mutex<Instant>,
}

impl AdaptiveLimiter {
    /// Create a governor with a base ceiling of `base_rate` requests/second.
    pub fn new(base_rate: f64) -> Self {
        Self {
            base_rate,
            factor: RwLock::new(1.0),
            count: AtomicU64::new(0),
            window_start: Mutex::new(Instant::now()),
        }
    }

    /// Count one request against the scaled ceiling.
    ///
    /// Returns `true` if the request is within the current window's ceiling.
    pub fn allow(&self) -> bool {
        self.maybe_reset_window();

        let new_count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        new_count <= self.ceiling()
    }

    /// Update the throttle factor, clamped to `[0.1, 1.0]`.
    pub fn set_factor(&self, factor: f64) {
        *self.factor.write() = factor.clamp(MIN_FACTOR, 1.0);
    }

    /// The current throttle factor.
    pub fn factor(&self) -> f64 {
        *self.factor.read()
    }

    /// The effective ceiling for the current window, never below one.
    pub fn ceiling(&self) -> u64 {
        (self.base_rate * self.factor()).floor().max(1.0) as u64
    }

    /// Reset the window if it has expired.
    fn maybe_reset_window(&self) {
        let mut window_start = self.window_start.lock();
        if window_start.elapsed() >= GOVERNOR_WINDOW {
            self.count.store(0, Ordering::SeqCst);
            *window_start = Instant::now();
        }
    }
}
