//! Hybrid admission decision engine and its supporting arithmetic.

mod bucket;
mod clock;
mod hybrid;
mod keys;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use hybrid::{AdmissionControl, FailurePolicy, HybridLimiter};
pub use keys::KeySpace;
