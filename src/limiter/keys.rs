//! Store key derivation.
//!
//! Per identifier the limiter owns four logical records: the bucket token
//! count, the bucket last-refill timestamp, and one window counter per epoch
//! (current and previous). The textual shapes below are convention; the
//! epoch truncation is the load-bearing part.

/// Builds the store keys for one limiter namespace.
///
/// Namespacing keeps several independently configured limiters (e.g.
/// per-route) from colliding in the same store.
#[derive(Debug, Clone)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    /// Create a key space under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Key holding the bucket token count.
    pub fn tokens(&self, identifier: &str) -> String {
        format!("{}:tokens:{}", self.namespace, identifier)
    }

    /// Key holding the bucket last-refill timestamp (unix millis).
    pub fn last_refill(&self, identifier: &str) -> String {
        format!("{}:refill:{}", self.namespace, identifier)
    }

    /// Key holding the window counter for the epoch starting at
    /// `epoch_start_millis`.
    pub fn window(&self, identifier: &str, epoch_start_millis: u64) -> String {
        format!(
            "{}:window:{}:{}",
            self.namespace,
            identifier,
            epoch_start_millis / 1000
        )
    }
}

/// Truncate `now_millis` to the start of its window epoch.
pub fn epoch_start(now_millis: u64, window_millis: u64) -> u64 {
    (now_millis / window_millis) * window_millis
}
