use std::time::Duration;

/// Reconnection policy: a fixed number of dial attempts with a fixed pause
/// between consecutive attempts.
///
/// # Default Configuration
///
/// - `retry_limit`: 3
/// - `retry_interval`: 1 second
///
/// # Example
///
/// ```rust
/// use micronet_client::ReconnectPolicy;
/// use std::time::Duration;
///
/// let policy = ReconnectPolicy::new(5, Duration::from_millis(200));
/// assert_eq!(policy.max_wait(), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Number of dial attempts; 0 disables reconnection
    pub retry_limit: u32,
    /// Pause between two consecutive attempts
    pub retry_interval: Duration,
}

impl ReconnectPolicy {
    pub fn new(retry_limit: u32, retry_interval: Duration) -> Self {
        Self {
            retry_limit,
            retry_interval,
        }
    }

    /// A policy that never re-dials: a lost connection fails the call at once.
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total time spent sleeping when every attempt fails.
    pub fn max_wait(&self) -> Duration {
        self.retry_interval * self.retry_limit.saturating_sub(1)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            retry_interval: Duration::from_secs(1),
        }
    }
}
