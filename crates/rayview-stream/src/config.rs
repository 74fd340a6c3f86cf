//! Stream controller configuration.

use std::time::Duration;

/// How often throughput statistics are flushed to listeners.
pub const DEFAULT_STATS_FLUSH_INTERVAL: Duration = Duration::from_millis(3000);

/// Tunables for [`FrameStreamController`](crate::FrameStreamController).
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Minimum time between two stats events.
    pub stats_flush_interval: Duration,
    /// Watchdog applied to every renderer call. `None` waits forever.
    pub render_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stats_flush_interval: DEFAULT_STATS_FLUSH_INTERVAL,
            render_timeout: None,
        }
    }
}
