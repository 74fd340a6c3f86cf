//! Rolling throughput statistics for the frame stream.
//!
//! Computing stats on every frame would cost more than it tells, so frames
//! are buffered and flushed at most once per interval.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Throughput over the last flush interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub bytes_per_second: f64,
    pub frames_per_second: f64,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    size_in_bytes: u64,
}

/// Frames received since the last flush.
#[derive(Debug)]
pub struct StatsWindow {
    flush_interval: Duration,
    frames: Vec<Frame>,
    /// `None` until the first frame establishes a baseline.
    last_flush: Option<Instant>,
}

impl StatsWindow {
    pub fn new(flush_interval: Duration) -> Self {
        Self {
            flush_interval,
            frames: Vec::new(),
            last_flush: None,
        }
    }

    /// Record a frame received at `now`.
    ///
    /// Returns stats once `now` is past the end of the current interval.
    /// The very first frame starts the clock and counts toward the first
    /// flushed window.
    pub fn record(&mut self, now: Instant, size_in_bytes: u64) -> Option<StreamStats> {
        self.frames.push(Frame { size_in_bytes });
        let Some(last_flush) = self.last_flush else {
            self.last_flush = Some(now);
            return None;
        };

        if now <= last_flush + self.flush_interval {
            return None;
        }

        let elapsed = now.duration_since(last_flush).as_secs_f64();
        let total_bytes: u64 = self.frames.iter().map(|frame| frame.size_in_bytes).sum();
        let stats = StreamStats {
            bytes_per_second: total_bytes as f64 / elapsed,
            frames_per_second: self.frames.len() as f64 / elapsed,
        };

        self.frames.clear();
        self.last_flush = Some(now);
        Some(stats)
    }

    /// Frames buffered since the last flush.
    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }
}
