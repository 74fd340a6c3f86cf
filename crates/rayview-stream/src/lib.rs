//! Rayview Stream — keeps the live viewport image current.
//!
//! [`FrameStreamController`] asks the renderer for frames one at a time,
//! coalesces bursts of refresh requests into a single follow-up, and lets
//! callers batch scene edits inside a [`transaction`] so the viewer never
//! sees a half-applied change.
//!
//! [`transaction`]: FrameStreamController::transaction

mod config;
mod controller;
mod error;
mod stats;

pub use config::{DEFAULT_STATS_FLUSH_INTERVAL, StreamConfig};
pub use controller::{FrameStreamController, StreamEvents};
pub use error::{Result, StreamError};
pub use stats::{StatsWindow, StreamStats};
