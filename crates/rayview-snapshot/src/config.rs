//! Snapshot scheduler configuration.

use std::time::Duration;

use rayview_core::SnapshotQuality;

/// Preview snapshots are rendered at a quarter of the surface size.
pub const DEFAULT_LOW_RES_SCALE: f32 = 0.25;

/// Final snapshots match the surface size.
pub const DEFAULT_HIGH_RES_SCALE: f32 = 1.0;

/// Tunables for [`SnapshotScheduler`](crate::SnapshotScheduler).
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Fraction of the surface display size used for preview renders.
    pub low_res_scale: f32,
    /// Fraction of the surface display size used for final renders.
    pub high_res_scale: f32,
    pub low_res_quality: SnapshotQuality,
    pub high_res_quality: SnapshotQuality,
    /// Ask the renderer to keep the background transparent.
    pub transparent: bool,
    /// Watchdog applied to every snapshot. `None` waits forever.
    pub render_timeout: Option<Duration>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            low_res_scale: DEFAULT_LOW_RES_SCALE,
            high_res_scale: DEFAULT_HIGH_RES_SCALE,
            low_res_quality: SnapshotQuality::Low,
            high_res_quality: SnapshotQuality::Medium,
            transparent: false,
            render_timeout: None,
        }
    }
}
