//! Rayview Snapshot — still images for thumbnails and secondary views.
//!
//! [`SnapshotScheduler`] renders every scheduled surface twice: first a cheap
//! low-resolution preview, then a final-quality image once the preview queue
//! is drained. Rescheduling a surface replaces its pending parameters and
//! cancels a stale high-resolution render that is still in flight.

mod config;
mod error;
mod queue;
mod scheduler;
mod surface;

pub use config::{DEFAULT_HIGH_RES_SCALE, DEFAULT_LOW_RES_SCALE, SnapshotConfig};
pub use error::{SnapshotError, SurfaceError};
pub use scheduler::{SnapshotEvents, SnapshotScheduler};
pub use surface::{
    ImageSurface, MAX_SURFACE_DIMENSION, PaintSurface, SurfaceId, SurfaceRegistry,
};
