//! Rayview Core — shared domain layer for the remote renderer client.
//!
//! This crate holds the image, camera and size types, the [`RendererClient`]
//! contract that the scheduling crates drive, and the observer list used to
//! publish their events. No scheduling logic lives here.

pub mod camera;
pub mod error;
pub mod events;
pub mod image;
pub mod renderer;
pub mod size;

// Re-exports for convenience.
pub use camera::{CameraSettings, Lens, Projection};
pub use error::RenderError;
pub use events::{EventChannel, ListenerId};
pub use crate::image::RenderedImage;
pub use renderer::{
    CancellableSnapshot, FrameResult, RendererClient, SnapshotFuture, SnapshotQuality,
    SnapshotRequest, TriggerOptions, with_watchdog,
};
pub use size::PixelSize;
