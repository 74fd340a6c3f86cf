use rayview_core::{PixelSize, RenderError};

use crate::surface::SurfaceId;

/// Failure to paint onto a drawable surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface cannot hold a {size} image (limit {limit}px per side)")]
    TooLarge { size: PixelSize, limit: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot failed: {0}")]
    Render(#[from] RenderError),

    #[error("{0} is not registered")]
    UnknownSurface(SurfaceId),

    #[error("paint failed: {0}")]
    Surface(#[from] SurfaceError),

    #[error("no tokio runtime available to run the snapshot worker")]
    NoRuntime,
}
