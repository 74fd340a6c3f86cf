//! Renderer client contract.
//!
//! Defines the [`RendererClient`] trait that the stream controller and the
//! snapshot scheduler drive. The transport behind it (JSON-RPC, WebSocket,
//! an in-process simulator) is up to the implementation; only the call
//! shapes and their settlement rules are fixed here.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::camera::{CameraSettings, Projection};
use crate::error::RenderError;
use crate::image::RenderedImage;
use crate::size::PixelSize;

// ── Streaming ────────────────────────────────────────────────────

/// Flags passed with every streaming frame request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerOptions {
    /// Render even when the scene has not changed since the last frame.
    pub render_even_if_nothing_has_changed: bool,
    /// Render into the renderer's buffer without sending the image back.
    pub prepare_image_without_sending_it: bool,
}

impl TriggerOptions {
    /// Options used by live streaming: only render what changed, and send it.
    pub const STREAMING: Self = Self {
        render_even_if_nothing_has_changed: false,
        prepare_image_without_sending_it: false,
    };
}

/// Outcome of a streaming frame request.
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// The new image, or `None` when there was nothing new to send.
    pub frame: Option<RenderedImage>,
    /// Accumulation progress in `[0, 1]`; below 1 more passes are available.
    pub progress: f32,
    /// Encoded size of the frame on the wire.
    pub size_in_bytes: u64,
}

// ── Snapshots ────────────────────────────────────────────────────

/// Renderer-side quality preset for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotQuality {
    Low,
    Medium,
    High,
}

impl fmt::Display for SnapshotQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Parameters of a single still image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub quality: SnapshotQuality,
    /// Output size in pixels.
    pub size: PixelSize,
    /// Keep the background transparent instead of filling it.
    pub transparent: bool,
    pub camera: CameraSettings,
    /// Projection override; `None` keeps the camera lens.
    pub projection: Option<Projection>,
}

/// Future resolving to a snapshot image.
///
/// Resolves to `Ok(None)` once the snapshot has been cancelled.
pub type SnapshotFuture = BoxFuture<'static, Result<Option<RenderedImage>, RenderError>>;

/// A snapshot in progress, paired with the token that aborts it.
pub struct CancellableSnapshot {
    /// Cancelling stops the renderer work and settles `image`. Cancelling a
    /// finished snapshot does nothing.
    pub cancel: CancellationToken,
    pub image: SnapshotFuture,
}

impl CancellableSnapshot {
    pub fn new(
        cancel: CancellationToken,
        image: impl Future<Output = Result<Option<RenderedImage>, RenderError>> + Send + 'static,
    ) -> Self {
        Self {
            cancel,
            image: Box::pin(image),
        }
    }

    /// A snapshot that is already settled without an image.
    pub fn empty() -> Self {
        Self::new(CancellationToken::new(), async { Ok(None) })
    }
}

impl fmt::Debug for CancellableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableSnapshot")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ── Client trait ─────────────────────────────────────────────────

/// The single renderer endpoint shared by every scheduling component.
///
/// Implementations must be cheap to call concurrently; the schedulers take
/// care of not overlapping their own requests.
pub trait RendererClient: Send + Sync {
    /// Ask for the next streaming frame.
    fn trigger_frame(
        &self,
        options: TriggerOptions,
    ) -> BoxFuture<'_, Result<FrameResult, RenderError>>;

    /// Set the size of the next streamed images.
    fn set_viewport(&self, size: PixelSize) -> BoxFuture<'_, Result<(), RenderError>>;

    /// Start a snapshot and hand back its cancellation token right away.
    ///
    /// The call itself never suspends, so callers can register the token
    /// before any other task gets a chance to run.
    fn take_cancellable_snapshot(&self, request: SnapshotRequest) -> CancellableSnapshot;
}

/// Run a renderer call under an optional watchdog.
///
/// With `limit == None` the call is trusted to settle on its own.
pub async fn with_watchdog<T>(
    limit: Option<Duration>,
    call: impl Future<Output = Result<T, RenderError>>,
) -> Result<T, RenderError> {
    let Some(limit) = limit else {
        return call.await;
    };
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout {
            duration_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
