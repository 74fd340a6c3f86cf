//! In-process renderer standing in for a remote path tracer.
//!
//! Shades a camera-dependent gradient, refines it over a fixed number of
//! accumulation passes, and sleeps to imitate render latency. Snapshots
//! honor their cancellation token.

use std::time::Duration;

use futures_util::future::BoxFuture;
use glam::Vec3;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use rayview_core::{
    CameraSettings, CancellableSnapshot, FrameResult, PixelSize, RenderError, RenderedImage,
    RendererClient, SnapshotQuality, SnapshotRequest, TriggerOptions,
};
use tokio_util::sync::CancellationToken;

/// Latency and refinement settings of the simulation.
#[derive(Debug, Clone)]
pub struct SimSettings {
    pub frame_latency: Duration,
    /// Latency of a low-quality snapshot; better qualities take longer.
    pub snapshot_latency: Duration,
    pub accumulation_passes: u32,
}

#[derive(Debug)]
struct SceneState {
    camera: CameraSettings,
    viewport: PixelSize,
    /// Bumped on every change that invalidates accumulated passes.
    version: u64,
    accumulated_version: u64,
    passes_done: u32,
}

pub struct SimRenderer {
    settings: SimSettings,
    scene: Mutex<SceneState>,
}

impl SimRenderer {
    pub fn new(settings: SimSettings) -> Self {
        Self {
            settings,
            scene: Mutex::new(SceneState {
                camera: CameraSettings::default(),
                viewport: PixelSize::MIN,
                version: 1,
                accumulated_version: 0,
                passes_done: 0,
            }),
        }
    }

    /// Move the scene camera. Restarts accumulation.
    pub fn set_camera(&self, camera: CameraSettings) {
        let mut scene = self.scene.lock();
        scene.camera = camera;
        scene.version += 1;
    }

    fn snapshot_latency(&self, quality: SnapshotQuality) -> Duration {
        let factor = match quality {
            SnapshotQuality::Low => 1,
            SnapshotQuality::Medium => 4,
            SnapshotQuality::High => 10,
        };
        self.settings.snapshot_latency * factor
    }
}

impl RendererClient for SimRenderer {
    fn trigger_frame(
        &self,
        options: TriggerOptions,
    ) -> BoxFuture<'_, Result<FrameResult, RenderError>> {
        Box::pin(async move {
            tokio::time::sleep(self.settings.frame_latency).await;

            let passes = self.settings.accumulation_passes.max(1);
            let mut scene = self.scene.lock();
            let changed = scene.accumulated_version != scene.version;
            if changed {
                scene.accumulated_version = scene.version;
                scene.passes_done = 0;
            } else if scene.passes_done >= passes && !options.render_even_if_nothing_has_changed {
                return Ok(FrameResult {
                    frame: None,
                    progress: 1.0,
                    size_in_bytes: 0,
                });
            }

            scene.passes_done = (scene.passes_done + 1).min(passes);
            let progress = scene.passes_done as f32 / passes as f32;
            let (viewport, camera) = (scene.viewport, scene.camera);
            drop(scene);

            if options.prepare_image_without_sending_it {
                return Ok(FrameResult {
                    frame: None,
                    progress,
                    size_in_bytes: 0,
                });
            }

            let pixels = shade(viewport, &camera, progress);
            let size_in_bytes = pixels.as_raw().len() as u64;
            Ok(FrameResult {
                frame: Some(RenderedImage::new(pixels)),
                progress,
                size_in_bytes,
            })
        })
    }

    fn set_viewport(&self, size: PixelSize) -> BoxFuture<'_, Result<(), RenderError>> {
        Box::pin(async move {
            let mut scene = self.scene.lock();
            scene.viewport = size;
            scene.version += 1;
            Ok(())
        })
    }

    fn take_cancellable_snapshot(&self, request: SnapshotRequest) -> CancellableSnapshot {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let latency = self.snapshot_latency(request.quality);

        CancellableSnapshot::new(cancel, async move {
            tokio::select! {
                () = token.cancelled() => Ok(None),
                () = tokio::time::sleep(latency) => {
                    let pixels = shade(request.size, &request.camera, 1.0);
                    Ok(Some(RenderedImage::new(pixels)))
                }
            }
        })
    }
}

/// Gradient tinted by the eye direction, with grain that fades as
/// `progress` reaches 1.
fn shade(size: PixelSize, camera: &CameraSettings, progress: f32) -> RgbaImage {
    let size = size.clamped();
    let eye = (camera.position() - camera.target).normalize_or(Vec3::Z);
    let tint = eye * 0.5 + Vec3::splat(0.5);
    let grain = (1.0 - progress.clamp(0.0, 1.0)) * 0.35;

    RgbaImage::from_fn(size.width, size.height, |x, y| {
        let u = x as f32 / size.width as f32;
        let v = y as f32 / size.height as f32;
        let noise = (hash(x, y) - 0.5) * grain;
        let channel = |value: f32| ((value + noise).clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([
            channel(tint.x * (1.0 - v) + u * 0.2),
            channel(tint.y * (1.0 - u) + v * 0.2),
            channel(tint.z),
            255,
        ])
    })
}

/// Cheap deterministic per-pixel noise in `[0, 1)`.
fn hash(x: u32, y: u32) -> f32 {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    (h & 0xFFFF) as f32 / 65_536.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(passes: u32) -> SimRenderer {
        SimRenderer::new(SimSettings {
            frame_latency: Duration::from_millis(10),
            snapshot_latency: Duration::from_millis(20),
            accumulation_passes: passes,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn accumulation_converges_then_goes_quiet() {
        let renderer = renderer(2);
        renderer.set_viewport(PixelSize::new(8, 4)).await.unwrap();

        let first = renderer.trigger_frame(TriggerOptions::STREAMING).await.unwrap();
        assert_eq!(first.progress, 0.5);
        assert_eq!(first.frame.unwrap().size(), PixelSize::new(8, 4));
        assert_eq!(first.size_in_bytes, 8 * 4 * 4);

        let second = renderer.trigger_frame(TriggerOptions::STREAMING).await.unwrap();
        assert_eq!(second.progress, 1.0);

        let idle = renderer.trigger_frame(TriggerOptions::STREAMING).await.unwrap();
        assert!(idle.frame.is_none());
        assert_eq!(idle.progress, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn camera_moves_restart_accumulation() {
        let renderer = renderer(4);
        renderer.trigger_frame(TriggerOptions::STREAMING).await.unwrap();
        renderer.trigger_frame(TriggerOptions::STREAMING).await.unwrap();

        renderer.set_camera(CameraSettings {
            distance: 3.0,
            ..CameraSettings::default()
        });
        let result = renderer.trigger_frame(TriggerOptions::STREAMING).await.unwrap();
        assert_eq!(result.progress, 0.25);
    }

    #[tokio::test(start_paused = true)]
    async fn viewport_changes_restart_accumulation() {
        let renderer = renderer(2);
        renderer.trigger_frame(TriggerOptions::STREAMING).await.unwrap();

        renderer.set_viewport(PixelSize::MIN).await.unwrap();
        let result = renderer.trigger_frame(TriggerOptions::STREAMING).await.unwrap();
        assert_eq!(result.progress, 0.5);
        assert_eq!(result.frame.unwrap().size(), PixelSize::MIN);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_render_sends_a_frame_even_when_converged() {
        let renderer = renderer(1);
        renderer.trigger_frame(TriggerOptions::STREAMING).await.unwrap();

        let forced = TriggerOptions {
            render_even_if_nothing_has_changed: true,
            ..TriggerOptions::STREAMING
        };
        assert!(renderer.trigger_frame(forced).await.unwrap().frame.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_snapshot_resolves_without_image() {
        let renderer = renderer(1);
        let snapshot = renderer.take_cancellable_snapshot(SnapshotRequest {
            quality: SnapshotQuality::High,
            size: PixelSize::new(16, 16),
            transparent: false,
            camera: CameraSettings::default(),
            projection: None,
        });
        snapshot.cancel.cancel();
        assert!(snapshot.image.await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_matches_the_requested_size() {
        let renderer = renderer(1);
        let snapshot = renderer.take_cancellable_snapshot(SnapshotRequest {
            quality: SnapshotQuality::Low,
            size: PixelSize::new(12, 7),
            transparent: false,
            camera: CameraSettings::default(),
            projection: None,
        });
        let image = snapshot.image.await.unwrap().unwrap();
        assert_eq!(image.size(), PixelSize::new(12, 7));
    }

    #[test]
    fn converged_image_has_no_grain() {
        let camera = CameraSettings::default();
        let a = shade(PixelSize::new(4, 4), &camera, 1.0);
        let b = shade(PixelSize::new(4, 4), &camera, 1.0);
        assert_eq!(a, b);
        let noisy = shade(PixelSize::new(4, 4), &camera, 0.0);
        assert_ne!(a, noisy);
    }
}
