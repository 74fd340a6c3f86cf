//! Scripted viewer session.
//!
//! Orbits the camera around the scene for the configured time. Each step
//! moves the camera inside a stream transaction and asks for fresh
//! thumbnails, the way an interactive viewer would on mouse drag. At the
//! end, every surface and the live image are written as PNGs.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use glam::Quat;
use image::RgbaImage;
use rayview_core::{CameraSettings, Lens, Projection};
use rayview_snapshot::{ImageSurface, SnapshotConfig, SnapshotError, SnapshotScheduler, SurfaceId};
use rayview_stream::{FrameStreamController, StreamConfig, StreamError};

use crate::config::AppConfig;
use crate::ipc::{FlushError, OutboundUiMessages, SessionToUi};
use crate::sim_renderer::{SimRenderer, SimSettings};

/// Viewport size of the live stream.
const VIEWPORT: (u32, u32) = (640, 360);
/// Display sizes of the thumbnail surfaces.
const THUMBNAILS: [(u32, u32); 3] = [(320, 180), (160, 160), (96, 54)];
/// Time between two camera moves.
const ORBIT_STEP: Duration = Duration::from_millis(250);
/// Full turns around the target during the session.
const ORBIT_TURNS: f32 = 1.0;
/// Upper bound on waiting for the stream to converge after the last move.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("failed to write {path}: {source}")]
    Image {
        path: String,
        source: image::ImageError,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write the event log: {0}")]
    EventLog(#[from] FlushError),
}

struct Thumbnail {
    id: SurfaceId,
    surface: Arc<ImageSurface>,
    /// Whether this thumbnail uses an orthographic override.
    orthographic: bool,
}

pub async fn run(config: AppConfig) -> Result<(), SessionError> {
    let renderer = Arc::new(SimRenderer::new(SimSettings {
        frame_latency: config.frame_latency,
        snapshot_latency: config.snapshot_latency,
        accumulation_passes: config.accumulation_passes,
    }));
    let stream = FrameStreamController::new(
        renderer.clone(),
        StreamConfig {
            render_timeout: config.render_timeout,
            ..StreamConfig::default()
        },
    )?;
    let snapshots = SnapshotScheduler::new(
        renderer.clone(),
        SnapshotConfig {
            render_timeout: config.render_timeout,
            ..SnapshotConfig::default()
        },
    )?;

    let outbound = Arc::new(OutboundUiMessages::default());
    forward_events(&stream, &snapshots, &outbound);

    let thumbnails: Vec<Thumbnail> = THUMBNAILS
        .iter()
        .enumerate()
        .map(|(index, &(width, height))| {
            let surface = Arc::new(ImageSurface::new(width, height));
            Thumbnail {
                id: snapshots.register_surface(surface.clone()),
                surface,
                orthographic: index == THUMBNAILS.len() - 1,
            }
        })
        .collect();

    stream.set_viewport(VIEWPORT.0, VIEWPORT.1).await?;
    stream.request_frame();

    let steps = (config.session_length.as_millis() / ORBIT_STEP.as_millis()).max(1) as u32;
    tracing::info!(steps, "starting camera orbit");
    for step in 0..steps {
        let angle = std::f32::consts::TAU * ORBIT_TURNS * step as f32 / steps as f32;
        let camera = CameraSettings {
            distance: 4.0,
            orientation: Quat::from_rotation_y(angle) * Quat::from_rotation_x(-0.3),
            lens: Lens::Perspective { fovy: 50.0 },
            ..CameraSettings::default()
        };

        stream
            .transaction(|| async { renderer.set_camera(camera) })
            .await;
        for thumbnail in &thumbnails {
            let projection = thumbnail
                .orthographic
                .then_some(Projection::Orthographic { height: 3.0 });
            snapshots.schedule_snapshot(thumbnail.id, camera, projection)?;
        }
        tokio::time::sleep(ORBIT_STEP).await;
    }

    tracing::info!("orbit done, waiting for renders to settle");
    snapshots.wait_until_idle().await;
    if tokio::time::timeout(SETTLE_TIMEOUT, wait_for_convergence(&stream))
        .await
        .is_err()
    {
        tracing::warn!(
            progress = stream.accumulation_progress(),
            "stream did not converge in time"
        );
    }

    fs::create_dir_all(&config.output_dir)?;
    if let Some(live) = stream.take_local_snapshot(VIEWPORT.0, VIEWPORT.1) {
        save(&config.output_dir, "viewport", &live, &outbound)?;
    }
    for (index, thumbnail) in thumbnails.iter().enumerate() {
        let name = format!("thumbnail-{index}");
        save(&config.output_dir, &name, &thumbnail.surface.snapshot(), &outbound)?;
    }

    let log_path = config.output_dir.join("events.jsonl");
    let written = outbound.flush_json_lines(BufWriter::new(File::create(&log_path)?))?;
    tracing::info!(events = written, path = %log_path.display(), "session finished");
    Ok(())
}

/// Mirror component events into the outbound message queue.
fn forward_events(
    stream: &FrameStreamController,
    snapshots: &SnapshotScheduler,
    outbound: &Arc<OutboundUiMessages>,
) {
    let events = stream.events();

    let out = Arc::clone(outbound);
    events.new_image.subscribe(move |image| {
        out.send(SessionToUi::FrameReceived {
            width: image.width(),
            height: image.height(),
        });
    });

    let out = Arc::clone(outbound);
    events.progress.subscribe(move |value| {
        out.send(SessionToUi::Progress { value: *value });
    });

    let out = Arc::clone(outbound);
    events.stats.subscribe(move |stats| {
        tracing::info!(
            fps = stats.frames_per_second,
            bytes_per_second = stats.bytes_per_second,
            "stream stats"
        );
        out.send(SessionToUi::Stats { stats: *stats });
    });

    let out = Arc::clone(outbound);
    snapshots.events().busy.subscribe(move |busy| {
        out.send(SessionToUi::SnapshotBusy { busy: *busy });
    });
}

async fn wait_for_convergence(stream: &FrameStreamController) {
    while stream.is_waiting() || stream.accumulation_progress() < 1.0 {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn save(
    dir: &Path,
    name: &str,
    pixels: &RgbaImage,
    outbound: &OutboundUiMessages,
) -> Result<(), SessionError> {
    let path = dir.join(format!("{name}.png"));
    if pixels.width() == 0 || pixels.height() == 0 {
        tracing::warn!(name, "nothing painted, skipping");
        outbound.send(SessionToUi::Error {
            message: format!("{name} was never painted"),
        });
        return Ok(());
    }

    pixels.save(&path).map_err(|source| SessionError::Image {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(name, path = %path.display(), "image saved");
    outbound.send(SessionToUi::ImageSaved {
        name: name.to_owned(),
        path: path.display().to_string(),
        width: pixels.width(),
        height: pixels.height(),
    });
    Ok(())
}
