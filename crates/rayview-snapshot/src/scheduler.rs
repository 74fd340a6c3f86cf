//! Lazy two-tier snapshot scheduling.
//!
//! Every scheduled surface gets a low-resolution preview first and a
//! final-quality render later. A single worker drains all pending previews,
//! renders one final image, then looks again, so a burst of camera moves
//! keeps every thumbnail responsive before any slow render starts.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rayview_core::{
    CameraSettings, EventChannel, Projection, RendererClient, SnapshotQuality, SnapshotRequest,
    with_watchdog,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::SnapshotConfig;
use crate::error::SnapshotError;
use crate::queue::{SnapshotTask, TaskQueue};
use crate::surface::{PaintSurface, SurfaceId, SurfaceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Low,
    High,
}

impl Tier {
    fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

// ── State ────────────────────────────────────────────────────────

/// Cancellation handle of the high-res render currently running for a surface.
#[derive(Debug)]
struct InFlightRender {
    ticket: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct SchedulerState {
    surfaces: SurfaceRegistry,
    low_res: TaskQueue,
    high_res: TaskQueue,
    cancellers: HashMap<SurfaceId, InFlightRender>,
    next_ticket: u64,
    /// The worker task is running.
    processing: bool,
}

impl SchedulerState {
    fn count_enabled(&self) -> usize {
        self.low_res.count_enabled() + self.high_res.count_enabled()
    }

    fn queue_mut(&mut self, tier: Tier) -> &mut TaskQueue {
        match tier {
            Tier::Low => &mut self.low_res,
            Tier::High => &mut self.high_res,
        }
    }

    /// Cancel the surface's in-flight high-res render, if any.
    fn cancel_high_res(&mut self, surface: SurfaceId) -> bool {
        match self.cancellers.remove(&surface) {
            Some(render) => {
                render.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Dequeue the next enabled task of `tier`, dropping disabled ones.
    fn next_task(&mut self, tier: Tier) -> Option<SnapshotTask> {
        let queue = self.queue_mut(tier);
        while let Some(task) = queue.pop_front() {
            if task.enabled {
                return Some(task);
            }
        }
        None
    }
}

// ── Events ───────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SnapshotEvents {
    /// `true` while a snapshot is being rendered, `false` in between and
    /// once the worker stops.
    pub busy: EventChannel<bool>,
}

// ── Scheduler ────────────────────────────────────────────────────

/// Renders snapshots of registered surfaces, previews first.
///
/// Cloning is cheap and every clone drives the same queues.
#[derive(Clone)]
pub struct SnapshotScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    renderer: Arc<dyn RendererClient>,
    config: SnapshotConfig,
    runtime: Handle,
    state: Mutex<SchedulerState>,
    /// Mirrors `SchedulerState::processing` for tasks awaiting idleness.
    processing_tx: watch::Sender<bool>,
    events: SnapshotEvents,
}

impl SnapshotScheduler {
    /// Create a scheduler whose worker runs on the current tokio runtime.
    pub fn new(
        renderer: Arc<dyn RendererClient>,
        config: SnapshotConfig,
    ) -> Result<Self, SnapshotError> {
        let runtime = Handle::try_current().map_err(|_| SnapshotError::NoRuntime)?;
        Ok(Self::with_runtime(renderer, config, runtime))
    }

    pub fn with_runtime(
        renderer: Arc<dyn RendererClient>,
        config: SnapshotConfig,
        runtime: Handle,
    ) -> Self {
        let (processing_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                renderer,
                config,
                runtime,
                state: Mutex::new(SchedulerState::default()),
                processing_tx,
                events: SnapshotEvents {
                    busy: EventChannel::new("snapshot.busy"),
                },
            }),
        }
    }

    pub fn events(&self) -> &SnapshotEvents {
        &self.inner.events
    }

    pub fn register_surface(&self, surface: Arc<dyn PaintSurface>) -> SurfaceId {
        let id = self.inner.state.lock().surfaces.register(surface);
        tracing::debug!(surface = %id, "surface registered");
        id
    }

    /// Forget a surface. Its queued tasks are dropped and a high-res render
    /// in flight for it is cancelled.
    pub fn unregister_surface(&self, id: SurfaceId) -> Option<Arc<dyn PaintSurface>> {
        let mut state = self.inner.state.lock();
        let surface = state.surfaces.unregister(id)?;
        state.cancel_high_res(id);
        state.low_res.disable(id);
        state.high_res.disable(id);
        tracing::debug!(surface = %id, "surface unregistered");
        Some(surface)
    }

    /// Queue a preview and a final render of `surface` seen through `camera`.
    ///
    /// Replaces whatever was pending for the surface and cancels its
    /// high-res render if one is in flight, before returning. Never waits
    /// for rendering.
    pub fn schedule_snapshot(
        &self,
        surface: SurfaceId,
        camera: CameraSettings,
        projection: Option<Projection>,
    ) -> Result<(), SnapshotError> {
        let inner = &self.inner;
        let start_worker = {
            let mut state = inner.state.lock();
            if !state.surfaces.contains(surface) {
                return Err(SnapshotError::UnknownSurface(surface));
            }

            if state.cancel_high_res(surface) {
                tracing::debug!(surface = %surface, "cancelled stale high-res snapshot");
            }
            state.high_res.disable(surface);
            state.low_res.upsert(surface, camera, projection);
            state.high_res.upsert(surface, camera, projection);

            let start = !state.processing;
            if start {
                inner.set_processing(&mut state, true);
            }
            start
        };

        if start_worker {
            let worker = Arc::clone(inner);
            inner.runtime.spawn(async move { worker.process().await });
        }
        Ok(())
    }

    /// Whether the worker is running.
    pub fn is_processing(&self) -> bool {
        self.inner.state.lock().processing
    }

    /// Enabled tasks still waiting in either queue.
    pub fn pending_tasks(&self) -> usize {
        self.inner.state.lock().count_enabled()
    }

    /// Wait until the worker has nothing left to render.
    pub async fn wait_until_idle(&self) {
        let mut processing = self.inner.processing_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = processing.wait_for(|processing| !*processing).await;
    }
}

impl Inner {
    fn set_processing(&self, state: &mut SchedulerState, processing: bool) {
        state.processing = processing;
        self.processing_tx.send_replace(processing);
    }

    async fn process(&self) {
        let mut worker = Worker {
            inner: self,
            finished: false,
        };
        tracing::debug!("snapshot worker started");

        loop {
            loop {
                let next = self.state.lock().next_task(Tier::Low);
                let Some(task) = next else { break };
                self.run(task, Tier::Low).await;
            }

            // Only one final-quality render per pass over the previews.
            let next = self.state.lock().next_task(Tier::High);
            if let Some(task) = next {
                self.run(task, Tier::High).await;
            }

            let mut state = self.state.lock();
            if state.count_enabled() == 0 {
                self.set_processing(&mut state, false);
                worker.finished = true;
                break;
            }
        }
        tracing::debug!("snapshot worker idle");
    }

    async fn run(&self, task: SnapshotTask, tier: Tier) {
        let surface = task.surface;
        self.events.busy.emit(&true);
        if let Err(err) = self.render(task, tier).await {
            tracing::warn!(surface = %surface, tier = tier.label(), "snapshot failed: {err}");
        }
        self.events.busy.emit(&false);
    }

    async fn render(&self, task: SnapshotTask, tier: Tier) -> Result<(), SnapshotError> {
        let surface = self.state.lock().surfaces.get(task.surface);
        let Some(surface) = surface else {
            tracing::debug!(surface = %task.surface, "surface gone, snapshot skipped");
            return Ok(());
        };

        let (scale, quality) = self.tier_settings(tier);
        let size = surface.display_size().scaled(scale);
        let snapshot = self.renderer.take_cancellable_snapshot(SnapshotRequest {
            quality,
            size,
            transparent: self.config.transparent,
            camera: task.camera,
            projection: task.projection,
        });

        let cancel = snapshot.cancel.clone();
        let registration = match tier {
            Tier::High => Some(self.register_canceller(task.surface, cancel.clone())),
            Tier::Low => None,
        };

        let image = tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(None),
            image = with_watchdog(self.config.render_timeout, snapshot.image) => image,
        };
        if image.is_err() {
            // Timed out or failed: make sure the renderer drops the work too.
            cancel.cancel();
        }
        // Past this point the render is committed and can no longer be cancelled.
        drop(registration);
        let image = image?;

        tracing::debug!(
            surface = %task.surface,
            tier = tier.label(),
            %size,
            blank = image.is_none(),
            "painting snapshot"
        );
        surface.paint(size, image.as_ref())?;
        Ok(())
    }

    fn tier_settings(&self, tier: Tier) -> (f32, SnapshotQuality) {
        match tier {
            Tier::Low => (self.config.low_res_scale, self.config.low_res_quality),
            Tier::High => (self.config.high_res_scale, self.config.high_res_quality),
        }
    }

    fn register_canceller(
        &self,
        surface: SurfaceId,
        cancel: CancellationToken,
    ) -> CancelRegistration<'_> {
        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        // Rescheduled between dequeue and now: this render is already stale.
        if state.high_res.has_enabled(surface) {
            cancel.cancel();
        }
        state
            .cancellers
            .insert(surface, InFlightRender { ticket, cancel });

        CancelRegistration {
            inner: self,
            surface,
            ticket,
        }
    }
}

/// Removes a surface's canceller once its render settles, unless a newer
/// render replaced it.
struct CancelRegistration<'a> {
    inner: &'a Inner,
    surface: SurfaceId,
    ticket: u64,
}

impl Drop for CancelRegistration<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        if state
            .cancellers
            .get(&self.surface)
            .is_some_and(|render| render.ticket == self.ticket)
        {
            state.cancellers.remove(&self.surface);
        }
    }
}

/// Resets the `processing` flag and reports idle when the worker exits,
/// including by panic or runtime shutdown.
struct Worker<'a> {
    inner: &'a Inner,
    finished: bool,
}

impl Drop for Worker<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::error!("snapshot worker stopped before its queues were empty");
            let mut state = self.inner.state.lock();
            self.inner.set_processing(&mut state, false);
        }
        self.inner.events.busy.emit(&false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::ImageSurface;
    use futures_util::future::BoxFuture;
    use rayview_core::{CancellableSnapshot, FrameResult, PixelSize, RenderError, TriggerOptions};

    /// Answers every snapshot with "no image" right away.
    struct Blank;

    impl RendererClient for Blank {
        fn trigger_frame(
            &self,
            _options: TriggerOptions,
        ) -> BoxFuture<'_, Result<FrameResult, RenderError>> {
            Box::pin(async { Err(RenderError::Rejected("not streaming".into())) })
        }

        fn set_viewport(&self, _size: PixelSize) -> BoxFuture<'_, Result<(), RenderError>> {
            Box::pin(async { Ok(()) })
        }

        fn take_cancellable_snapshot(&self, _request: SnapshotRequest) -> CancellableSnapshot {
            CancellableSnapshot::empty()
        }
    }

    #[test]
    fn next_task_skips_disabled_entries() {
        let mut state = SchedulerState::default();
        let a = state.surfaces.register(Arc::new(ImageSurface::new(1, 1)));
        let b = state.surfaces.register(Arc::new(ImageSurface::new(1, 1)));
        state.high_res.upsert(a, CameraSettings::default(), None);
        state.high_res.upsert(b, CameraSettings::default(), None);
        state.high_res.disable(a);

        assert_eq!(state.next_task(Tier::High).map(|t| t.surface), Some(b));
        assert!(state.next_task(Tier::High).is_none());
        assert_eq!(state.high_res.len(), 0);
    }

    #[test]
    fn cancel_high_res_fires_the_token_once() {
        let mut state = SchedulerState::default();
        let a = state.surfaces.register(Arc::new(ImageSurface::new(1, 1)));
        let token = CancellationToken::new();
        state.cancellers.insert(
            a,
            InFlightRender {
                ticket: 0,
                cancel: token.clone(),
            },
        );

        assert!(state.cancel_high_res(a));
        assert!(token.is_cancelled());
        assert!(!state.cancel_high_res(a));
    }

    #[test]
    fn new_scheduler_requires_a_runtime() {
        let result = SnapshotScheduler::new(Arc::new(Blank), SnapshotConfig::default());
        assert!(matches!(result, Err(SnapshotError::NoRuntime)));
    }

    #[tokio::test]
    async fn scheduling_an_unknown_surface_fails() {
        let scheduler = SnapshotScheduler::new(Arc::new(Blank), SnapshotConfig::default()).unwrap();
        let id = scheduler.register_surface(Arc::new(ImageSurface::new(4, 4)));
        scheduler.unregister_surface(id).unwrap();

        let err = scheduler
            .schedule_snapshot(id, CameraSettings::default(), None)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::UnknownSurface(unknown) if unknown == id));
        assert!(!scheduler.is_processing());
    }

    #[tokio::test]
    async fn blank_snapshots_still_paint_the_surface() {
        let scheduler = SnapshotScheduler::new(Arc::new(Blank), SnapshotConfig::default()).unwrap();
        let surface = Arc::new(ImageSurface::new(40, 20));
        let id = scheduler.register_surface(surface.clone());

        scheduler
            .schedule_snapshot(id, CameraSettings::default(), None)
            .unwrap();
        scheduler.wait_until_idle().await;

        assert_eq!(surface.framebuffer_size(), (40, 20));
        assert_eq!(scheduler.pending_tasks(), 0);
    }
}
