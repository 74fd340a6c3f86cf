//! Single-flight frame streaming.
//!
//! The renderer only ever has one streaming request from us in flight.
//! Refresh requests that arrive meanwhile collapse into one follow-up, and
//! an open transaction holds every request back until it closes.

use std::future::Future;
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;
use rayview_core::{
    EventChannel, PixelSize, RenderedImage, RendererClient, TriggerOptions, with_watchdog,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::stats::{StatsWindow, StreamStats};

// ── State ────────────────────────────────────────────────────────

/// Everything the controller mutates, behind a single lock.
#[derive(Debug)]
struct StreamState {
    /// A `trigger_frame` call is in flight.
    waiting: bool,
    transaction_depth: u32,
    /// Someone asked for a frame while we could not send a request.
    need_another_image: bool,
    accumulation_progress: f32,
    /// Last size successfully handed to the renderer.
    viewport: PixelSize,
    image: Option<RenderedImage>,
    stats: StatsWindow,
}

impl StreamState {
    fn new(config: &StreamConfig) -> Self {
        Self {
            waiting: false,
            transaction_depth: 0,
            need_another_image: false,
            accumulation_progress: 0.0,
            viewport: PixelSize::MIN,
            image: None,
            stats: StatsWindow::new(config.stats_flush_interval),
        }
    }

    fn must_defer(&self) -> bool {
        self.waiting || self.transaction_depth > 0
    }

    /// Remaining accumulation passes are skipped while a transaction is open;
    /// an explicit ask is always honored.
    fn should_ask_again(&self, progress: f32) -> bool {
        if self.need_another_image {
            return true;
        }
        if progress >= 1.0 {
            return false;
        }
        self.transaction_depth == 0
    }
}

// ── Events ───────────────────────────────────────────────────────

/// Observer lists published by the controller.
#[derive(Debug)]
pub struct StreamEvents {
    /// A new frame became the current image.
    pub new_image: EventChannel<RenderedImage>,
    /// Throughput over the last flush interval.
    pub stats: EventChannel<StreamStats>,
    /// Accumulation progress reported with every answered request.
    pub progress: EventChannel<f32>,
}

impl StreamEvents {
    fn new() -> Self {
        Self {
            new_image: EventChannel::new("stream.new_image"),
            stats: EventChannel::new("stream.stats"),
            progress: EventChannel::new("stream.progress"),
        }
    }
}

// ── Controller ───────────────────────────────────────────────────

/// Keeps the live image current with as few renderer calls as possible.
///
/// Cloning is cheap and every clone drives the same stream.
#[derive(Clone)]
pub struct FrameStreamController {
    inner: Arc<Inner>,
}

struct Inner {
    renderer: Arc<dyn RendererClient>,
    config: StreamConfig,
    runtime: Handle,
    state: Mutex<StreamState>,
    /// Mirrors `StreamState::waiting` for tasks that need to await idleness.
    waiting_tx: watch::Sender<bool>,
    events: StreamEvents,
}

impl FrameStreamController {
    /// Create a controller bound to the current tokio runtime.
    ///
    /// Construction does not talk to the renderer. Streaming starts with the
    /// first [`request_frame`](Self::request_frame), usually right after
    /// [`set_viewport`](Self::set_viewport).
    pub fn new(renderer: Arc<dyn RendererClient>, config: StreamConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| StreamError::NoRuntime)?;
        Ok(Self::with_runtime(renderer, config, runtime))
    }

    /// Create a controller that spawns its follow-up requests on `runtime`.
    pub fn with_runtime(
        renderer: Arc<dyn RendererClient>,
        config: StreamConfig,
        runtime: Handle,
    ) -> Self {
        let (waiting_tx, _) = watch::channel(false);
        let state = Mutex::new(StreamState::new(&config));
        Self {
            inner: Arc::new(Inner {
                renderer,
                config,
                runtime,
                state,
                waiting_tx,
                events: StreamEvents::new(),
            }),
        }
    }

    pub fn events(&self) -> &StreamEvents {
        &self.inner.events
    }

    /// Ask the renderer for the next frame.
    ///
    /// Returns immediately when a request is already in flight or a
    /// transaction is open; the ask is then remembered and served by a
    /// single follow-up request. Otherwise waits for the renderer's answer.
    pub async fn ask_for_next_frame(&self) -> Result<()> {
        self.inner.ask_for_next_frame().await
    }

    /// Fire-and-forget variant of [`ask_for_next_frame`](Self::ask_for_next_frame).
    ///
    /// Failures are logged and otherwise dropped.
    pub fn request_frame(&self) {
        self.inner.spawn_request();
    }

    /// Run `action` with streaming suspended.
    ///
    /// Waits for the in-flight request (if any) before running `action`, so
    /// the edit never races a frame. Streaming resumes when the outermost
    /// transaction ends, whether `action` returns, fails, or panics.
    /// Transactions nest.
    pub async fn transaction<F, Fut, T>(&self, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _scope = TransactionScope::enter(&self.inner);
        self.inner.wait_until_idle().await;
        action().await
    }

    /// Set the size of the streamed images.
    ///
    /// Sizes are clamped to at least 1x1. Re-applying the current size does
    /// not reach the renderer.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        let size = PixelSize::new(width, height).clamped();
        let previous = {
            let mut state = self.inner.state.lock();
            if state.viewport == size {
                return Ok(());
            }
            std::mem::replace(&mut state.viewport, size)
        };

        let call = self.inner.renderer.set_viewport(size);
        if let Err(err) = with_watchdog(self.inner.config.render_timeout, call).await {
            tracing::warn!(%size, "viewport update failed: {err}");
            let mut state = self.inner.state.lock();
            // Only roll back if nobody applied a newer size meanwhile.
            if state.viewport == size {
                state.viewport = previous;
            }
            return Err(err.into());
        }

        tracing::debug!(%size, "viewport updated");
        Ok(())
    }

    /// The last image received from the renderer.
    pub fn current_image(&self) -> Option<RenderedImage> {
        self.inner.state.lock().image.clone()
    }

    /// Render the current image into a `width` x `height` picture, scaled to
    /// cover it entirely. `None` before the first frame arrives.
    pub fn take_local_snapshot(&self, width: u32, height: u32) -> Option<RgbaImage> {
        let image = self.current_image()?;
        Some(image.cover_fit(PixelSize::new(width, height)))
    }

    /// Accumulation progress in `[0, 1]` of the last answered request.
    pub fn accumulation_progress(&self) -> f32 {
        self.inner.state.lock().accumulation_progress
    }

    pub fn is_waiting(&self) -> bool {
        self.inner.state.lock().waiting
    }

    pub fn transaction_depth(&self) -> u32 {
        self.inner.state.lock().transaction_depth
    }

    pub fn viewport(&self) -> PixelSize {
        self.inner.state.lock().viewport
    }
}

impl Inner {
    async fn ask_for_next_frame(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.must_defer() {
                state.need_another_image = true;
                tracing::trace!(
                    waiting = state.waiting,
                    depth = state.transaction_depth,
                    "frame request coalesced"
                );
                return Ok(());
            }
            state.need_another_image = false;
            self.set_waiting(&mut state, true);
        }
        let mut in_flight = InFlight {
            inner: self,
            armed: true,
        };

        let call = self.renderer.trigger_frame(TriggerOptions::STREAMING);
        let result = match with_watchdog(self.config.render_timeout, call).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!("frame request failed: {err}");
                drop(in_flight);
                return Err(err.into());
            }
        };

        let progress = if result.progress.is_finite() {
            result.progress.clamp(0.0, 1.0)
        } else {
            1.0
        };

        let stats = {
            let mut state = self.state.lock();
            state.accumulation_progress = progress;
            match &result.frame {
                Some(image) => {
                    state.image = Some(image.clone());
                    state.stats.record(Instant::now(), result.size_in_bytes)
                }
                None => None,
            }
        };

        // Still flagged as waiting here: asks made by listeners coalesce into
        // the follow-up below instead of overtaking this frame.
        self.events.progress.emit(&progress);
        if let Some(image) = &result.frame {
            self.events.new_image.emit(image);
        }
        if let Some(stats) = stats {
            self.events.stats.emit(&stats);
        }

        let ask_again = {
            let mut state = self.state.lock();
            let ask_again = state.should_ask_again(progress);
            in_flight.release(&mut state);
            ask_again
        };
        if ask_again {
            tracing::trace!(progress, "scheduling follow-up frame request");
            self.spawn_request();
        }
        Ok(())
    }

    /// Queue an ask on a later tick of the runtime.
    fn spawn_request(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            // Already logged where it happened.
            let _ = inner.ask_for_next_frame().await;
        });
    }

    fn set_waiting(&self, state: &mut StreamState, waiting: bool) {
        state.waiting = waiting;
        self.waiting_tx.send_replace(waiting);
    }

    async fn wait_until_idle(&self) {
        let mut waiting = self.waiting_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = waiting.wait_for(|waiting| !*waiting).await;
    }
}

/// Clears the `waiting` flag when the request settles, fails, panics, or
/// its future is dropped.
struct InFlight<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl InFlight<'_> {
    fn release(&mut self, state: &mut StreamState) {
        if std::mem::take(&mut self.armed) {
            self.inner.set_waiting(state, false);
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.inner.state.lock();
            self.release(&mut state);
        }
    }
}

/// Holds one level of transaction depth for as long as it lives.
struct TransactionScope<'a> {
    inner: &'a Arc<Inner>,
}

impl<'a> TransactionScope<'a> {
    fn enter(inner: &'a Arc<Inner>) -> Self {
        let mut state = inner.state.lock();
        state.transaction_depth += 1;
        tracing::trace!(depth = state.transaction_depth, "transaction opened");
        Self { inner }
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        let depth = {
            let mut state = self.inner.state.lock();
            state.transaction_depth = state.transaction_depth.saturating_sub(1);
            state.transaction_depth
        };
        tracing::trace!(depth, "transaction closed");
        if depth == 0 {
            self.inner.spawn_request();
        }
    }
}
