//! Drawable surfaces that snapshots are painted onto.
//!
//! The scheduler never holds surfaces by reference identity; it keys its
//! queues by the [`SurfaceId`] handed out by a [`SurfaceRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbaImage;
use image::imageops::{self, FilterType};
use parking_lot::Mutex;
use rayview_core::{PixelSize, RenderedImage};

use crate::error::SurfaceError;

/// Largest width or height an [`ImageSurface`] accepts.
pub const MAX_SURFACE_DIMENSION: u32 = 16_384;

// ── Surface contract ─────────────────────────────────────────────

/// Something a snapshot can be painted onto.
pub trait PaintSurface: Send + Sync {
    /// Size the surface is currently displayed at, in physical pixels.
    fn display_size(&self) -> PixelSize;

    /// Resize the backing buffer to `size`, clear it, and draw `image`
    /// stretched over the whole buffer. `None` leaves the surface blank.
    fn paint(&self, size: PixelSize, image: Option<&RenderedImage>) -> Result<(), SurfaceError>;
}

/// Stable handle for a registered surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface #{}", self.0)
    }
}

// ── Registry ─────────────────────────────────────────────────────

/// Issues [`SurfaceId`]s and resolves them back to surfaces.
///
/// Ids are never reused, so a stale id cannot silently address a surface
/// registered later.
#[derive(Default)]
pub struct SurfaceRegistry {
    next_id: u64,
    surfaces: HashMap<SurfaceId, Arc<dyn PaintSurface>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, surface: Arc<dyn PaintSurface>) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.surfaces.insert(id, surface);
        id
    }

    pub fn unregister(&mut self, id: SurfaceId) -> Option<Arc<dyn PaintSurface>> {
        self.surfaces.remove(&id)
    }

    pub fn get(&self, id: SurfaceId) -> Option<Arc<dyn PaintSurface>> {
        self.surfaces.get(&id).cloned()
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

impl fmt::Debug for SurfaceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.surfaces.keys().copied().collect();
        ids.sort();
        f.debug_struct("SurfaceRegistry")
            .field("next_id", &self.next_id)
            .field("surfaces", &ids)
            .finish()
    }
}

// ── In-memory surface ────────────────────────────────────────────

/// A surface backed by an RGBA framebuffer in memory.
///
/// Paints mark the framebuffer dirty; [`capture_if_dirty`](Self::capture_if_dirty)
/// hands out the latest contents once per change.
#[derive(Debug)]
pub struct ImageSurface {
    display_size: Mutex<PixelSize>,
    framebuffer: Mutex<RgbaImage>,
    dirty: AtomicBool,
}

impl ImageSurface {
    /// A blank surface displayed at `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            display_size: Mutex::new(PixelSize::new(width, height)),
            framebuffer: Mutex::new(RgbaImage::new(0, 0)),
            dirty: AtomicBool::new(false),
        }
    }

    /// Change the size the surface is displayed at. The framebuffer keeps its
    /// current contents until the next paint.
    pub fn set_display_size(&self, width: u32, height: u32) {
        *self.display_size.lock() = PixelSize::new(width, height);
    }

    /// Copy of the framebuffer if it changed since the last call.
    pub fn capture_if_dirty(&self) -> Option<RgbaImage> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return None;
        }
        Some(self.framebuffer.lock().clone())
    }

    /// Copy of the framebuffer, dirty or not.
    pub fn snapshot(&self) -> RgbaImage {
        self.framebuffer.lock().clone()
    }

    /// Current size of the framebuffer (zero until the first paint).
    pub fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer.lock().dimensions()
    }
}

impl PaintSurface for ImageSurface {
    fn display_size(&self) -> PixelSize {
        *self.display_size.lock()
    }

    fn paint(&self, size: PixelSize, image: Option<&RenderedImage>) -> Result<(), SurfaceError> {
        if size.width > MAX_SURFACE_DIMENSION || size.height > MAX_SURFACE_DIMENSION {
            return Err(SurfaceError::TooLarge {
                size,
                limit: MAX_SURFACE_DIMENSION,
            });
        }

        let next = match image {
            Some(image) if image.size() == size => image.pixels().clone(),
            Some(image) => {
                imageops::resize(image.pixels(), size.width, size.height, FilterType::Triangle)
            }
            None => RgbaImage::new(size.width, size.height),
        };

        *self.framebuffer.lock() = next;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }
}
