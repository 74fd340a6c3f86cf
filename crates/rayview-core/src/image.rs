//! Image representation for frames and snapshots coming back from the renderer.

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::size::PixelSize;

/// A decoded renderer image. Always stored as RGBA8.
///
/// The pixel buffer is shared behind an `Arc`, so handing the same frame to
/// several listeners never copies it.
#[derive(Clone)]
pub struct RenderedImage {
    pixels: Arc<RgbaImage>,
}

impl RenderedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width(), self.height())
    }

    /// Borrow the underlying RGBA buffer.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Whether both handles point at the same pixel buffer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Scale this image so it fully covers `target`, centered, cropping
    /// whatever overflows on the longer axis.
    pub fn cover_fit(&self, target: PixelSize) -> RgbaImage {
        let target = target.clamped();
        let source = self.size().clamped();

        let scale_x = f64::from(target.width) / f64::from(source.width);
        let scale_y = f64::from(target.height) / f64::from(source.height);
        let scale = scale_x.max(scale_y);

        let scaled_width = ((f64::from(source.width) * scale).round() as u32).max(target.width);
        let scaled_height = ((f64::from(source.height) * scale).round() as u32).max(target.height);

        let scaled = imageops::resize(
            self.pixels.as_ref(),
            scaled_width,
            scaled_height,
            FilterType::Triangle,
        );
        let x = (scaled_width - target.width) / 2;
        let y = (scaled_height - target.height) / 2;
        imageops::crop_imm(&scaled, x, y, target.width, target.height).to_image()
    }
}

impl From<RgbaImage> for RenderedImage {
    fn from(pixels: RgbaImage) -> Self {
        Self::new(pixels)
    }
}

impl fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Left half red, right half blue.
    fn split_image(width: u32, height: u32) -> RenderedImage {
        let pixels = RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        RenderedImage::new(pixels)
    }

    #[test]
    fn cover_fit_produces_requested_size() {
        let image = split_image(200, 100);
        let fitted = image.cover_fit(PixelSize::new(50, 50));
        assert_eq!(fitted.dimensions(), (50, 50));
    }

    #[test]
    fn cover_fit_crops_the_longer_axis_around_the_center() {
        // A 2:1 image into a square: the middle half survives, so both
        // colors stay visible on either side of the center line.
        let image = split_image(200, 100);
        let fitted = image.cover_fit(PixelSize::new(40, 40));
        assert_eq!(fitted.get_pixel(2, 20).0, [255, 0, 0, 255]);
        assert_eq!(fitted.get_pixel(37, 20).0, [0, 0, 255, 255]);
    }

    #[test]
    fn cover_fit_clamps_degenerate_targets() {
        let image = split_image(8, 8);
        assert_eq!(image.cover_fit(PixelSize::new(0, 0)).dimensions(), (1, 1));
    }

    #[test]
    fn clones_share_the_pixel_buffer() {
        let image = split_image(4, 4);
        let copy = image.clone();
        assert!(image.ptr_eq(&copy));
        assert!(!image.ptr_eq(&split_image(4, 4)));
    }
}
