//! Pixel sizes for viewports, surfaces, and snapshot requests.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A width/height pair in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelSize {
    /// Smallest size ever sent to the renderer.
    pub const MIN: Self = Self {
        width: 1,
        height: 1,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp both axes to at least one pixel.
    pub fn clamped(self) -> Self {
        Self {
            width: self.width.max(Self::MIN.width),
            height: self.height.max(Self::MIN.height),
        }
    }

    /// Scale both axes by `factor`, rounding to the nearest pixel.
    ///
    /// The result is clamped, so a zero-sized or heavily downscaled surface
    /// still yields a drawable size.
    pub fn scaled(self, factor: f32) -> Self {
        let factor = if factor.is_finite() { factor.max(0.0) } else { 1.0 };
        let scale = |v: u32| (v as f32 * factor).round() as u32;
        Self::new(scale(self.width), scale(self.height)).clamped()
    }
}

impl Default for PixelSize {
    fn default() -> Self {
        Self::MIN
    }
}

impl From<(u32, u32)> for PixelSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl fmt::Display for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_scale_rounds_to_nearest_pixel() {
        assert_eq!(PixelSize::new(402, 198).scaled(0.25), PixelSize::new(101, 50));
    }

    #[test]
    fn scaling_never_produces_an_empty_size() {
        assert_eq!(PixelSize::new(1, 0).scaled(0.25), PixelSize::MIN);
        assert_eq!(PixelSize::new(0, 0).scaled(1.0), PixelSize::MIN);
    }

    #[test]
    fn non_finite_factor_is_treated_as_identity() {
        assert_eq!(PixelSize::new(64, 32).scaled(f32::NAN), PixelSize::new(64, 32));
    }

    #[test]
    fn clamped_keeps_valid_sizes() {
        assert_eq!(PixelSize::new(640, 480).clamped(), PixelSize::new(640, 480));
        assert_eq!(PixelSize::new(0, 480).clamped(), PixelSize::new(1, 480));
    }

    #[test]
    fn display_uses_width_by_height() {
        assert_eq!(PixelSize::new(1920, 1080).to_string(), "1920x1080");
    }
}
