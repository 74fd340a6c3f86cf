//! Camera and projection parameters sent along with snapshot requests.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Orbit-style camera: the eye sits `distance` units from `target` along the
/// local +Z axis rotated by `orientation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Point the camera looks at, in world units.
    pub target: Vec3,
    /// Distance between the eye and the target.
    pub distance: f32,
    /// Rotation applied to the default (+Z) viewing direction.
    pub orientation: Quat,
    /// Lens model of the camera.
    pub lens: Lens,
}

/// Lens model stored on the camera itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Lens {
    /// Parallel projection with a fixed view height in world units.
    Orthographic { height: f32 },
    /// Perspective projection with a vertical field of view in degrees.
    Perspective { fovy: f32 },
}

/// Projection override for a single snapshot.
///
/// When absent, the renderer keeps the projection implied by the camera lens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Projection {
    /// Height of the view in world units.
    Orthographic { height: f32 },
    /// Whole angle between the top and bottom frustum planes, in degrees.
    Perspective { field_of_view: f32 },
}

impl CameraSettings {
    /// World-space position of the eye.
    pub fn position(&self) -> Vec3 {
        self.target + self.orientation * (Vec3::Z * self.distance)
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 1.0,
            orientation: Quat::IDENTITY,
            lens: Lens::Perspective { fovy: 45.0 },
        }
    }
}
