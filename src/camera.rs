//! Perspective camera, viewport and pointer-to-ray mapping.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{Ray, Vec3};

/// Output surface size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A viewport is usable when both sides are positive and finite.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    #[inline]
    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    /// Maps a pointer position (pixels, origin top-left) to normalized
    /// device coordinates in `-1.0..=1.0`, with +y up.
    pub fn to_ndc(&self, x: f64, y: f64) -> (f64, f64) {
        ((x / self.width) * 2.0 - 1.0, -(y / self.height) * 2.0 + 1.0)
    }
}

/// A perspective camera orbiting a target point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov_deg: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    pub position: Vec3,
    pub target: Vec3,
}

impl PerspectiveCamera {
    pub const DEFAULT_FOV_DEG: f64 = 75.0;
    pub const DEFAULT_NEAR: f64 = 0.1;
    pub const DEFAULT_FAR: f64 = 1000.0;
    pub const DEFAULT_POSITION: Vec3 = Vec3::new(200.0, 200.0, 200.0);

    pub fn new(viewport: Viewport) -> Self {
        Self {
            fov_deg: Self::DEFAULT_FOV_DEG,
            aspect: if viewport.is_valid() { viewport.aspect() } else { 1.0 },
            near: Self::DEFAULT_NEAR,
            far: Self::DEFAULT_FAR,
            position: Self::DEFAULT_POSITION,
            target: Vec3::zero(),
        }
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Recomputes the projection for a new output size.
    ///
    /// Degenerate sizes (a minimized window) keep the previous aspect.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport.is_valid() {
            self.aspect = viewport.aspect();
        }
    }

    /// Orthonormal camera basis `(forward, right, up)`.
    fn basis(&self) -> Option<(Vec3, Vec3, Vec3)> {
        let forward = (self.target - self.position).normalized()?;
        let right = forward
            .cross(&Vec3::up())
            .normalized()
            // looking straight up or down
            .or_else(|| forward.cross(&Vec3::new(0.0, 0.0, -1.0)).normalized())?;
        let up = right.cross(&forward);
        Some((forward, right, up))
    }

    /// Casts a ray from the camera through a point in normalized device
    /// coordinates.
    pub fn ray_from_ndc(&self, ndc_x: f64, ndc_y: f64) -> Option<Ray> {
        let (forward, right, up) = self.basis()?;
        let half_height = (self.fov_deg.to_radians() / 2.0).tan();
        let half_width = half_height * self.aspect;
        let direction = forward + right * (ndc_x * half_width) + up * (ndc_y * half_height);
        Ray::new(self.position, direction)
    }

    /// Projects a world point to normalized device coordinates. Points
    /// behind the camera yield `None`.
    #[cfg(test)]
    pub fn project(&self, point: Vec3) -> Option<(f64, f64)> {
        let (forward, right, up) = self.basis()?;
        let rel = point - self.position;
        let depth = rel.dot(&forward);
        if depth <= self.near {
            return None;
        }
        let half_height = (self.fov_deg.to_radians() / 2.0).tan();
        let half_width = half_height * self.aspect;
        Some((
            rel.dot(&right) / (depth * half_width),
            rel.dot(&up) / (depth * half_height),
        ))
    }
}
