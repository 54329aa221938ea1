//! Projection planning
//!
//! Rebuilds the projection matrix and the squared cosine of the view cone only
//! when the field of view or the viewport size changes. Both are derived from
//! the same FOV/aspect snapshot, so the culling cone always matches the
//! matrix the shaders see.

use crate::config::ProjectionConfig;
use crate::foundation::math::{constants, Mat4, Mat4Ext, Vec3};
use crate::render::shader_constants::PerFrameConstants;

/// Cached projection state
#[derive(Debug, Clone)]
pub struct ProjectionPlanner {
    z_near: f32,
    z_far: f32,
    fov: Option<f32>,
    viewport: (u32, u32),
    projection: Mat4,
    cone_cos_sq: f32,
}

impl ProjectionPlanner {
    /// Create a planner that has not seen any projection yet
    pub fn new(config: &ProjectionConfig) -> Self {
        Self {
            z_near: config.z_near,
            z_far: config.z_far,
            fov: None,
            viewport: (0, 0),
            projection: Mat4::identity(),
            cone_cos_sq: 0.0,
        }
    }

    /// Recompute the projection if FOV or viewport differ from the cached values
    ///
    /// `fov` is the host's horizontal field of view in degrees. Writes the
    /// matrix and resolution into `constants` and returns `true` when they
    /// changed, in which case the caller marks the buffer dirty.
    pub fn check_projection_change(
        &mut self,
        fov: f32,
        viewport_x: u32,
        viewport_y: u32,
        aspect: f32,
        constants: &mut PerFrameConstants,
    ) -> bool {
        if self.fov == Some(fov) && self.viewport == (viewport_x, viewport_y) {
            return false;
        }
        self.fov = Some(fov);
        self.viewport = (viewport_x, viewport_y);

        let fov_y = fov / aspect * constants::DEG_TO_RAD;
        let mut projection = Mat4::perspective_fov_lh(fov_y, aspect, self.z_near, self.z_far);
        projection[(1, 1)] = -projection[(1, 1)];
        self.projection = projection;

        // Cone through the frustum corner on the distant plane
        let distance = self.z_near.max(self.z_far);
        let half_width = distance * (fov * constants::HALF_DEG_TO_RAD).tan();
        let corner = Vec3::new(half_width, half_width / aspect, distance);
        let cos = distance / corner.norm();
        self.cone_cos_sq = cos * cos;

        let (w, h) = (viewport_x as f32, viewport_y as f32);
        constants.resolution = [w, h, recip_or_zero(w), recip_or_zero(h)];
        constants.projection = projection.to_gpu_rows();

        log::debug!(
            "Projection rebuilt: fov {fov} viewport {viewport_x}x{viewport_y} cone cos² {:.5}",
            self.cone_cos_sq
        );
        true
    }

    /// Squared cosine of the view cone half-angle
    pub fn cone_cos_sq(&self) -> f32 {
        self.cone_cos_sq
    }

    /// Current projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Forget the cached FOV so the next check recomputes
    pub fn invalidate(&mut self) {
        self.fov = None;
    }
}

fn recip_or_zero(value: f32) -> f32 {
    if value > 0.0 {
        1.0 / value
    } else {
        0.0
    }
}
