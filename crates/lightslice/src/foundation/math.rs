//! Math utilities and types
//!
//! Provides the nalgebra aliases used across the crate, the host engine's
//! coordinate frame, and the Direct3D-style projection helpers.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Half-degree to radians, used when halving a full FOV angle
    pub const HALF_DEG_TO_RAD: f32 = PI / 360.0;
}

/// Math utility functions
pub mod utils {
    /// Round `value` up to the next multiple of `align`
    pub const fn align_up(value: usize, align: usize) -> usize {
        (value + align - 1) / align * align
    }
}

/// Camera coordinate frame as delivered by the host engine
///
/// Origin plus three orthonormal axes. Points are taken into view space by
/// subtracting the origin and projecting onto each axis, so `z` is the
/// distance along the view direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewFrame {
    /// Camera position in world space
    pub origin: Vec3,
    /// View-space X (right) in world space
    pub x_axis: Vec3,
    /// View-space Y (down in the legacy convention) in world space
    pub y_axis: Vec3,
    /// View-space Z (forward) in world space
    pub z_axis: Vec3,
}

impl Default for ViewFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl ViewFrame {
    /// Frame at the world origin looking down +Z
    pub fn identity() -> Self {
        Self {
            origin: Vec3::zeros(),
            x_axis: Vec3::x(),
            y_axis: Vec3::y(),
            z_axis: Vec3::z(),
        }
    }

    /// Frame at `origin` with identity axes
    pub fn at(origin: Vec3) -> Self {
        Self {
            origin,
            ..Self::identity()
        }
    }

    /// Transform a world-space point into view space
    pub fn transform_point(&self, point: &Vec3) -> Vec3 {
        let d = point - self.origin;
        Vec3::new(d.dot(&self.x_axis), d.dot(&self.y_axis), d.dot(&self.z_axis))
    }

    /// Rotate a world-space direction into view space
    pub fn transform_vector(&self, vector: &Vec3) -> Vec3 {
        Vec3::new(
            vector.dot(&self.x_axis),
            vector.dot(&self.y_axis),
            vector.dot(&self.z_axis),
        )
    }

    /// World-to-view matrix (column-vector convention)
    pub fn view_matrix(&self) -> Mat4 {
        let (x, y, z) = (&self.x_axis, &self.y_axis, &self.z_axis);
        Mat4::new(
            x.x, x.y, x.z, -x.dot(&self.origin),
            y.x, y.y, y.z, -y.dot(&self.origin),
            z.x, z.y, z.z, -z.dot(&self.origin),
            0.0, 0.0, 0.0, 1.0,
        )
    }
}

/// Extension trait for Mat4 with Direct3D conventions
pub trait Mat4Ext {
    /// Left-handed perspective projection, laid out for row vectors
    ///
    /// Element `(r, c)` matches row `r`, column `c` of the Direct3D math
    /// library's `PerspectiveFovLH`. `near` may exceed `far` for a reversed
    /// depth range.
    fn perspective_fov_lh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Row-major copy for constant-buffer upload
    fn to_gpu_rows(&self) -> [[f32; 4]; 4];
}

impl Mat4Ext for Mat4 {
    fn perspective_fov_lh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let height = 1.0 / (fov_y * 0.5).tan();
        let width = height / aspect;
        let range = far / (far - near);

        let mut result = Mat4::zeros();
        result[(0, 0)] = width;
        result[(1, 1)] = height;
        result[(2, 2)] = range;
        result[(2, 3)] = 1.0;
        result[(3, 2)] = -range * near;
        result
    }

    fn to_gpu_rows(&self) -> [[f32; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = self[(r, c)];
            }
        }
        rows
    }
}
