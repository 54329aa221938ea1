//! Shader-visible constant-buffer layouts
//!
//! These structs are the wire format toward the GPU: field order, sizes and
//! 16-byte alignment must match the shader declarations bit for bit.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::utils::align_up;

/// Number of depth slices the view frustum is partitioned into
pub const SLICE_NUMBER: usize = 16;

/// Capacity of the packed light array, in vec4 slots
pub const MAX_LIGHTS_DATA_SIZE: usize = 1024;

/// Capacity of the flattened per-slice light-index array
pub const MAX_SLICE_DATA_SIZE: usize = 1024;

/// Slice table entries (`SLICE_NUMBER + 1`) rounded up to whole 16-byte rows
pub const SLICE_TABLE_LEN: usize = align_up(SLICE_NUMBER + 1, 4);

/// Per-frame constants: projection, view and the clustered lights
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PerFrameConstants {
    /// Viewport width, height, 1/width, 1/height (16 bytes)
    pub resolution: [f32; 4],
    /// Projection matrix, row-vector layout (64 bytes)
    pub projection: [[f32; 4]; 4],
    /// Transposed world-to-view matrix (64 bytes)
    pub view: [[f32; 4]; 4],
    /// View-space sun direction, W = 0 (16 bytes)
    pub light_dir: [f32; 4],
    /// Prefix-sum start offsets per slice, `SLICE_NUMBER + 1` used (80 bytes)
    pub slice_table: [u32; SLICE_TABLE_LEN],
    /// Concatenated light indices of all slices (4096 bytes)
    pub light_indices: [u32; MAX_SLICE_DATA_SIZE],
    /// Packed light records, 2 or 3 slots each (16384 bytes)
    pub lights: [[f32; 4]; MAX_LIGHTS_DATA_SIZE],
}

impl Default for PerFrameConstants {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Per-tick constants: monotonically increasing time for animated effects
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PerTickConstants {
    /// Seconds since the driver started
    pub elapsed: f32,
    /// Padding for alignment
    pub _padding: [f32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn test_per_frame_layout_is_bit_exact() {
        assert_eq!(offset_of!(PerFrameConstants, resolution), 0);
        assert_eq!(offset_of!(PerFrameConstants, projection), 16);
        assert_eq!(offset_of!(PerFrameConstants, view), 80);
        assert_eq!(offset_of!(PerFrameConstants, light_dir), 144);
        assert_eq!(offset_of!(PerFrameConstants, slice_table), 160);
        assert_eq!(offset_of!(PerFrameConstants, light_indices), 240);
        assert_eq!(offset_of!(PerFrameConstants, lights), 240 + 4 * MAX_SLICE_DATA_SIZE);
        assert_eq!(size_of::<PerFrameConstants>() % 16, 0);
        assert_eq!(align_of::<PerFrameConstants>(), 16);
    }

    #[test]
    fn test_slice_table_padding() {
        assert_eq!(SLICE_TABLE_LEN, 20);
        assert_eq!((SLICE_TABLE_LEN * 4) % 16, 0);
    }

    #[test]
    fn test_per_tick_is_one_row() {
        assert_eq!(size_of::<PerTickConstants>(), 16);
    }
}
