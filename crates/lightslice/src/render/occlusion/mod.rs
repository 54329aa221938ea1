//! Static occlusion maps
//!
//! Each lit surface of a level carries a lightmap id. For every light that
//! contributes to the surface the host stores a one-bit-per-texel plane
//! telling which texels the light reaches. The cache decodes those planes
//! into R8 texture arrays, one slice per contributing light.

pub mod bitplane;
pub mod cache;
pub mod slots;

use serde::{Deserialize, Serialize};

use crate::render::backend::DeviceError;

pub use cache::{OcclusionMap, OcclusionMapCache};
pub use slots::SlotBinding;

/// Lightmap id, the cache key
pub type LightmapId = u32;

/// Occlusion errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OcclusionError {
    /// The source has no lightmap with this id
    #[error("Unknown lightmap {0}")]
    UnknownLightmap(LightmapId),

    /// The contributor chain runs off the end of the light table
    #[error("Contributor chain starting at {start} is not terminated")]
    UnterminatedChain {
        /// First chain entry
        start: usize,
    },

    /// The bit buffer ends before the planes it should hold
    #[error("Bit data truncated: {needed} bytes needed, {available} available")]
    TruncatedBits {
        /// Bytes the planes need
        needed: usize,
        /// Bytes present
        available: usize,
    },

    /// Texture or view creation failed
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

impl OcclusionError {
    /// Whether the source data itself is inconsistent
    ///
    /// Such entries are treated as having no occlusion data.
    pub fn is_data_integrity(&self) -> bool {
        matches!(self, Self::UnterminatedChain { .. } | Self::TruncatedBits { .. })
    }
}

/// Per-lightmap metadata record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightMapInfo {
    /// Byte offset of the first plane in the bit buffer
    pub data_offset: usize,
    /// Start of the contributor chain in the light table; negative for none
    pub light_actors: i32,
    /// Plane width in texels
    pub u_clamp: u32,
    /// Plane height in texels
    pub v_clamp: u32,
    /// World units per texel along U
    pub u_scale: f32,
    /// World units per texel along V
    pub v_scale: f32,
}

impl LightMapInfo {
    /// Bytes between consecutive light planes
    pub const fn bytes_per_light(&self) -> usize {
        bitplane::bytes_per_plane(self.u_clamp, self.v_clamp)
    }

    /// Whether the plane has no texels
    pub fn is_degenerate(&self) -> bool {
        self.u_clamp == 0 || self.v_clamp == 0
    }
}

/// Host-side lightmap storage
pub trait LightmapSource {
    /// Metadata of lightmap `id`
    fn lightmap(&self, id: LightmapId) -> Option<&LightMapInfo>;

    /// Number of contributing lights in the chain of `info`
    fn contributor_count(&self, info: &LightMapInfo) -> Result<usize, OcclusionError>;

    /// Bit buffer every lightmap's planes live in
    fn light_bits(&self) -> &[u8];
}

/// In-memory lightmap storage with the host's layout
///
/// `lights` holds every lightmap's contributor chain back to back, each one
/// terminated by `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightmapModel {
    /// Metadata records indexed by lightmap id
    pub lightmaps: Vec<LightMapInfo>,
    /// Null-terminated contributor chains of light actor ids
    pub lights: Vec<Option<u32>>,
    /// Packed bit planes
    pub light_bits: Vec<u8>,
}

impl LightmapSource for LightmapModel {
    fn lightmap(&self, id: LightmapId) -> Option<&LightMapInfo> {
        self.lightmaps.get(id as usize)
    }

    fn contributor_count(&self, info: &LightMapInfo) -> Result<usize, OcclusionError> {
        let Ok(start) = usize::try_from(info.light_actors) else {
            return Ok(0);
        };
        let chain = self.lights.get(start..).unwrap_or_default();
        chain
            .iter()
            .position(Option::is_none)
            .ok_or(OcclusionError::UnterminatedChain { start })
    }

    fn light_bits(&self) -> &[u8] {
        &self.light_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(light_actors: i32) -> LightMapInfo {
        LightMapInfo {
            data_offset: 0,
            light_actors,
            u_clamp: 9,
            v_clamp: 3,
            u_scale: 1.0,
            v_scale: 1.0,
        }
    }

    #[test]
    fn test_contributor_chain_walk() {
        let model = LightmapModel {
            lights: vec![Some(4), Some(9), None, None, Some(1)],
            ..LightmapModel::default()
        };

        assert_eq!(model.contributor_count(&info(0)).unwrap(), 2);
        assert_eq!(model.contributor_count(&info(1)).unwrap(), 1);
        assert_eq!(model.contributor_count(&info(3)).unwrap(), 0);
        assert_eq!(model.contributor_count(&info(-1)).unwrap(), 0);
        assert_eq!(
            model.contributor_count(&info(4)).unwrap_err(),
            OcclusionError::UnterminatedChain { start: 4 }
        );
    }

    #[test]
    fn test_bytes_per_light() {
        assert_eq!(info(0).bytes_per_light(), 6);
    }
}
