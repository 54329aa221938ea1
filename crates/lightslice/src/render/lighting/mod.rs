//! Lighting system
//!
//! Light source model, color encoding and the depth-sliced light clustering.

pub mod light_source;
pub mod color;
pub mod clustering;

pub use light_source::{DirectColor, LightEffect, LightKind, LightSource, LightTag, LightType};
pub use color::hsv_to_rgb;
pub use clustering::{ClusterStats, LightClusterBuilder, PackedLightRecord, Rejection, SliceIndexTable};
