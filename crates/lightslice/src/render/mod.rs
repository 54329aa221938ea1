//! # Rendering Core
//!
//! Everything the driver computes per frame before the host's draw calls:
//!
//! - **Projection**: matrix and culling cone, rebuilt on FOV/viewport change
//! - **Lighting**: light sources clustered into depth slices
//! - **Occlusion**: per-surface shadow bit planes decoded into texture arrays
//! - **Constant Buffers**: typed payloads uploaded once per frame when dirty
//!
//! The graphics API sits behind [`backend::RenderDevice`]; [`backends`]
//! holds the implementations shipped with the crate.

pub mod backend;
pub mod backends;
pub mod constant_buffer;
pub mod lighting;
pub mod occlusion;
pub mod projection;
pub mod shader_constants;

pub use backend::{DeviceError, DeviceResult, RenderDevice, TextureArrayDesc, TextureFormat};
pub use constant_buffer::ConstantBuffer;
pub use projection::ProjectionPlanner;
pub use shader_constants::{PerFrameConstants, PerTickConstants};
