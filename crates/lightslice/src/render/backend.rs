//! # Render Device Abstraction
//!
//! The narrow slice of a Direct3D11-class device that the lighting core talks
//! to: immutable texture arrays with an array view, pixel-shader resource
//! slots, and constant buffers.
//!
//! ## Design Goals
//!
//! - **API Agnostic**: the core never names a graphics API; a native backend
//!   and the headless recorder implement the same trait
//! - **Explicit Dependency**: the device is passed into every call that needs
//!   it, nothing reaches for a global device
//! - **Reference-Counted Resources**: handle types are cheap `Clone`s over
//!   shared GPU objects, released when the last clone is dropped

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Texel formats the core creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single 8-bit unsigned normalized channel
    R8Unorm,
}

impl TextureFormat {
    /// Bytes per texel
    pub const fn bytes_per_texel(self) -> usize {
        match self {
            Self::R8Unorm => 1,
        }
    }
}

/// Description of an immutable 2D texture array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureArrayDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Number of array slices
    pub layers: u32,
    /// Mip levels per slice
    pub mip_levels: u32,
    /// Texel format
    pub format: TextureFormat,
}

impl TextureArrayDesc {
    /// One-mip R8 array, the only shape the occlusion cache creates
    pub const fn r8(width: u32, height: u32, layers: u32) -> Self {
        Self {
            width,
            height,
            layers,
            mip_levels: 1,
            format: TextureFormat::R8Unorm,
        }
    }

    /// Size in bytes of the initial data for the top mip of every slice
    pub const fn data_len(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.layers as usize
            * self.format.bytes_per_texel()
    }
}

/// Device errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Texture or view allocation failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Initial data does not match the described resource
    #[error("Initial data is {actual} bytes, resource needs {expected}")]
    DataSizeMismatch {
        /// Bytes required by the description
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// A handle from another device (or a released resource) was used
    #[error("Unknown resource handle")]
    UnknownResource,

    /// The device was removed or reset; fatal to the frame
    #[error("Device lost")]
    DeviceLost,
}

impl DeviceError {
    /// Whether the frame has to be abandoned
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceLost)
    }
}

/// Graphics device seen by the lighting core
///
/// Handle types are reference counted: cloning one shares the GPU object,
/// and the object is released once every clone (including the ones the
/// device keeps for bound slots) is gone.
pub trait RenderDevice {
    /// Shared handle to a texture array
    type Texture: Clone + std::fmt::Debug;
    /// Shared handle to an array shader-resource view
    type TextureView: Clone + std::fmt::Debug;
    /// Shared handle to a constant buffer
    type Buffer: Clone + std::fmt::Debug;

    /// Create an immutable texture array from tightly packed initial data
    ///
    /// `data` holds every slice's top mip back to back, row-major.
    fn create_texture_array(
        &mut self,
        desc: &TextureArrayDesc,
        data: &[u8],
    ) -> DeviceResult<Self::Texture>;

    /// Create a view covering every slice of `texture`
    fn create_array_view(&mut self, texture: &Self::Texture) -> DeviceResult<Self::TextureView>;

    /// Bind a view to pixel-shader resource `slot`, or clear it with `None`
    fn bind_pixel_resource(&mut self, slot: u32, view: Option<&Self::TextureView>);

    /// Create a dynamic constant buffer of `size` bytes
    fn create_constant_buffer(&mut self, size: usize) -> DeviceResult<Self::Buffer>;

    /// Replace the whole contents of a constant buffer
    fn update_constant_buffer(&mut self, buffer: &Self::Buffer, bytes: &[u8]) -> DeviceResult<()>;

    /// Bind a constant buffer to vertex- and pixel-shader `slot`
    fn bind_constant_buffer(&mut self, slot: u32, buffer: &Self::Buffer);
}
