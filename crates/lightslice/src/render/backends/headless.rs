//! Headless recording device
//!
//! Implements [`RenderDevice`] without a GPU. Texture data and constant
//! buffer contents are kept in memory and every bind is recorded, so tests
//! and the replay tool can inspect exactly what would reach the driver.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use slotmap::{new_key_type, SlotMap};

use crate::render::backend::{DeviceError, DeviceResult, RenderDevice, TextureArrayDesc};

new_key_type! {
    /// Key of a texture created by a [`HeadlessDevice`]
    pub struct TextureKey;
    /// Key of a view created by a [`HeadlessDevice`]
    pub struct ViewKey;
    /// Key of a constant buffer created by a [`HeadlessDevice`]
    pub struct BufferKey;
}

/// Texture array held in memory
#[derive(Debug)]
pub struct HeadlessTexture {
    /// Registry key
    pub key: TextureKey,
    /// Creation description
    pub desc: TextureArrayDesc,
    /// Initial data, every slice back to back
    pub data: Vec<u8>,
}

impl HeadlessTexture {
    /// Texels of array slice `layer`
    pub fn layer(&self, layer: u32) -> Option<&[u8]> {
        let len = self.desc.width as usize * self.desc.height as usize;
        let start = len * layer as usize;
        self.data.get(start..start + len)
    }
}

/// Array view over a [`HeadlessTexture`]
#[derive(Debug)]
pub struct HeadlessView {
    /// Registry key
    pub key: ViewKey,
    /// Viewed texture
    pub texture: Arc<HeadlessTexture>,
}

/// Constant buffer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessBuffer {
    /// Registry key
    pub key: BufferKey,
    /// Size in bytes
    pub size: usize,
}

/// One recorded device call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    /// A texture array was created
    CreateTexture(TextureKey),
    /// A pixel resource slot was bound (`None` clears it)
    BindPixelResource {
        /// Slot index
        slot: u32,
        /// Bound view
        view: Option<ViewKey>,
    },
    /// A constant buffer received new contents
    UpdateBuffer(BufferKey),
    /// A constant buffer was bound
    BindConstantBuffer {
        /// Slot index
        slot: u32,
        /// Bound buffer
        buffer: BufferKey,
    },
}

/// Device that records instead of rendering
#[derive(Default)]
pub struct HeadlessDevice {
    textures: SlotMap<TextureKey, Weak<HeadlessTexture>>,
    views: SlotMap<ViewKey, Weak<HeadlessView>>,
    buffers: SlotMap<BufferKey, Vec<u8>>,
    pixel_slots: HashMap<u32, Arc<HeadlessView>>,
    constant_slots: HashMap<u32, BufferKey>,
    calls: Vec<DeviceCall>,
    max_array_layers: Option<u32>,
    fail_texture_creation: bool,
    lost: bool,
}

impl HeadlessDevice {
    /// Create an empty device
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject texture arrays with more than `layers` slices
    pub fn with_max_array_layers(mut self, layers: u32) -> Self {
        self.max_array_layers = Some(layers);
        self
    }

    /// Make every following texture creation fail
    pub fn set_fail_texture_creation(&mut self, fail: bool) {
        self.fail_texture_creation = fail;
    }

    /// Simulate device removal; every following upload fails
    pub fn set_lost(&mut self, lost: bool) {
        self.lost = lost;
    }

    /// Recorded calls in issue order
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Forget recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of texture arrays ever created
    pub fn textures_created(&self) -> usize {
        self.textures.len()
    }

    /// Number of texture arrays still referenced by anyone
    pub fn live_textures(&self) -> usize {
        self.textures.values().filter(|t| t.strong_count() > 0).count()
    }

    /// View currently bound to pixel resource `slot`
    pub fn bound_pixel_resource(&self, slot: u32) -> Option<&Arc<HeadlessView>> {
        self.pixel_slots.get(&slot)
    }

    /// Buffer currently bound to constant slot `slot`
    pub fn bound_constant_buffer(&self, slot: u32) -> Option<BufferKey> {
        self.constant_slots.get(&slot).copied()
    }

    /// Last uploaded contents of a constant buffer
    pub fn buffer_contents(&self, buffer: &HeadlessBuffer) -> Option<&[u8]> {
        self.buffers.get(buffer.key).map(Vec::as_slice)
    }

    /// Number of recorded pixel resource binds
    pub fn pixel_bind_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::BindPixelResource { .. }))
            .count()
    }
}

impl RenderDevice for HeadlessDevice {
    type Texture = Arc<HeadlessTexture>;
    type TextureView = Arc<HeadlessView>;
    type Buffer = HeadlessBuffer;

    fn create_texture_array(
        &mut self,
        desc: &TextureArrayDesc,
        data: &[u8],
    ) -> DeviceResult<Self::Texture> {
        if self.lost {
            return Err(DeviceError::DeviceLost);
        }
        if self.fail_texture_creation {
            return Err(DeviceError::ResourceCreationFailed("texture creation disabled".to_string()));
        }
        if desc.width == 0 || desc.height == 0 || desc.layers == 0 {
            return Err(DeviceError::ResourceCreationFailed(format!(
                "empty texture array {}x{}x{}",
                desc.width, desc.height, desc.layers
            )));
        }
        if let Some(max) = self.max_array_layers {
            if desc.layers > max {
                return Err(DeviceError::ResourceCreationFailed(format!(
                    "{} array slices exceed the limit of {}",
                    desc.layers, max
                )));
            }
        }
        if data.len() != desc.data_len() {
            return Err(DeviceError::DataSizeMismatch {
                expected: desc.data_len(),
                actual: data.len(),
            });
        }

        let key = self.textures.insert(Weak::new());
        let texture = Arc::new(HeadlessTexture {
            key,
            desc: *desc,
            data: data.to_vec(),
        });
        self.textures[key] = Arc::downgrade(&texture);
        self.calls.push(DeviceCall::CreateTexture(key));
        log::trace!(
            "Headless texture {:?}: {}x{}x{}",
            key, desc.width, desc.height, desc.layers
        );
        Ok(texture)
    }

    fn create_array_view(&mut self, texture: &Self::Texture) -> DeviceResult<Self::TextureView> {
        if self.lost {
            return Err(DeviceError::DeviceLost);
        }
        if !self.textures.contains_key(texture.key) {
            return Err(DeviceError::UnknownResource);
        }
        let key = self.views.insert(Weak::new());
        let view = Arc::new(HeadlessView {
            key,
            texture: Arc::clone(texture),
        });
        self.views[key] = Arc::downgrade(&view);
        Ok(view)
    }

    fn bind_pixel_resource(&mut self, slot: u32, view: Option<&Self::TextureView>) {
        match view {
            Some(view) => {
                self.pixel_slots.insert(slot, Arc::clone(view));
            }
            None => {
                self.pixel_slots.remove(&slot);
            }
        }
        self.calls.push(DeviceCall::BindPixelResource {
            slot,
            view: view.map(|v| v.key),
        });
    }

    fn create_constant_buffer(&mut self, size: usize) -> DeviceResult<Self::Buffer> {
        if self.lost {
            return Err(DeviceError::DeviceLost);
        }
        if size == 0 || size % 16 != 0 {
            return Err(DeviceError::ResourceCreationFailed(format!(
                "constant buffer size {size} is not a non-zero multiple of 16"
            )));
        }
        let key = self.buffers.insert(vec![0; size]);
        Ok(HeadlessBuffer { key, size })
    }

    fn update_constant_buffer(&mut self, buffer: &Self::Buffer, bytes: &[u8]) -> DeviceResult<()> {
        if self.lost {
            return Err(DeviceError::DeviceLost);
        }
        let contents = self.buffers.get_mut(buffer.key).ok_or(DeviceError::UnknownResource)?;
        if bytes.len() != contents.len() {
            return Err(DeviceError::DataSizeMismatch {
                expected: contents.len(),
                actual: bytes.len(),
            });
        }
        contents.copy_from_slice(bytes);
        self.calls.push(DeviceCall::UpdateBuffer(buffer.key));
        Ok(())
    }

    fn bind_constant_buffer(&mut self, slot: u32, buffer: &Self::Buffer) {
        self.constant_slots.insert(slot, buffer.key);
        self.calls.push(DeviceCall::BindConstantBuffer {
            slot,
            buffer: buffer.key,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_released_when_last_handle_drops() {
        let mut device = HeadlessDevice::new();
        let texture = device
            .create_texture_array(&TextureArrayDesc::r8(2, 2, 1), &[0, 1, 2, 3])
            .unwrap();
        let view = device.create_array_view(&texture).unwrap();
        assert_eq!(device.live_textures(), 1);

        drop(texture);
        assert_eq!(device.live_textures(), 1, "view keeps the texture alive");

        drop(view);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.textures_created(), 1);
    }

    #[test]
    fn test_bound_slot_holds_a_reference() {
        let mut device = HeadlessDevice::new();
        let texture = device
            .create_texture_array(&TextureArrayDesc::r8(1, 1, 1), &[7])
            .unwrap();
        let view = device.create_array_view(&texture).unwrap();
        device.bind_pixel_resource(3, Some(&view));
        drop((texture, view));

        assert_eq!(device.live_textures(), 1);
        device.bind_pixel_resource(3, None);
        assert_eq!(device.live_textures(), 0);
        assert!(device.bound_pixel_resource(3).is_none());
    }

    #[test]
    fn test_rejects_mismatched_initial_data() {
        let mut device = HeadlessDevice::new();
        let result = device.create_texture_array(&TextureArrayDesc::r8(4, 4, 2), &[0; 16]);
        assert_eq!(
            result.unwrap_err(),
            DeviceError::DataSizeMismatch { expected: 32, actual: 16 }
        );
    }

    #[test]
    fn test_layer_limit_and_failure_injection() {
        let mut device = HeadlessDevice::new().with_max_array_layers(2);
        assert!(device.create_texture_array(&TextureArrayDesc::r8(1, 1, 3), &[0; 3]).is_err());

        device.set_fail_texture_creation(true);
        assert!(device.create_texture_array(&TextureArrayDesc::r8(1, 1, 1), &[0]).is_err());
        assert_eq!(device.textures_created(), 0);
    }

    #[test]
    fn test_constant_buffer_upload_and_loss() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_constant_buffer(16).unwrap();
        device.update_constant_buffer(&buffer, &[1; 16]).unwrap();
        assert_eq!(device.buffer_contents(&buffer).unwrap(), &[1; 16]);

        device.set_lost(true);
        assert_eq!(
            device.update_constant_buffer(&buffer, &[2; 16]),
            Err(DeviceError::DeviceLost)
        );
    }
}
