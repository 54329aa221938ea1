//! Typed constant buffers with a dirty flag
//!
//! Holds a CPU copy of a POD payload. Writers mark it dirty, and the frame
//! driver pushes the whole payload to the GPU once per frame at most.

use bytemuck::Pod;

use crate::render::backend::{DeviceResult, RenderDevice};

/// GPU upload slot for a `T` payload
pub struct ConstantBuffer<T: Pod, D: RenderDevice> {
    data: T,
    buffer: D::Buffer,
    slot: u32,
    dirty: bool,
}

impl<T: Pod, D: RenderDevice> ConstantBuffer<T, D> {
    /// Allocate the GPU buffer and start from `data`
    ///
    /// The buffer starts dirty so the first push uploads the initial payload.
    pub fn new(device: &mut D, slot: u32, data: T) -> DeviceResult<Self> {
        let buffer = device.create_constant_buffer(std::mem::size_of::<T>())?;
        Ok(Self {
            data,
            buffer,
            slot,
            dirty: true,
        })
    }

    /// Current CPU-side payload
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Mutable payload; call [`Self::mark_dirty`] after changing it
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Replace the payload and mark it dirty
    pub fn update(&mut self, data: T) {
        self.data = data;
        self.dirty = true;
    }

    /// Flag the payload for upload on the next push
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the GPU copy is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bind slot
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// GPU buffer handle
    pub fn buffer(&self) -> &D::Buffer {
        &self.buffer
    }

    /// Upload the payload if dirty; returns whether an upload happened
    pub fn push(&mut self, device: &mut D) -> DeviceResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        device.update_constant_buffer(&self.buffer, bytemuck::bytes_of(&self.data))?;
        self.dirty = false;
        Ok(true)
    }

    /// Bind the buffer to its slot
    pub fn bind(&self, device: &mut D) {
        device.bind_constant_buffer(self.slot, &self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::HeadlessDevice;
    use crate::render::shader_constants::PerTickConstants;

    #[test]
    fn test_push_only_when_dirty() {
        let mut device = HeadlessDevice::new();
        let mut cb: ConstantBuffer<PerTickConstants, HeadlessDevice> =
            ConstantBuffer::new(&mut device, 1, PerTickConstants::default()).unwrap();

        assert!(cb.push(&mut device).unwrap());
        assert!(!cb.push(&mut device).unwrap());

        cb.data_mut().elapsed = 2.5;
        assert!(!cb.is_dirty());
        cb.mark_dirty();
        assert!(cb.push(&mut device).unwrap());

        let bytes = device.buffer_contents(cb.buffer()).unwrap();
        assert_eq!(bytemuck::pod_read_unaligned::<PerTickConstants>(bytes).elapsed, 2.5);
    }

    #[test]
    fn test_bind_uses_slot() {
        let mut device = HeadlessDevice::new();
        let cb: ConstantBuffer<PerTickConstants, HeadlessDevice> =
            ConstantBuffer::new(&mut device, 4, PerTickConstants::default()).unwrap();
        cb.bind(&mut device);
        assert_eq!(device.bound_constant_buffer(4), Some(cb.buffer().key));
    }
}
