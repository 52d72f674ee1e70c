use ash::vk;
use color_eyre::Result;
use gpu_allocator::MemoryLocation;

use crate::renderer::contexts::device_ctx::RenderDevice;
use crate::renderer::resources::buffer::Buffer;

/// Per-frame constant arena: a host-visible buffer bump-allocated once per
/// draw and reset by the host when the frame's commands have retired.
pub struct LinearBuffer {
    buffer: Buffer,
    base_address: vk::DeviceAddress,
    head: u64,
    alignment: u64,
}

impl LinearBuffer {
    pub fn new(device: &RenderDevice, size: u64, name: &str) -> Result<Self> {
        let buffer = device.create_buffer(
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            MemoryLocation::CpuToGpu,
            name,
        )?;
        let base_address = buffer.device_address();
        let alignment = device.min_uniform_offset_alignment().max(16);
        Ok(Self {
            buffer,
            base_address,
            head: 0,
            alignment,
        })
    }

    /// Copy `data` into the arena and return the device address and length of
    /// the copy. Exhausting the arena is a sizing bug, not a runtime
    /// condition.
    pub fn push(&mut self, data: &[u8]) -> Result<(vk::DeviceAddress, u64)> {
        let offset = self.head.next_multiple_of(self.alignment);
        assert!(
            offset + data.len() as u64 <= self.buffer.size,
            "constant arena exhausted: {} bytes requested at offset {offset} of {}",
            data.len(),
            self.buffer.size,
        );
        self.buffer.write(data, offset as usize)?;
        self.head = offset + data.len() as u64;
        Ok((self.base_address + offset, data.len() as u64))
    }

    /// Rewind the arena. The previous contents must no longer be referenced
    /// by any in-flight command buffer.
    pub fn reset(&mut self) {
        self.head = 0;
    }
}
