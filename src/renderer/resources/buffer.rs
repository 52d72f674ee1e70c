use std::sync::{Arc, Mutex};

use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::eyre::Result;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;

pub struct Buffer {
    pub buffer: vk::Buffer,
    pub size: u64,

    allocation: Option<Allocation>,
    memory_allocator: Arc<Mutex<Allocator>>,
    device: Arc<ash::Device>,
}

impl Buffer {
    pub fn new(
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
        memory_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let buffer = {
            let info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            unsafe { device.create_buffer(&info, None)? }
        };

        let reqs = unsafe { device.get_buffer_memory_requirements(buffer) };
        let allocation = memory_allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))?
            .allocate(&AllocationCreateDesc {
                name,
                requirements: reqs,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?;
        unsafe {
            device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        Ok(Self {
            buffer,
            size,
            allocation: Some(allocation),
            memory_allocator,
            device,
        })
    }

    /// Copy `data` into the mapped allocation starting at `offset` bytes.
    pub fn write(&mut self, data: &[u8], offset: usize) -> Result<()> {
        let allocation = self
            .allocation
            .as_mut()
            .expect("allocation freed before drop");
        let mapped = allocation
            .mapped_slice_mut()
            .ok_or_else(|| eyre!("Cannot write to buffer that is not host-visible"))?;
        let end = offset
            .checked_add(data.len())
            .ok_or_else(|| eyre!("Buffer write range overflows"))?;
        if end > mapped.len() {
            return Err(eyre!(
                "Buffer write of {} bytes at offset {} exceeds size {}",
                data.len(),
                offset,
                mapped.len()
            ));
        }
        mapped[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Base pointer of the mapped allocation, if host-visible.
    pub fn mapped_ptr(&self) -> Option<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|a| a.mapped_ptr())
            .map(|p| p.as_ptr().cast())
    }

    /// Device address of the buffer. Requires
    /// `vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS` at creation.
    pub fn device_address(&self) -> vk::DeviceAddress {
        let info = vk::BufferDeviceAddressInfo::default().buffer(self.buffer);
        unsafe { self.device.get_buffer_device_address(&info) }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            self.memory_allocator
                .lock()
                .expect("Failed to acquire lock for memory allocator")
                .free(allocation)
                .expect("Failed to free buffer memory");
        }
    }
}
