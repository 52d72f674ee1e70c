use std::sync::{Arc, Mutex};

use ash::vk;
use color_eyre::Result;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;

use crate::renderer::contexts::resource_ctx::descriptor_allocator::{
    DescriptorBlockDevice, DescriptorKind,
};
use crate::renderer::resources::buffer::Buffer;
use crate::renderer::resources::image::Image;

/// Byte strides of the shader-visible descriptor categories, queried from the
/// device once at startup. The slot strides are padded to the binding-offset
/// alignment so any slot can be bound directly; the exact per-type sizes are
/// what descriptor writes produce.
#[derive(Copy, Clone, Debug)]
struct DescriptorSizes {
    resource: u64,
    sampler: u64,
    uniform_buffer_exact: usize,
    combined_image_sampler_exact: usize,
}

/// Wrapper around the host engine's Vulkan device.
///
/// Responsibilities:
/// - Hold the logical device and its memory allocator
/// - Create images, buffers, and descriptor blocks for the renderer
/// - Cache the device properties descriptor arithmetic depends on
///
/// Instance, physical-device selection, queues, and the swap chain stay with
/// the host; this type only borrows what recording and resource creation
/// need.
pub struct RenderDevice {
    pub logical: Arc<ash::Device>,
    pub physical: vk::PhysicalDevice,
    pub descriptor_buffer: ash::ext::descriptor_buffer::Device,

    memory_allocator: Arc<Mutex<Allocator>>,
    descriptor_sizes: DescriptorSizes,
    min_uniform_offset_alignment: u64,
}

impl RenderDevice {
    pub fn new(
        instance: &ash::Instance,
        physical: vk::PhysicalDevice,
        logical: Arc<ash::Device>,
    ) -> Result<Self> {
        let mut descriptor_buffer_props =
            vk::PhysicalDeviceDescriptorBufferPropertiesEXT::default();
        let mut props = vk::PhysicalDeviceProperties2::default()
            .push_next(&mut descriptor_buffer_props);
        unsafe {
            instance.get_physical_device_properties2(physical, &mut props);
        }
        let limits = props.properties.limits;

        let offset_alignment = descriptor_buffer_props.descriptor_buffer_offset_alignment;
        let descriptor_sizes = DescriptorSizes {
            resource: align_up(
                (descriptor_buffer_props.uniform_buffer_descriptor_size as u64)
                    .max(descriptor_buffer_props.combined_image_sampler_descriptor_size as u64),
                offset_alignment,
            ),
            sampler: align_up(
                descriptor_buffer_props.sampler_descriptor_size as u64,
                offset_alignment,
            ),
            uniform_buffer_exact: descriptor_buffer_props.uniform_buffer_descriptor_size,
            combined_image_sampler_exact: descriptor_buffer_props
                .combined_image_sampler_descriptor_size,
        };
        log::info!(
            "Descriptor slot strides: resource {}B, sampler {}B (alignment {}B)",
            descriptor_sizes.resource,
            descriptor_sizes.sampler,
            offset_alignment,
        );

        let memory_allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: (*logical).clone(),
            physical_device: physical,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        })?;

        let descriptor_buffer = ash::ext::descriptor_buffer::Device::new(instance, &logical);

        Ok(Self {
            logical,
            physical,
            descriptor_buffer,
            memory_allocator: Arc::new(Mutex::new(memory_allocator)),
            descriptor_sizes,
            min_uniform_offset_alignment: limits.min_uniform_buffer_offset_alignment,
        })
    }

    pub fn min_uniform_offset_alignment(&self) -> u64 {
        self.min_uniform_offset_alignment
    }

    /// Exact byte size of one uniform-buffer descriptor.
    pub fn uniform_buffer_descriptor_size(&self) -> usize {
        self.descriptor_sizes.uniform_buffer_exact
    }

    /// Exact byte size of one combined-image-sampler descriptor.
    pub fn combined_image_sampler_descriptor_size(&self) -> usize {
        self.descriptor_sizes.combined_image_sampler_exact
    }

    pub fn create_render_target(
        &self,
        width: u32,
        height: u32,
        format: vk::Format,
        name: &str,
    ) -> Result<Image> {
        Image::new_render_target(
            width,
            height,
            format,
            name,
            self.memory_allocator.clone(),
            self.logical.clone(),
        )
    }

    pub fn create_buffer(
        &self,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
    ) -> Result<Buffer> {
        Buffer::new(
            size,
            usage,
            location,
            name,
            self.memory_allocator.clone(),
            self.logical.clone(),
        )
    }
}

/// One fixed-capacity run of shader-visible descriptor slots: a host-visible,
/// device-addressable buffer the descriptor arena bumps through.
pub struct DescriptorBlock {
    buffer: Buffer,
    base_address: vk::DeviceAddress,
    usage: vk::BufferUsageFlags,
}

impl DescriptorBlock {
    pub fn base_address(&self) -> vk::DeviceAddress {
        self.base_address
    }

    /// Usage the block's buffer was created with, as required by the
    /// descriptor-buffer binding info.
    pub fn buffer_usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    /// Copy raw descriptor bytes into the block at `offset`.
    ///
    /// Slot ranges are handed out by the arena exactly once, so writes behind
    /// a shared reference cannot alias.
    pub fn write(&self, offset: u64, data: &[u8]) {
        assert!(
            offset + data.len() as u64 <= self.buffer.size,
            "descriptor write past the end of the block"
        );
        let base = self
            .buffer
            .mapped_ptr()
            .expect("descriptor blocks are host-visible");
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), base.add(offset as usize), data.len());
        }
    }
}

impl DescriptorBlockDevice for RenderDevice {
    type Block = DescriptorBlock;

    fn descriptor_size(&self, kind: DescriptorKind) -> u64 {
        match kind {
            DescriptorKind::Resource => self.descriptor_sizes.resource,
            DescriptorKind::Sampler => self.descriptor_sizes.sampler,
        }
    }

    fn create_block(&self, kind: DescriptorKind, capacity: u32) -> Result<Self::Block> {
        let usage = match kind {
            DescriptorKind::Resource => vk::BufferUsageFlags::RESOURCE_DESCRIPTOR_BUFFER_EXT,
            DescriptorKind::Sampler => vk::BufferUsageFlags::SAMPLER_DESCRIPTOR_BUFFER_EXT,
        } | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;

        let size = u64::from(capacity) * self.descriptor_size(kind);
        let buffer = self.create_buffer(
            size,
            usage,
            MemoryLocation::CpuToGpu,
            "Descriptor block",
        )?;
        let base_address = buffer.device_address();

        Ok(DescriptorBlock {
            buffer,
            base_address,
            usage,
        })
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}
