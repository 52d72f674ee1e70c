pub mod descriptor_allocator;

use std::sync::Arc;

use ash::vk;
use color_eyre::Result;
use gpu_allocator::MemoryLocation;

use crate::renderer::contexts::device_ctx::RenderDevice;
use crate::renderer::contexts::resource_ctx::descriptor_allocator::{
    DescriptorAllocator, DescriptorBlockPool, DescriptorHandle, DescriptorKind,
};
use crate::renderer::resources::buffer::Buffer;

/// Indices of the two triangles covering a full-screen quad whose corners the
/// vertex shader synthesizes from the vertex index.
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

/// Index count of one full-screen quad draw.
pub const QUAD_INDEX_COUNT: u32 = QUAD_INDICES.len() as u32;

/// Responsibilities:
/// - Own the descriptor block pool and the per-category bump allocators
/// - Own renderer-wide static geometry (the full-screen quad indices)
///
/// Every subsystem that needs shader-visible binding slots allocates through
/// this context; block creation is the only cross-thread synchronization
/// point.
pub struct RenderResourceContext {
    pub block_pool: Arc<DescriptorBlockPool<RenderDevice>>,
    pub resource_descriptors: DescriptorAllocator<RenderDevice>,
    pub sampler_descriptors: DescriptorAllocator<RenderDevice>,
    pub quad_index_buffer: Buffer,
}

impl RenderResourceContext {
    pub fn new(device: &RenderDevice) -> Result<Self> {
        let block_pool = Arc::new(DescriptorBlockPool::new());
        let resource_descriptors =
            DescriptorAllocator::new(DescriptorKind::Resource, block_pool.clone());
        let sampler_descriptors =
            DescriptorAllocator::new(DescriptorKind::Sampler, block_pool.clone());

        let mut quad_index_buffer = device.create_buffer(
            std::mem::size_of_val(&QUAD_INDICES) as u64,
            vk::BufferUsageFlags::INDEX_BUFFER,
            MemoryLocation::CpuToGpu,
            "Full-screen quad indices",
        )?;
        quad_index_buffer.write(bytemuck::cast_slice(&QUAD_INDICES), 0)?;

        Ok(Self {
            block_pool,
            resource_descriptors,
            sampler_descriptors,
            quad_index_buffer,
        })
    }

    /// Allocate `count` binding slots from the given category's arena.
    pub fn allocate_descriptors(
        &mut self,
        device: &RenderDevice,
        kind: DescriptorKind,
        count: u32,
    ) -> Result<DescriptorHandle> {
        let allocator = match kind {
            DescriptorKind::Resource => &mut self.resource_descriptors,
            DescriptorKind::Sampler => &mut self.sampler_descriptors,
        };
        allocator.allocate(device, count)
    }
}
