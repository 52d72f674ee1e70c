use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;
use color_eyre::Result;
use smallvec::{smallvec, SmallVec};

use crate::renderer::contexts::device_ctx::{DescriptorBlock, RenderDevice};
use crate::renderer::contexts::frame_ctx::linear_buffer::LinearBuffer;
use crate::renderer::contexts::frame_ctx::RecordContext;
use crate::renderer::contexts::pipeline_ctx::{
    RenderPipelineContext, SamplerFilter, StageConfig, CONSTANTS_SET, TEXTURE_SET_BASE,
    TEXTURE_SLOTS,
};
use crate::renderer::contexts::resource_ctx::descriptor_allocator::DescriptorHandle;
use crate::renderer::contexts::resource_ctx::RenderResourceContext;

struct PendingTarget {
    view: vk::ImageView,
    extent: vk::Extent2D,
}

struct PendingTexture {
    view: vk::ImageView,
    sampler: vk::Sampler,
}

/// Records full-screen passes into a host-supplied command buffer.
///
/// Responsibilities:
/// - Stage pipeline/target/texture/constant bindings and flush them at draw
/// - Allocate shader-visible descriptor slots from the arena per dirty slot
/// - Track the layout of images rendered to and insert the write-to-read
///   barrier when one is later bound as an input
///
/// Recording is single-threaded; one context records one frame's passes in
/// declared order.
pub struct GraphicsContext<'a> {
    device: &'a RenderDevice,
    resources: &'a mut RenderResourceContext,
    pipelines: &'a RenderPipelineContext,
    constants: &'a mut LinearBuffer,
    cmd: vk::CommandBuffer,

    target: Option<PendingTarget>,
    bound_config: Option<StageConfig>,
    dirty_constants: Option<(vk::DeviceAddress, u64)>,
    dirty_textures: [Option<PendingTexture>; TEXTURE_SLOTS as usize],
    target_layouts: HashMap<vk::Image, vk::ImageLayout>,
    index_buffer_bound: bool,
}

impl<'a> GraphicsContext<'a> {
    pub fn new(
        device: &'a RenderDevice,
        resources: &'a mut RenderResourceContext,
        pipelines: &'a RenderPipelineContext,
        constants: &'a mut LinearBuffer,
        cmd: vk::CommandBuffer,
    ) -> Self {
        Self {
            device,
            resources,
            pipelines,
            constants,
            cmd,
            target: None,
            bound_config: None,
            dirty_constants: None,
            dirty_textures: [None, None, None],
            target_layouts: HashMap::new(),
            index_buffer_bound: false,
        }
    }

    /// Leave every target written this frame in a shader-readable layout for
    /// the host's composite pass. Call once after the last draw.
    pub fn finish(&mut self) {
        let written: SmallVec<[vk::Image; 8]> = self
            .target_layouts
            .iter()
            .filter(|(_, layout)| **layout == vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .map(|(image, _)| *image)
            .collect();
        for image in written {
            self.transition_image(
                image,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
            self.target_layouts
                .insert(image, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        }
    }

    fn transition_image(
        &mut self,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) {
        if old_layout == new_layout {
            return;
        }
        let barriers = [vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .dst_access_mask(vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ)
            .old_layout(old_layout)
            .new_layout(new_layout)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image(image)];
        let dep_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe {
            self.device.logical.cmd_pipeline_barrier2(self.cmd, &dep_info);
        }
    }

    fn write_descriptor(
        &mut self,
        get_info: &vk::DescriptorGetInfoEXT,
        size: usize,
        handle: DescriptorHandle,
    ) {
        let mut data: SmallVec<[u8; 64]> = smallvec![0u8; size];
        unsafe {
            self.device
                .descriptor_buffer
                .get_descriptor(get_info, &mut data);
        }
        let block = self
            .resources
            .block_pool
            .block(handle.block_index())
            .expect("handle references a block in the shared pool");
        block.write(handle.byte_offset(), &data);
    }

    /// Turn every dirty binding into a freshly allocated descriptor slot and
    /// point the pipeline layout's sets at them.
    fn flush_bindings(&mut self, layout: vk::PipelineLayout) -> Result<()> {
        let mut flushed: SmallVec<[(u32, DescriptorHandle); 4]> = SmallVec::new();

        if let Some((address, range)) = self.dirty_constants.take() {
            let handle = self.resources.resource_descriptors.allocate(self.device, 1)?;
            let address_info = vk::DescriptorAddressInfoEXT::default()
                .address(address)
                .range(range);
            let get_info = vk::DescriptorGetInfoEXT::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .data(vk::DescriptorDataEXT {
                    p_uniform_buffer: &address_info,
                });
            self.write_descriptor(&get_info, self.device.uniform_buffer_descriptor_size(), handle);
            flushed.push((CONSTANTS_SET, handle));
        }

        for slot in 0..TEXTURE_SLOTS as usize {
            let Some(texture) = self.dirty_textures[slot].take() else {
                continue;
            };
            let handle = self.resources.resource_descriptors.allocate(self.device, 1)?;
            let image_info = vk::DescriptorImageInfo::default()
                .sampler(texture.sampler)
                .image_view(texture.view)
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            let get_info = vk::DescriptorGetInfoEXT::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .data(vk::DescriptorDataEXT {
                    p_combined_image_sampler: &image_info,
                });
            self.write_descriptor(
                &get_info,
                self.device.combined_image_sampler_descriptor_size(),
                handle,
            );
            flushed.push((TEXTURE_SET_BASE + slot as u32, handle));
        }

        if flushed.is_empty() {
            return Ok(());
        }

        // Bind the owning blocks, then point each flushed set at its slot.
        // Binding invalidates previously set offsets, but every slot a stage
        // reads is re-staged before its draw.
        let mut blocks: SmallVec<[(u32, Arc<DescriptorBlock>); 4]> = SmallVec::new();
        for (_, handle) in &flushed {
            if !blocks.iter().any(|(index, _)| *index == handle.block_index()) {
                let block = self
                    .resources
                    .block_pool
                    .block(handle.block_index())
                    .expect("handle references a block in the shared pool");
                blocks.push((handle.block_index(), block));
            }
        }
        let binding_infos: SmallVec<[vk::DescriptorBufferBindingInfoEXT; 4]> = blocks
            .iter()
            .map(|(_, block)| {
                vk::DescriptorBufferBindingInfoEXT::default()
                    .address(block.base_address())
                    .usage(block.buffer_usage())
            })
            .collect();
        unsafe {
            self.device
                .descriptor_buffer
                .cmd_bind_descriptor_buffers(self.cmd, &binding_infos);
        }
        for (set, handle) in &flushed {
            let buffer_index = blocks
                .iter()
                .position(|(index, _)| *index == handle.block_index())
                .expect("block was collected above") as u32;
            unsafe {
                self.device.descriptor_buffer.cmd_set_descriptor_buffer_offsets(
                    self.cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    *set,
                    &[buffer_index],
                    &[handle.byte_offset()],
                );
            }
        }

        Ok(())
    }
}

impl RecordContext for GraphicsContext<'_> {
    fn set_viewport(&mut self, width: u32, height: u32) {
        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width, height },
        }];
        unsafe {
            self.device.logical.cmd_set_viewport(self.cmd, 0, &viewports);
            self.device.logical.cmd_set_scissor(self.cmd, 0, &scissors);
        }
    }

    fn set_render_target(&mut self, image: vk::Image, view: vk::ImageView, extent: vk::Extent2D) {
        let old_layout = self
            .target_layouts
            .get(&image)
            .copied()
            .unwrap_or(vk::ImageLayout::UNDEFINED);
        self.transition_image(image, old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        self.target_layouts
            .insert(image, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        self.target = Some(PendingTarget { view, extent });
    }

    fn set_pipeline(&mut self, config: &StageConfig) {
        unsafe {
            self.device.logical.cmd_bind_pipeline(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                config.pipeline,
            );
        }
        self.bound_config = Some(*config);
    }

    fn bind_texture(
        &mut self,
        slot: u32,
        image: vk::Image,
        view: vk::ImageView,
        filter: SamplerFilter,
    ) {
        assert!(slot < TEXTURE_SLOTS, "texture slot {slot} out of range");
        // Hazard: a target written earlier this frame becomes readable here.
        // Images this context never rendered to are the host's problem and
        // are assumed shader-readable already.
        if let Some(layout) = self.target_layouts.get(&image).copied() {
            if layout == vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL {
                self.transition_image(
                    image,
                    layout,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                );
                self.target_layouts
                    .insert(image, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            }
        }
        self.dirty_textures[slot as usize] = Some(PendingTexture {
            view,
            sampler: self.pipelines.sampler(filter),
        });
    }

    fn upload_constants(&mut self, data: &[u8]) -> Result<()> {
        self.dirty_constants = Some(self.constants.push(data)?);
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> Result<()> {
        let config = self
            .bound_config
            .expect("draw recorded without a bound pipeline");
        let target = self
            .target
            .as_ref()
            .expect("draw recorded without a render target");
        let target_view = target.view;
        let target_extent = target.extent;

        self.flush_bindings(config.layout)?;

        if !self.index_buffer_bound {
            unsafe {
                self.device.logical.cmd_bind_index_buffer(
                    self.cmd,
                    self.resources.quad_index_buffer.buffer,
                    0,
                    vk::IndexType::UINT16,
                );
            }
            self.index_buffer_bound = true;
        }

        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(target_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)];
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target_extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments);

        unsafe {
            self.device.logical.cmd_begin_rendering(self.cmd, &rendering_info);
            self.device.logical.cmd_draw_indexed(
                self.cmd,
                index_count,
                1,
                first_index,
                vertex_offset,
                0,
            );
            self.device.logical.cmd_end_rendering(self.cmd);
        }
        Ok(())
    }
}
