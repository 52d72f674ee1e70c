use std::sync::Arc;

use ash::vk;
use color_eyre::Result;

use crate::renderer::contexts::device_ctx::RenderDevice;
use crate::renderer::passes::targets::{AO_FORMAT, DEPTH_PROXY_FORMAT};
use crate::renderer::resources::shader::GraphicsShader;

/// Descriptor set holding the per-draw constant block.
pub const CONSTANTS_SET: u32 = 0;
/// First of the three single-texture input sets.
pub const TEXTURE_SET_BASE: u32 = 1;
/// Number of independent single-texture input slots.
pub const TEXTURE_SLOTS: u32 = 3;

/// The two fixed samplers every pass samples with, mirroring the classic
/// point-clamp / linear-clamp static-sampler pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SamplerFilter {
    PointClamp,
    LinearClamp,
}

/// Immutable program + fixed-function state for one pass, consumed read-only
/// by every frame. The layout is shared by all stages.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StageConfig {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

/// The four pre-built stage configurations of the AO pipeline. The blur
/// configuration is reused for both the horizontal and the vertical pass.
#[derive(Copy, Clone, Debug)]
pub struct AoStageConfigs {
    pub downsample: StageConfig,
    pub compute: StageConfig,
    pub blur: StageConfig,
    pub upsample: StageConfig,
}

/// SPIR-V words for the AO programs, compiled by the host.
pub struct AoShaderSet<'a> {
    pub fullscreen_vs: &'a [u32],
    pub downsample_fs: &'a [u32],
    pub compute_fs: &'a [u32],
    pub blur_fs: &'a [u32],
    pub upsample_fs: &'a [u32],
}

/// Responsibilities:
/// - Build the shared resource-binding layout once at startup
/// - Build one graphics pipeline per distinct AO program
/// - Own the two fixed samplers
///
/// The binding layout is one constant-buffer set plus three independent
/// single-texture sets, so any stage can bind zero to three inputs without
/// disturbing unused slots.
pub struct RenderPipelineContext {
    downsample: vk::Pipeline,
    compute: vk::Pipeline,
    blur: vk::Pipeline,
    upsample: vk::Pipeline,

    pipeline_layout: vk::PipelineLayout,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    sampler_point_clamp: vk::Sampler,
    sampler_linear_clamp: vk::Sampler,

    device: Arc<ash::Device>,
}

impl RenderPipelineContext {
    pub fn new(device: &RenderDevice, shaders: &AoShaderSet) -> Result<Self> {
        let logical = device.logical.clone();

        let sampler_point_clamp = create_clamp_sampler(&logical, vk::Filter::NEAREST)?;
        let sampler_linear_clamp = create_clamp_sampler(&logical, vk::Filter::LINEAR)?;

        let mut set_layouts = Vec::with_capacity(1 + TEXTURE_SLOTS as usize);
        set_layouts.push(create_single_binding_layout(
            &logical,
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        )?);
        for _ in 0..TEXTURE_SLOTS {
            set_layouts.push(create_single_binding_layout(
                &logical,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
            )?);
        }

        let pipeline_layout = {
            let info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
            unsafe { logical.create_pipeline_layout(&info, None)? }
        };

        let downsample_shader = GraphicsShader::from_spirv(
            shaders.fullscreen_vs,
            shaders.downsample_fs,
            logical.clone(),
        )?;
        let compute_shader =
            GraphicsShader::from_spirv(shaders.fullscreen_vs, shaders.compute_fs, logical.clone())?;
        let blur_shader =
            GraphicsShader::from_spirv(shaders.fullscreen_vs, shaders.blur_fs, logical.clone())?;
        let upsample_shader =
            GraphicsShader::from_spirv(shaders.fullscreen_vs, shaders.upsample_fs, logical.clone())?;

        let downsample =
            create_stage_pipeline(&logical, &downsample_shader, pipeline_layout, DEPTH_PROXY_FORMAT)?;
        let compute = create_stage_pipeline(&logical, &compute_shader, pipeline_layout, AO_FORMAT)?;
        let blur = create_stage_pipeline(&logical, &blur_shader, pipeline_layout, AO_FORMAT)?;
        let upsample = create_stage_pipeline(&logical, &upsample_shader, pipeline_layout, AO_FORMAT)?;

        log::info!("Built AO stage pipelines");

        Ok(Self {
            downsample,
            compute,
            blur,
            upsample,
            pipeline_layout,
            set_layouts,
            sampler_point_clamp,
            sampler_linear_clamp,
            device: logical,
        })
    }

    pub fn stage_configs(&self) -> AoStageConfigs {
        let config = |pipeline| StageConfig {
            pipeline,
            layout: self.pipeline_layout,
        };
        AoStageConfigs {
            downsample: config(self.downsample),
            compute: config(self.compute),
            blur: config(self.blur),
            upsample: config(self.upsample),
        }
    }

    pub fn sampler(&self, filter: SamplerFilter) -> vk::Sampler {
        match filter {
            SamplerFilter::PointClamp => self.sampler_point_clamp,
            SamplerFilter::LinearClamp => self.sampler_linear_clamp,
        }
    }
}

impl Drop for RenderPipelineContext {
    fn drop(&mut self) {
        unsafe {
            for pipeline in [self.downsample, self.compute, self.blur, self.upsample] {
                self.device.destroy_pipeline(pipeline, None);
            }
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            for layout in &self.set_layouts {
                self.device.destroy_descriptor_set_layout(*layout, None);
            }
            self.device.destroy_sampler(self.sampler_point_clamp, None);
            self.device.destroy_sampler(self.sampler_linear_clamp, None);
        }
    }
}

fn create_clamp_sampler(device: &ash::Device, filter: vk::Filter) -> Result<vk::Sampler> {
    let info = vk::SamplerCreateInfo::default()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
        .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE);
    Ok(unsafe { device.create_sampler(&info, None)? })
}

fn create_single_binding_layout(
    device: &ash::Device,
    descriptor_type: vk::DescriptorType,
    stages: vk::ShaderStageFlags,
) -> Result<vk::DescriptorSetLayout> {
    let bindings = [vk::DescriptorSetLayoutBinding::default()
        .binding(0)
        .descriptor_type(descriptor_type)
        .descriptor_count(1)
        .stage_flags(stages)];
    let info = vk::DescriptorSetLayoutCreateInfo::default()
        .bindings(&bindings)
        .flags(vk::DescriptorSetLayoutCreateFlags::DESCRIPTOR_BUFFER_EXT);
    Ok(unsafe { device.create_descriptor_set_layout(&info, None)? })
}

fn create_stage_pipeline(
    device: &ash::Device,
    shader: &GraphicsShader,
    layout: vk::PipelineLayout,
    color_format: vk::Format,
) -> Result<vk::Pipeline> {
    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(shader.vert_mod)
            .name(c"main"),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(shader.frag_mod)
            .name(c"main"),
    ];

    // The quad corners are synthesized in the vertex shader; no vertex input.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);
    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);
    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);
    let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(vk::ColorComponentFlags::RGBA)];
    let color_blend =
        vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let color_formats = [color_format];
    let mut rendering =
        vk::PipelineRenderingCreateInfo::default().color_attachment_formats(&color_formats);

    let create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .flags(vk::PipelineCreateFlags::DESCRIPTOR_BUFFER_EXT)
        .push_next(&mut rendering);

    let pipelines = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
            .map_err(|(_, err)| err)?
    };
    Ok(pipelines[0])
}
