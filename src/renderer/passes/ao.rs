use ash::vk;
use color_eyre::Result;
use smallvec::{smallvec, SmallVec};

use crate::renderer::camera::Camera;
use crate::renderer::config::AoSettings;
use crate::renderer::contexts::device_ctx::RenderDevice;
use crate::renderer::contexts::frame_ctx::{GraphicsContext, LinearBuffer, RecordContext};
use crate::renderer::contexts::pipeline_ctx::{
    AoStageConfigs, RenderPipelineContext, SamplerFilter, StageConfig,
};
use crate::renderer::contexts::resource_ctx::{RenderResourceContext, QUAD_INDEX_COUNT};
use crate::renderer::passes::targets::{AoTargetSet, AoTargetViews, TargetView};
use crate::renderer::resources::image::Image;
use crate::renderer::shader_data::{BlurParams, ComputeParams, DownsampleParams, UpsampleParams};
use crate::renderer::util;

/// The scene inputs one AO invocation reads: the full-resolution depth buffer
/// and the view-space normal buffer, plus their common dimensions.
#[derive(Copy, Clone, Debug)]
pub struct SceneView {
    pub depth_image: vk::Image,
    pub depth_view: vk::ImageView,
    pub normal_image: vk::Image,
    pub normal_view: vk::ImageView,
    pub width: u32,
    pub height: u32,
}

struct TextureBind {
    slot: u32,
    image: vk::Image,
    view: vk::ImageView,
    filter: SamplerFilter,
}

/// One fully described full-screen pass, built fresh each frame by the
/// parameter builders and executed by the driver loop.
struct StagePass {
    config: StageConfig,
    viewport: vk::Extent2D,
    target: TargetView,
    textures: SmallVec<[TextureBind; 3]>,
    constants: SmallVec<[u8; 128]>,
}

/// The five-stage ambient occlusion pipeline.
///
/// Stages run in a fixed order with no branching and no early exit:
/// depth downsample, occlusion estimation, horizontal blur, vertical blur,
/// upsample. All five share one binding layout (a constant block plus three
/// single-texture slots), so the driver loop records every stage the same
/// way. Holds only handles; the backing resources live in [`AoTargetSet`]
/// and the pipeline context.
pub struct AoPipeline {
    configs: AoStageConfigs,
    targets: AoTargetViews,
}

impl AoPipeline {
    pub fn new(configs: AoStageConfigs, targets: AoTargetViews) -> Self {
        Self { configs, targets }
    }

    /// Record the whole effect into `ctx`. When the effect is disabled this
    /// records nothing at all.
    pub fn record(
        &self,
        ctx: &mut impl RecordContext,
        camera: &Camera,
        scene: &SceneView,
        settings: &AoSettings,
    ) -> Result<()> {
        if !settings.enabled {
            return Ok(());
        }

        for pass in self.build_passes(camera, scene, settings) {
            ctx.set_viewport(pass.viewport.width, pass.viewport.height);
            ctx.set_render_target(pass.target.image, pass.target.view, pass.target.extent);
            ctx.set_pipeline(&pass.config);
            for texture in &pass.textures {
                ctx.bind_texture(texture.slot, texture.image, texture.view, texture.filter);
            }
            ctx.upload_constants(&pass.constants)?;
            ctx.draw_indexed(QUAD_INDEX_COUNT, 0, 0)?;
        }
        Ok(())
    }

    /// Derive the per-frame stage list. Pure with respect to its inputs:
    /// identical camera, scene, and settings produce identical passes.
    fn build_passes(
        &self,
        camera: &Camera,
        scene: &SceneView,
        settings: &AoSettings,
    ) -> SmallVec<[StagePass; 5]> {
        let width = scene.width;
        let height = scene.height;
        let aspect = width as f32 / height as f32;

        let view = camera.get_view_mat();
        let proj = camera.get_proj_mat(aspect);
        let depth_unpack = util::depth_unpack(&proj);
        let pixel_size = glam::Vec2::new(2.0 / width as f32, 2.0 / height as f32);

        let half = vk::Extent2D {
            width: (width / 2).max(1),
            height: (height / 2).max(1),
        };
        let full = vk::Extent2D { width, height };

        let downsample = StagePass {
            config: self.configs.downsample,
            viewport: half,
            target: self.targets.depth_proxy,
            textures: smallvec![TextureBind {
                slot: 0,
                image: scene.depth_image,
                view: scene.depth_view,
                filter: SamplerFilter::PointClamp,
            }],
            constants: constant_bytes(&DownsampleParams {
                pixel_size,
                depth_unpack,
            }),
        };

        let compute = StagePass {
            config: self.configs.compute,
            viewport: half,
            target: self.targets.ao_raw,
            textures: smallvec![
                TextureBind {
                    slot: 0,
                    image: self.targets.depth_proxy.image,
                    view: self.targets.depth_proxy.view,
                    filter: SamplerFilter::PointClamp,
                },
                TextureBind {
                    slot: 1,
                    image: scene.normal_image,
                    view: scene.normal_view,
                    filter: SamplerFilter::PointClamp,
                },
            ],
            constants: constant_bytes(&ComputeParams {
                pixel_size,
                near_plane_size: util::plane_size(1.0, camera.get_fov_y(), aspect),
                view,
                aspect,
                radius_world: settings.radius_world,
                max_radius_screen: settings.max_radius_screen,
                contrast: settings.contrast,
            }),
        };

        // Separable blur, ping-ponged through the scratch surface so neither
        // direction samples the image it renders to.
        let blur_x = StagePass {
            config: self.configs.blur,
            viewport: half,
            target: self.targets.ao_scratch,
            textures: smallvec![
                TextureBind {
                    slot: 0,
                    image: self.targets.depth_proxy.image,
                    view: self.targets.depth_proxy.view,
                    filter: SamplerFilter::PointClamp,
                },
                TextureBind {
                    slot: 1,
                    image: self.targets.ao_raw.image,
                    view: self.targets.ao_raw.view,
                    filter: SamplerFilter::PointClamp,
                },
            ],
            constants: constant_bytes(&BlurParams::horizontal(width)),
        };

        let blur_y = StagePass {
            config: self.configs.blur,
            viewport: half,
            target: self.targets.ao_blurred,
            textures: smallvec![
                TextureBind {
                    slot: 0,
                    image: self.targets.depth_proxy.image,
                    view: self.targets.depth_proxy.view,
                    filter: SamplerFilter::PointClamp,
                },
                TextureBind {
                    slot: 1,
                    image: self.targets.ao_scratch.image,
                    view: self.targets.ao_scratch.view,
                    filter: SamplerFilter::PointClamp,
                },
            ],
            constants: constant_bytes(&BlurParams::vertical(height)),
        };

        let upsample = StagePass {
            config: self.configs.upsample,
            viewport: full,
            target: self.targets.ao_full,
            textures: smallvec![
                TextureBind {
                    slot: 0,
                    image: scene.depth_image,
                    view: scene.depth_view,
                    filter: SamplerFilter::PointClamp,
                },
                TextureBind {
                    slot: 1,
                    image: self.targets.depth_proxy.image,
                    view: self.targets.depth_proxy.view,
                    filter: SamplerFilter::PointClamp,
                },
                TextureBind {
                    slot: 2,
                    image: self.targets.ao_blurred.image,
                    view: self.targets.ao_blurred.view,
                    filter: SamplerFilter::LinearClamp,
                },
            ],
            constants: constant_bytes(&UpsampleParams {
                pixel_size: glam::Vec2::new(1.0 / width as f32, 1.0 / height as f32),
                depth_unpack,
            }),
        };

        smallvec![downsample, compute, blur_x, blur_y, upsample]
    }
}

fn constant_bytes<T: bytemuck::Pod>(params: &T) -> SmallVec<[u8; 128]> {
    SmallVec::from_slice(bytemuck::bytes_of(params))
}

/// The complete effect: target set plus driver, created once per back-buffer
/// size and invoked once per frame by the host.
pub struct AoEffect {
    targets: AoTargetSet,
    pipeline: AoPipeline,
}

impl AoEffect {
    pub fn new(
        device: &RenderDevice,
        pipelines: &RenderPipelineContext,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let targets = AoTargetSet::new(device, width, height)?;
        let pipeline = AoPipeline::new(pipelines.stage_configs(), targets.views());
        Ok(Self { targets, pipeline })
    }

    /// Record the effect into the host's command buffer for this frame and
    /// leave every written surface shader-readable.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        device: &RenderDevice,
        resources: &mut RenderResourceContext,
        pipelines: &RenderPipelineContext,
        constants: &mut LinearBuffer,
        cmd: vk::CommandBuffer,
        camera: &Camera,
        scene: &SceneView,
        settings: &AoSettings,
    ) -> Result<()> {
        let mut ctx = GraphicsContext::new(device, resources, pipelines, constants, cmd);
        self.pipeline.record(&mut ctx, camera, scene, settings)?;
        ctx.finish();
        Ok(())
    }

    /// The full-resolution AO image the host composites with.
    pub fn output(&self) -> &Image {
        self.targets.output()
    }
}
