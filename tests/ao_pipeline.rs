use ash::vk;
use ash::vk::Handle;
use color_eyre::Result;
use glam::{Mat4, Vec2, Vec3};
use proptest::prelude::*;

use umbra::renderer::camera::Camera;
use umbra::renderer::config::AoSettings;
use umbra::renderer::contexts::frame_ctx::RecordContext;
use umbra::renderer::contexts::pipeline_ctx::{AoStageConfigs, SamplerFilter, StageConfig};
use umbra::renderer::passes::ao::{AoPipeline, SceneView};
use umbra::renderer::passes::targets::{AoTargetViews, TargetView};
use umbra::renderer::shader_data::{BlurParams, ComputeParams, UpsampleParams};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Viewport(u32, u32),
    Target(u64),
    Pipeline(u64),
    Texture {
        slot: u32,
        image: u64,
        filter: SamplerFilter,
    },
    Constants(Vec<u8>),
    Draw {
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    },
}

/// Capturing stand-in for the command-recording context.
#[derive(Default)]
struct FakeContext {
    events: Vec<Event>,
}

impl RecordContext for FakeContext {
    fn set_viewport(&mut self, width: u32, height: u32) {
        self.events.push(Event::Viewport(width, height));
    }

    fn set_render_target(&mut self, image: vk::Image, _view: vk::ImageView, _extent: vk::Extent2D) {
        self.events.push(Event::Target(image.as_raw()));
    }

    fn set_pipeline(&mut self, config: &StageConfig) {
        self.events.push(Event::Pipeline(config.pipeline.as_raw()));
    }

    fn bind_texture(
        &mut self,
        slot: u32,
        image: vk::Image,
        _view: vk::ImageView,
        filter: SamplerFilter,
    ) {
        self.events.push(Event::Texture {
            slot,
            image: image.as_raw(),
            filter,
        });
    }

    fn upload_constants(&mut self, data: &[u8]) -> Result<()> {
        self.events.push(Event::Constants(data.to_vec()));
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> Result<()> {
        self.events.push(Event::Draw {
            index_count,
            first_index,
            vertex_offset,
        });
        Ok(())
    }
}

impl FakeContext {
    fn draws(&self) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Draw { .. }))
            .collect()
    }

    fn constants(&self) -> Vec<&Vec<u8>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Constants(data) => Some(data),
                _ => None,
            })
            .collect()
    }

    /// Events grouped per stage; each stage ends with its draw.
    fn stages(&self) -> Vec<Vec<Event>> {
        let mut stages = Vec::new();
        let mut current = Vec::new();
        for event in &self.events {
            let is_draw = matches!(event, Event::Draw { .. });
            current.push(event.clone());
            if is_draw {
                stages.push(std::mem::take(&mut current));
            }
        }
        assert!(current.is_empty(), "trailing events after the last draw");
        stages
    }
}

const DEPTH_PROXY_IMG: u64 = 10;
const AO_RAW_IMG: u64 = 11;
const AO_SCRATCH_IMG: u64 = 12;
const AO_BLURRED_IMG: u64 = 13;
const AO_FULL_IMG: u64 = 14;
const SCENE_DEPTH_IMG: u64 = 20;
const SCENE_NORMAL_IMG: u64 = 22;

fn target(id: u64, width: u32, height: u32) -> TargetView {
    TargetView {
        image: vk::Image::from_raw(id),
        view: vk::ImageView::from_raw(id + 100),
        extent: vk::Extent2D { width, height },
    }
}

fn pipeline(width: u32, height: u32) -> AoPipeline {
    let config = |id: u64| StageConfig {
        pipeline: vk::Pipeline::from_raw(id),
        layout: vk::PipelineLayout::from_raw(99),
    };
    let configs = AoStageConfigs {
        downsample: config(1),
        compute: config(2),
        blur: config(3),
        upsample: config(4),
    };
    let half_width = (width / 2).max(1);
    let half_height = (height / 2).max(1);
    let targets = AoTargetViews {
        depth_proxy: target(DEPTH_PROXY_IMG, half_width, half_height),
        ao_raw: target(AO_RAW_IMG, half_width, half_height),
        ao_scratch: target(AO_SCRATCH_IMG, half_width, half_height),
        ao_blurred: target(AO_BLURRED_IMG, half_width, half_height),
        ao_full: target(AO_FULL_IMG, width, height),
    };
    AoPipeline::new(configs, targets)
}

fn scene(width: u32, height: u32) -> SceneView {
    SceneView {
        depth_image: vk::Image::from_raw(SCENE_DEPTH_IMG),
        depth_view: vk::ImageView::from_raw(SCENE_DEPTH_IMG + 100),
        normal_image: vk::Image::from_raw(SCENE_NORMAL_IMG),
        normal_view: vk::ImageView::from_raw(SCENE_NORMAL_IMG + 100),
        width,
        height,
    }
}

/// Identity view transform, 60 degree vertical field of view.
fn camera() -> Camera {
    let mut camera = Camera::new();
    camera.set_position(Vec3::ZERO);
    camera.set_fov_y_deg(60.0);
    camera
}

fn record(width: u32, height: u32, settings: &AoSettings) -> FakeContext {
    let mut ctx = FakeContext::default();
    pipeline(width, height)
        .record(&mut ctx, &camera(), &scene(width, height), settings)
        .unwrap();
    ctx
}

#[test]
fn five_stages_execute_once_in_fixed_order() {
    let ctx = record(1920, 1080, &AoSettings::default());

    let pipelines: Vec<u64> = ctx
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Pipeline(id) => Some(*id),
            _ => None,
        })
        .collect();
    // Downsample, compute, blur twice, upsample.
    assert_eq!(pipelines, vec![1, 2, 3, 3, 4]);

    let targets: Vec<u64> = ctx
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Target(id) => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(
        targets,
        vec![
            DEPTH_PROXY_IMG,
            AO_RAW_IMG,
            AO_SCRATCH_IMG,
            AO_BLURRED_IMG,
            AO_FULL_IMG
        ]
    );

    let draws = ctx.draws();
    assert_eq!(draws.len(), 5);
    for draw in draws {
        assert_eq!(
            *draw,
            Event::Draw {
                index_count: 6,
                first_index: 0,
                vertex_offset: 0
            }
        );
    }
}

#[test]
fn intermediate_stages_use_half_resolution_viewports() {
    let ctx = record(1920, 1080, &AoSettings::default());

    let viewports: Vec<(u32, u32)> = ctx
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Viewport(w, h) => Some((*w, *h)),
            _ => None,
        })
        .collect();
    assert_eq!(
        viewports,
        vec![
            (960, 540),
            (960, 540),
            (960, 540),
            (960, 540),
            (1920, 1080)
        ]
    );
}

#[test]
fn disabled_effect_records_nothing() {
    let settings = AoSettings {
        enabled: false,
        ..AoSettings::default()
    };
    let ctx = record(1920, 1080, &settings);
    assert!(ctx.events.is_empty());
}

#[test]
fn stages_bind_their_inputs_at_fixed_slots() {
    let ctx = record(1920, 1080, &AoSettings::default());
    let stages = ctx.stages();
    assert_eq!(stages.len(), 5);

    let textures_of = |stage: &[Event]| -> Vec<(u32, u64, SamplerFilter)> {
        stage
            .iter()
            .filter_map(|e| match e {
                Event::Texture {
                    slot,
                    image,
                    filter,
                } => Some((*slot, *image, *filter)),
                _ => None,
            })
            .collect()
    };

    use SamplerFilter::{LinearClamp, PointClamp};
    assert_eq!(
        textures_of(&stages[0]),
        vec![(0, SCENE_DEPTH_IMG, PointClamp)]
    );
    assert_eq!(
        textures_of(&stages[1]),
        vec![
            (0, DEPTH_PROXY_IMG, PointClamp),
            (1, SCENE_NORMAL_IMG, PointClamp)
        ]
    );
    assert_eq!(
        textures_of(&stages[2]),
        vec![(0, DEPTH_PROXY_IMG, PointClamp), (1, AO_RAW_IMG, PointClamp)]
    );
    assert_eq!(
        textures_of(&stages[3]),
        vec![
            (0, DEPTH_PROXY_IMG, PointClamp),
            (1, AO_SCRATCH_IMG, PointClamp)
        ]
    );
    assert_eq!(
        textures_of(&stages[4]),
        vec![
            (0, SCENE_DEPTH_IMG, PointClamp),
            (1, DEPTH_PROXY_IMG, PointClamp),
            (2, AO_BLURRED_IMG, LinearClamp)
        ]
    );
}

#[test]
fn compute_parameters_match_closed_forms() {
    let ctx = record(1920, 1080, &AoSettings::default());
    let constants = ctx.constants();
    let params: ComputeParams = bytemuck::pod_read_unaligned(constants[1]);

    let fov_y = 60.0f32.to_radians();
    let aspect = 1920.0f32 / 1080.0f32;
    assert_eq!(params.near_plane_size.y, 2.0 * (0.5 * fov_y).tan());
    assert_eq!(params.near_plane_size.x, aspect * params.near_plane_size.y);
    assert_eq!(params.view, Mat4::IDENTITY);
    assert_eq!(params.aspect, aspect);
    assert_eq!(params.pixel_size, Vec2::new(2.0 / 1920.0, 2.0 / 1080.0));

    let defaults = AoSettings::default();
    assert_eq!(params.radius_world, defaults.radius_world);
    assert_eq!(params.max_radius_screen, defaults.max_radius_screen);
    assert_eq!(params.contrast, defaults.contrast);
}

#[test]
fn upsample_uses_full_resolution_pixel_size() {
    let ctx = record(1920, 1080, &AoSettings::default());
    let constants = ctx.constants();
    let params: UpsampleParams = bytemuck::pod_read_unaligned(constants[4]);
    assert_eq!(params.pixel_size, Vec2::new(1.0 / 1920.0, 1.0 / 1080.0));
}

#[test]
fn identical_frames_produce_bit_identical_parameter_blocks() {
    let settings = AoSettings::default();
    let first = record(1920, 1080, &settings);
    let second = record(1920, 1080, &settings);
    assert_eq!(first.constants(), second.constants());
    assert_eq!(first.events, second.events);
}

proptest! {
    #[test]
    fn blur_offsets_are_orthogonal_for_any_surface(width in 1u32..=8192, height in 1u32..=8192) {
        let ctx = record(width, height, &AoSettings::default());
        let constants = ctx.constants();
        let x: BlurParams = bytemuck::pod_read_unaligned(constants[2]);
        let y: BlurParams = bytemuck::pod_read_unaligned(constants[3]);

        prop_assert_eq!(x.pixel_offset, Vec2::new(2.0 / width as f32, 0.0));
        prop_assert_eq!(y.pixel_offset, Vec2::new(0.0, 2.0 / height as f32));
        prop_assert_eq!(x.pixel_offset.dot(y.pixel_offset), 0.0);
    }
}
