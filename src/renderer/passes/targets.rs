use ash::vk;
use color_eyre::Result;

use crate::renderer::contexts::device_ctx::RenderDevice;
use crate::renderer::resources::image::Image;

pub const DEPTH_PROXY_FORMAT: vk::Format = vk::Format::R16_SFLOAT;
pub const AO_FORMAT: vk::Format = vk::Format::R8_UNORM;

/// Handle-only view of one render target, as consumed by the pass driver.
#[derive(Copy, Clone, Debug)]
pub struct TargetView {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
}

impl TargetView {
    fn of(image: &Image) -> Self {
        Self {
            image: image.image,
            view: image.view,
            extent: image.extent_2d(),
        }
    }
}

/// The pipeline's target handles as one copyable bundle.
#[derive(Copy, Clone, Debug)]
pub struct AoTargetViews {
    pub depth_proxy: TargetView,
    pub ao_raw: TargetView,
    pub ao_scratch: TargetView,
    pub ao_blurred: TargetView,
    pub ao_full: TargetView,
}

/// Intermediate surfaces owned by the AO pipeline for the renderer's
/// lifetime, sized once against the active back buffer.
///
/// The quarter-area surfaces are half the back buffer's width and height.
/// `ao_scratch` carries the horizontal blur result so neither blur direction
/// samples the surface it renders to.
pub struct AoTargetSet {
    pub depth_proxy: Image,
    pub ao_raw: Image,
    pub ao_scratch: Image,
    pub ao_blurred: Image,
    pub ao_full: Image,
}

impl AoTargetSet {
    pub fn new(device: &RenderDevice, width: u32, height: u32) -> Result<Self> {
        let half_width = (width / 2).max(1);
        let half_height = (height / 2).max(1);

        let depth_proxy = device.create_render_target(
            half_width,
            half_height,
            DEPTH_PROXY_FORMAT,
            "AO depth proxy",
        )?;
        let ao_raw =
            device.create_render_target(half_width, half_height, AO_FORMAT, "AO raw")?;
        let ao_scratch =
            device.create_render_target(half_width, half_height, AO_FORMAT, "AO blur scratch")?;
        let ao_blurred =
            device.create_render_target(half_width, half_height, AO_FORMAT, "AO blurred")?;
        let ao_full = device.create_render_target(width, height, AO_FORMAT, "AO output")?;

        log::info!(
            "Created AO targets: {half_width}x{half_height} intermediates, {width}x{height} output"
        );

        Ok(Self {
            depth_proxy,
            ao_raw,
            ao_scratch,
            ao_blurred,
            ao_full,
        })
    }

    pub fn views(&self) -> AoTargetViews {
        AoTargetViews {
            depth_proxy: TargetView::of(&self.depth_proxy),
            ao_raw: TargetView::of(&self.ao_raw),
            ao_scratch: TargetView::of(&self.ao_scratch),
            ao_blurred: TargetView::of(&self.ao_blurred),
            ao_full: TargetView::of(&self.ao_full),
        }
    }

    /// The full-resolution AO image the host composites with.
    pub fn output(&self) -> &Image {
        &self.ao_full
    }
}
