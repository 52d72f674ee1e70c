pub mod graphics_context;
pub mod linear_buffer;

pub use graphics_context::GraphicsContext;
pub use linear_buffer::LinearBuffer;

use ash::vk;
use color_eyre::Result;

use crate::renderer::contexts::pipeline_ctx::{SamplerFilter, StageConfig};

/// The recording surface a full-screen pass driver runs against.
///
/// The production implementation is [`GraphicsContext`], which records into a
/// host-supplied command buffer; tests substitute a capturing fake. Binding
/// state is sticky: a slot stays bound until the next call that sets it.
pub trait RecordContext {
    /// Set the viewport and scissor to the top-left `width` x `height` rect.
    fn set_viewport(&mut self, width: u32, height: u32);

    /// Select the color target the next draws render into.
    fn set_render_target(&mut self, image: vk::Image, view: vk::ImageView, extent: vk::Extent2D);

    /// Bind a pre-built stage configuration.
    fn set_pipeline(&mut self, config: &StageConfig);

    /// Bind a read-only texture at one of the three input slots.
    fn bind_texture(
        &mut self,
        slot: u32,
        image: vk::Image,
        view: vk::ImageView,
        filter: SamplerFilter,
    );

    /// Upload a parameter block to a fresh per-draw constant region and bind
    /// it at the constant slot.
    fn upload_constants(&mut self, data: &[u8]) -> Result<()>;

    /// Issue one indexed draw with the currently bound state.
    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32)
        -> Result<()>;
}
