/// GPU resources owned by the renderer: raw buffers, render-target images,
/// and shader modules. All of them are created through a `RenderDevice` and
/// release their device objects on drop.
pub mod buffer;
pub mod image;
pub mod shader;

pub use buffer::Buffer;
pub use image::Image;
pub use shader::GraphicsShader;
