pub mod device;

pub use device::{DescriptorBlock, RenderDevice};
