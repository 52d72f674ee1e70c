pub mod device_ctx;
pub mod frame_ctx;
pub mod pipeline_ctx;
pub mod resource_ctx;
