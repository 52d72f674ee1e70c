pub mod camera;
pub mod config;
pub mod shader_data;
pub mod util;

pub mod contexts;
pub mod passes;
pub mod resources;

pub use camera::Camera;
pub use config::AoSettings;
pub use passes::ao::{AoEffect, AoPipeline, SceneView};
