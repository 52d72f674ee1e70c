use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

/// Constant block for the depth downsample pass.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct DownsampleParams {
    /// Step between source texels in normalized coordinates: (2/w, 2/h).
    pub pixel_size: Vec2,
    /// Projection entries used to linearize the non-linear depth buffer.
    pub depth_unpack: Vec2,
}

/// Constant block for the occlusion estimation pass.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ComputeParams {
    pub pixel_size: Vec2,
    /// Near-plane extents at unit distance along the view direction.
    pub near_plane_size: Vec2,
    pub view: Mat4,
    pub aspect: f32,
    /// Sample radius in world units.
    pub radius_world: f32,
    /// Hard cap on the projected radius in normalized screen units.
    pub max_radius_screen: f32,
    pub contrast: f32,
}

/// Constant block shared by both directions of the separable blur.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct BlurParams {
    /// (2/w, 0) for the horizontal pass, (0, 2/h) for the vertical pass.
    pub pixel_offset: Vec2,
    _padding: Vec2,
}

impl BlurParams {
    pub fn horizontal(width: u32) -> Self {
        Self {
            pixel_offset: Vec2::new(2.0 / width as f32, 0.0),
            _padding: Vec2::ZERO,
        }
    }

    pub fn vertical(height: u32) -> Self {
        Self {
            pixel_offset: Vec2::new(0.0, 2.0 / height as f32),
            _padding: Vec2::ZERO,
        }
    }
}

/// Constant block for the full-resolution upsample pass.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct UpsampleParams {
    /// Step between destination texels: (1/w, 1/h).
    pub pixel_size: Vec2,
    pub depth_unpack: Vec2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_offsets_are_orthogonal_unit_steps() {
        let x = BlurParams::horizontal(1920);
        let y = BlurParams::vertical(1080);
        assert_eq!(x.pixel_offset, Vec2::new(2.0 / 1920.0, 0.0));
        assert_eq!(y.pixel_offset, Vec2::new(0.0, 2.0 / 1080.0));
        assert_eq!(x.pixel_offset.dot(y.pixel_offset), 0.0);
    }

    #[test]
    fn param_blocks_have_uniform_friendly_sizes() {
        assert_eq!(std::mem::size_of::<DownsampleParams>(), 16);
        assert_eq!(std::mem::size_of::<BlurParams>(), 16);
        assert_eq!(std::mem::size_of::<UpsampleParams>(), 16);
        assert_eq!(std::mem::size_of::<ComputeParams>(), 96);
    }
}
