use glam::{Mat4, Vec2};

/// Extents of a camera-facing plane at `distance` along the view direction,
/// given a vertical field of view in radians and a width/height aspect ratio.
pub fn plane_size(distance: f32, fov_y: f32, aspect: f32) -> Vec2 {
    let y = 2.0 * distance * (0.5 * fov_y).tan();
    Vec2::new(aspect * y, y)
}

/// The two projection-matrix entries a shader needs to turn a projective
/// depth-buffer value back into view-space depth.
///
/// For a perspective projection `P`, clip-space depth of a view-space point
/// at depth `z` is `d = (P22 * z + P32) / -z`, so `z = -P32 / (d + P22)`.
/// Returns `(P22, P32)`, i.e. the z components of the third and fourth
/// columns.
pub fn depth_unpack(proj: &Mat4) -> Vec2 {
    Vec2::new(proj.z_axis.z, proj.w_axis.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn plane_size_matches_closed_form() {
        let fov_y = std::f32::consts::FRAC_PI_3;
        let size = plane_size(1.0, fov_y, 16.0 / 9.0);
        assert_eq!(size.y, 2.0 * (0.5 * fov_y).tan());
        assert_eq!(size.x, (16.0 / 9.0) * size.y);
    }

    #[test]
    fn depth_unpack_recovers_view_depth() {
        let near = 0.1;
        let far = 100.0;
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, near, far);
        let unpack = depth_unpack(&proj);

        for z_view in [-0.1f32, -1.0, -10.0, -99.0] {
            let clip = proj * Vec4::new(0.0, 0.0, z_view, 1.0);
            let d = clip.z / clip.w;
            let recovered = -unpack.y / (d + unpack.x);
            assert!(
                (recovered - z_view).abs() < 1e-2 * z_view.abs(),
                "z_view {z_view} recovered as {recovered}"
            );
        }
    }
}
