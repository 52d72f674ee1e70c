/// Tuning parameters for the ambient occlusion effect.
///
/// Passed into the per-frame pipeline call instead of living as process-wide
/// state, so independent pipeline instances (e.g. split-screen views) can run
/// with different settings. Consumers may adjust fields at runtime, typically
/// from a debug UI.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AoSettings {
    /// Master toggle. When false, the pipeline records no draws at all.
    pub enabled: bool,
    /// Occlusion sample radius in world-space units.
    pub radius_world: f32,
    /// Upper bound on the sample radius once projected to screen space, in
    /// normalized screen units. Keeps silhouettes from ballooning when the
    /// camera gets close.
    pub max_radius_screen: f32,
    /// Exponent applied to the accumulated occlusion term.
    pub contrast: f32,
}

impl Default for AoSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            radius_world: 1.0,
            max_radius_screen: 0.1,
            contrast: 4.0,
        }
    }
}
