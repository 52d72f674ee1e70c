//! Screen-space ambient occlusion post-processing for an ash-based renderer.
//!
//! The crate owns two things: the five-pass AO pipeline (downsample, compute,
//! separable blur, upsample) over reduced-resolution intermediate targets, and
//! the bump-style descriptor arena that hands out shader-visible binding slots
//! to the pipeline and to any other renderer subsystem. Device bootstrap, the
//! swap chain, and shader compilation belong to the host engine.

pub mod renderer;
