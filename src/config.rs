//! Run-time configuration for a compositing pass (spec S6).

/// Tunables for a single [`crate::compositor::Compositor::run`].
#[derive(Clone, Debug)]
pub struct CompositorConfig {
	/// Selects the dense per-pixel mode of S4.6 instead of the
	/// quadtree-reduced mode. Default: `false` (quadtree mode).
	pub full_keypoints: bool,
	/// Relative residual tolerance for the Conjugate Gradient solve.
	pub cg_tolerance: f64,
	/// Iteration cap for the Conjugate Gradient solve.
	pub cg_max_iterations: usize,
	/// Emit the correction-field debug raster.
	pub emit_delta: bool,
	/// Emit the pre-blend mixed-image raster.
	pub emit_mixed: bool,
	/// Emit the quadtree-leaf debug raster.
	pub emit_quadtree: bool,
}

impl Default for CompositorConfig {
	fn default() -> Self {
		CompositorConfig {
			full_keypoints: false,
			cg_tolerance: 1e-6,
			cg_max_iterations: 1000,
			emit_delta: false,
			emit_mixed: false,
			emit_quadtree: false,
		}
	}
}
