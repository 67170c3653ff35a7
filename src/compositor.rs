//! Top-level orchestration of the compositing pipeline (spec S2):
//! layers -> (mixed, z) -> quadtree -> keypoints -> interp rows ->
//! (S, B) -> SᵀS, SᵀB -> x -> correction -> output.

use log::info;

use crate::assembly::assemble_normal_equations;
use crate::config::CompositorConfig;
use crate::debug::{render_delta, render_quadtree};
use crate::error::CompositeError;
use crate::grid::PixelGrid;
use crate::keypoints::{assign_keypoints, build_all_interp_rows, identity_interp_rows, seed_quadtree};
use crate::layer::Layer;
use crate::mixed::build_mixed_rasters;
use crate::solver::{clamp_to_u8, conjugate_gradient, reconstruct_correction};

/// The rasters produced by a completed [`Compositor::run`].
pub struct CompositeResult {
	/// The blended output raster.
	pub output: PixelGrid,
	/// The pre-blend layered composite, if requested.
	pub mixed: Option<PixelGrid>,
	/// The correction-field visualisation, if requested.
	pub delta: Option<PixelGrid>,
	/// The quadtree-leaf visualisation, if requested (quadtree mode only).
	pub quadtree: Option<PixelGrid>,
}

/// Owns the layer stack and canvas dimensions for one compositing run.
pub struct Compositor {
	width: usize,
	height: usize,
	layers: Vec<Layer>,
}

impl Compositor {
	/// Creates an empty compositor over a `(width, height)` canvas.
	pub fn new(width: usize, height: usize) -> Result<Self, CompositeError> {
		if width == 0 || height == 0 {
			return Err(CompositeError::InvalidGeometry("canvas dimensions must be positive".into()));
		}
		Ok(Compositor { width, height, layers: Vec::new() })
	}

	/// Appends a layer; higher index paints later.
	pub fn add_layer(&mut self, layer: Layer) {
		self.layers.push(layer);
	}

	pub fn width(&self) -> usize { self.width }
	pub fn height(&self) -> usize { self.height }

	/// Runs the full pipeline and produces the blended output, plus any
	/// debug rasters requested in `config`.
	pub fn run(&self, config: &CompositorConfig) -> Result<CompositeResult, CompositeError> {
		if self.layers.is_empty() {
			return Err(CompositeError::InvalidGeometry("layer stack must not be empty".into()));
		}

		info!("building mixed image...");
		let rasters = build_mixed_rasters(self.width, self.height, &self.layers);

		let (qtree, num_keypoints, interp_rows) = if config.full_keypoints {
			info!("using full-keypoints dense mode");
			let rows = identity_interp_rows(self.width, self.height);
			(None, self.width * self.height, rows)
		} else {
			info!("calculating boundary...");
			let qtree = seed_quadtree(self.width, self.height, &rasters.z_index);
			let keypoints = assign_keypoints(&qtree, self.width, self.height);
			let num_keypoints = keypoints.len();
			let rows = build_all_interp_rows(&qtree, &keypoints, self.width, self.height);
			(Some(qtree), num_keypoints, rows)
		};

		info!("calculating matrices...");
		let normal_eq = assemble_normal_equations(
			self.width,
			self.height,
			&rasters.mixed,
			&rasters.z_index,
			&self.layers,
			&interp_rows,
			num_keypoints,
		);

		let mut output = PixelGrid::new(self.height, self.width, 3);
		let mut channel_deltas: [Vec<f64>; 3] = [Vec::new(), Vec::new(), Vec::new()];

		for c in 0..3 {
			info!("solving channel {}...", c + 1);
			let x = conjugate_gradient(
				&normal_eq.a,
				&normal_eq.b[c],
				config.cg_tolerance,
				config.cg_max_iterations,
			)?;
			let delta = reconstruct_correction(&interp_rows, &x);
			let mean: f64 = delta.iter().sum::<f64>() / delta.len() as f64;
			info!("channel {} correction mean = {:.5}", c + 1, mean);

			for i in 0..self.height {
				for j in 0..self.width {
					let idx = i * self.width + j;
					let v = rasters.mixed.get(i as isize, j as isize, c) as f64 + delta[idx] - mean;
					output.set(i as isize, j as isize, c, clamp_to_u8(v));
				}
			}
			channel_deltas[c] = delta;
		}

		let mixed = if config.emit_mixed { Some(rasters.mixed.clone()) } else { None };
		let delta = if config.emit_delta {
			Some(render_delta(&channel_deltas, self.width, self.height))
		} else {
			None
		};
		let quadtree_raster = if config.emit_quadtree {
			qtree.as_ref().map(|qt| render_quadtree(qt, self.width, self.height))
		} else {
			None
		};

		Ok(CompositeResult { output, mixed, delta, quadtree: quadtree_raster })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn solid_layer(h: usize, w: usize, color: [u8; 3]) -> Layer {
		let mut g = PixelGrid::new(h, w, 3);
		for x in 0..h {
			for y in 0..w {
				for c in 0..3 {
					g.set(x as isize, y as isize, c, color[c]);
				}
			}
		}
		Layer::new_opaque(g, 0, 0)
	}

	#[test]
	fn single_opaque_layer_reproduces_itself_exactly() {
		// Scenario S1 / testable property 7.
		let mut compositor = Compositor::new(4, 4).unwrap();
		compositor.add_layer(solid_layer(4, 4, [128, 128, 128]));
		let result = compositor.run(&CompositorConfig::default()).unwrap();
		for x in 0..4 {
			for y in 0..4 {
				for c in 0..3 {
					assert_eq!(result.output.get(x, y, c), 128);
				}
			}
		}
	}

	#[test]
	fn empty_layer_stack_is_rejected() {
		let compositor = Compositor::new(4, 4).unwrap();
		let err = compositor.run(&CompositorConfig::default()).unwrap_err();
		assert!(matches!(err, CompositeError::InvalidGeometry(_)));
	}

	#[test]
	fn zero_sized_canvas_is_rejected() {
		assert!(matches!(
			Compositor::new(0, 4).unwrap_err(),
			CompositeError::InvalidGeometry(_)
		));
	}

	#[test]
	fn seam_between_two_layers_stays_between_their_colors() {
		// Scenario S2: blending must not overshoot outside the range spanned
		// by the two source colors, and the far edges should stay close to
		// their own layer's color.
		let mut left = PixelGrid::new(2, 2, 3);
		for x in 0..2 {
			for c in 0..3 {
				left.set(x as isize, 0, c, 0);
				left.set(x as isize, 1, c, 0);
			}
		}
		let mut right = PixelGrid::new(2, 2, 3);
		for x in 0..2 {
			for c in 0..3 {
				right.set(x as isize, 0, c, 200);
				right.set(x as isize, 1, c, 200);
			}
		}
		let mut compositor = Compositor::new(4, 2).unwrap();
		compositor.add_layer(Layer::new_opaque(left, 0, 0));
		compositor.add_layer(Layer::new_opaque(right, 0, 2));
		let result = compositor.run(&CompositorConfig::default()).unwrap();

		for x in 0..2isize {
			for y in 0..4isize {
				let v = result.output.get(x, y, 0);
				assert!(v <= 200, "value {} exceeded the brighter source color", v);
			}
			assert!(result.output.get(x, 0, 0) < result.output.get(x, 3, 0));
		}
	}

	#[test]
	fn full_keypoints_mode_runs_to_completion() {
		let mut compositor = Compositor::new(4, 4).unwrap();
		compositor.add_layer(solid_layer(4, 4, [50, 60, 70]));
		let mut config = CompositorConfig::default();
		config.full_keypoints = true;
		let result = compositor.run(&config).unwrap();
		assert_eq!(result.output.get(0, 0, 0), 50);
		assert_eq!(result.output.get(3, 3, 2), 70);
	}

	#[test]
	fn full_keypoints_and_quadtree_modes_agree_when_every_pixel_is_a_keypoint() {
		// On a 2x2 canvas the boundary-seeding pass in seed_quadtree forces
		// every cell down to unit size, so the quadtree lattice has no room
		// left to coarsen: every pixel is already a keypoint in both modes.
		fn half_column(color: u8) -> PixelGrid {
			let mut g = PixelGrid::new(2, 1, 3);
			g.set(0, 0, 0, color);
			g.set(1, 0, 0, color);
			g
		}

		let mut quadtree_mode = Compositor::new(2, 2).unwrap();
		quadtree_mode.add_layer(Layer::new_opaque(half_column(0), 0, 0));
		quadtree_mode.add_layer(Layer::new_opaque(half_column(200), 0, 1));

		let mut dense_mode = Compositor::new(2, 2).unwrap();
		dense_mode.add_layer(Layer::new_opaque(half_column(0), 0, 0));
		dense_mode.add_layer(Layer::new_opaque(half_column(200), 0, 1));

		let quadtree_result = quadtree_mode.run(&CompositorConfig::default()).unwrap();
		let mut dense_config = CompositorConfig::default();
		dense_config.full_keypoints = true;
		let dense_result = dense_mode.run(&dense_config).unwrap();

		for x in 0..2isize {
			for y in 0..2isize {
				for c in 0..3 {
					assert_eq!(
						quadtree_result.output.get(x, y, c),
						dense_result.output.get(x, y, c),
						"mismatch at ({}, {}, {})",
						x,
						y,
						c
					);
				}
			}
		}
	}
}
