//! Debug raster writer: quadtree-leaf and correction-field visualisations
//! (spec S4.8).

use rand::Rng;

use crate::grid::PixelGrid;
use crate::quadtree::Quadtree;

/// Colorises every quadtree leaf with a pseudorandom color, clipped to the
/// canvas (mirrors the reference implementation's `std::rand()`-per-leaf
/// `dump_to`).
pub fn render_quadtree(qtree: &Quadtree, width: usize, height: usize) -> PixelGrid {
	let mut out = PixelGrid::new(height, width, 3);
	let mut rng = rand::thread_rng();
	for leaf in qtree.leaves() {
		let color: [u8; 3] = [rng.gen(), rng.gen(), rng.gen()];
		let xr = leaf.xr.min(height as isize);
		let yr = leaf.yr.min(width as isize);
		for x in leaf.xl..xr {
			for y in leaf.yl..yr {
				for c in 0..3 {
					out.set(x, y, c, color[c]);
				}
			}
		}
	}
	out
}

/// Min-max normalises each channel of the correction field independently
/// into `[0, 255]` for visual inspection (spec S4.8).
pub fn render_delta(deltas: &[Vec<f64>; 3], width: usize, height: usize) -> PixelGrid {
	let mut out = PixelGrid::new(height, width, 3);
	for c in 0..3 {
		let channel = &deltas[c];
		let lo = channel.iter().cloned().fold(f64::INFINITY, f64::min);
		let hi = channel.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
		let span = (hi - lo).max(1e-12);
		for i in 0..height as isize {
			for j in 0..width as isize {
				let v = channel[(i as usize) * width + (j as usize)];
				let normalized = ((v - lo) / span * 255.0).round().max(0.0).min(255.0) as u8;
				out.set(i, j, c, normalized);
			}
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn render_quadtree_fills_entire_canvas() {
		let qtree = Quadtree::new(4);
		let grid = render_quadtree(&qtree, 4, 4);
		// Every pixel in the single-leaf tree gets the same color.
		let first = grid.pixel_slice(0, 0).to_vec();
		for x in 0..4 {
			for y in 0..4 {
				assert_eq!(grid.pixel_slice(x, y), first.as_slice());
			}
		}
	}

	#[test]
	fn render_delta_normalizes_to_full_range() {
		let mut channel = vec![0.0; 9];
		channel[0] = -5.0;
		channel[8] = 5.0;
		let deltas = [channel.clone(), vec![0.0; 9], vec![0.0; 9]];
		let grid = render_delta(&deltas, 3, 3);
		assert_eq!(grid.get(0, 0, 0), 0);
		assert_eq!(grid.get(2, 2, 0), 255);
	}
}
