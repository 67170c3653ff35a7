//! The mixed image and z-index rasters derived from a layer stack (spec S4.4).

use crate::grid::PixelGrid;
use crate::layer::Layer;

/// The naive painter's composite `M` and the per-pixel top-layer index `Z`.
pub struct MixedRasters {
	pub mixed: PixelGrid,
	pub z_index: PixelGrid,
}

/// Builds `M` and `Z` by iterating layers in ascending order: for each
/// opaque pixel of layer `i`, writes its color into `M` and `i + 1` into
/// `Z`. The final value at any pixel therefore comes from the highest-index
/// opaque layer.
pub fn build_mixed_rasters(width: usize, height: usize, layers: &[Layer]) -> MixedRasters {
	let mut mixed = PixelGrid::new(height, width, 3);
	let mut z_index = PixelGrid::new(height, width, 1);

	for (i, layer) in layers.iter().enumerate() {
		for (x, y) in layer.opaque_pixels(0, 0, height as isize, width as isize) {
			for c in 0..3 {
				mixed.set(x, y, c, layer.color(x, y, c));
			}
			z_index.set(x, y, 0, (i + 1) as u8);
		}
	}

	MixedRasters { mixed, z_index }
}

/// Scans layers from highest index down, skipping index `ignore_z`, and
/// returns the first opaque layer's sampled color, or `255` if none (spec
/// S4.6, `color_without`).
pub fn color_without(layers: &[Layer], x: isize, y: isize, c: usize, ignore_z: usize) -> u8 {
	for (i, layer) in layers.iter().enumerate().rev() {
		if i == ignore_z {
			continue;
		}
		if layer.opaque(x, y) {
			return layer.color(x, y, c);
		}
	}
	255
}

#[cfg(test)]
mod tests {
	use super::*;

	fn solid(h: usize, w: usize, color: u8) -> PixelGrid {
		let mut g = PixelGrid::new(h, w, 3);
		for x in 0..h {
			for y in 0..w {
				for c in 0..3 {
					g.set(x as isize, y as isize, c, color);
				}
			}
		}
		g
	}

	#[test]
	fn higher_layer_index_wins_on_overlap() {
		let l0 = Layer::new_opaque(solid(2, 2, 10), 0, 0);
		let l1 = Layer::new_opaque(solid(2, 2, 200), 0, 0);
		let rasters = build_mixed_rasters(2, 2, &[l0, l1]);
		assert_eq!(rasters.mixed.get(0, 0, 0), 200);
		assert_eq!(rasters.z_index.get(0, 0, 0), 2);
	}

	#[test]
	fn uncovered_pixels_have_zero_z() {
		let l0 = Layer::new_opaque(solid(1, 1, 10), 0, 0);
		let rasters = build_mixed_rasters(2, 2, &[l0]);
		assert_eq!(rasters.z_index.get(1, 1, 0), 0);
	}

	#[test]
	fn color_without_skips_the_named_layer() {
		let l0 = Layer::new_opaque(solid(1, 1, 10), 0, 0);
		let l1 = Layer::new_opaque(solid(1, 1, 200), 0, 0);
		let layers = vec![l0, l1];
		assert_eq!(color_without(&layers, 0, 0, 0, 1), 10);
		assert_eq!(color_without(&layers, 0, 0, 0, 0), 200);
	}
}
