//! Keypoint lattice enumeration and per-pixel interp rows (spec S4.5).

use std::collections::HashMap;

use log::info;

use crate::grid::PixelGrid;
use crate::quadtree::{Quadtree, Rect};

/// A sparse convex combination of keypoint ids approximating a canvas pixel.
pub type InterpRow = Vec<(u32, f64)>;

/// Weights below this are dropped from an interp row (spec S4.5 step 2).
const WEIGHT_EPSILON: f64 = 1e-5;

const NEIGHBOR_OFFSETS: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Builds the quadtree domain and seeds unit-size leaves along the canvas
/// boundary and along every seam edge, so that resolution concentrates
/// exactly where layer boundaries meet (spec S4.3 "Boundary seeding").
pub fn seed_quadtree(width: usize, height: usize, z_index: &PixelGrid) -> Quadtree {
	let mut range = 1usize;
	while range < width.max(height) {
		range <<= 1;
	}
	let mut qtree = Quadtree::new(range);

	for j in 0..width {
		qtree.split(height as isize - 1, j as isize, 1);
	}
	for i in 0..height {
		qtree.split(i as isize, width as isize - 1, 1);
	}

	let mut boundary_count = 0usize;
	for i in 0..height as isize {
		for j in 0..width as isize {
			let z = z_index.get(i, j, 0);
			let is_seam = NEIGHBOR_OFFSETS.iter().any(|&(dx, dy)| {
				let (ti, tj) = (i + dx, j + dy);
				ti >= 0 && tj >= 0 && (ti as usize) < height && (tj as usize) < width
					&& z_index.get(ti, tj, 0) != z
			});
			if is_seam {
				qtree.split(i, j, 1);
				boundary_count += 1;
			}
		}
	}

	info!("found {} seam-adjacent boundary points", boundary_count);
	qtree
}

/// Scans the canvas in row-major order and assigns a dense 0-based id to
/// every keypoint of `qtree`.
pub fn assign_keypoints(qtree: &Quadtree, width: usize, height: usize) -> HashMap<(isize, isize), u32> {
	let mut keypoints = HashMap::new();
	let mut next_id = 0u32;
	for i in 0..height as isize {
		for j in 0..width as isize {
			if qtree.is_keypoint(i, j) {
				keypoints.insert((i, j), next_id);
				next_id += 1;
			}
		}
	}
	info!("found {} keypoints", keypoints.len());
	keypoints
}

/// Builds the interp row for a single canvas pixel `(x, y)` (spec S4.5).
pub fn build_interp_row(
	qtree: &Quadtree,
	keypoints: &HashMap<(isize, isize), u32>,
	x: isize,
	y: isize,
) -> InterpRow {
	if let Some(&id) = keypoints.get(&(x, y)) {
		return vec![(id, 1.0)];
	}

	let node = qtree.find(x, y).expect("canvas pixel must lie inside the quadtree domain");
	let corners = [
		(node.xl, node.yl),
		(node.xl, node.yr),
		(node.xr, node.yl),
		(node.xr, node.yr),
	];
	let area = node.area() as f64;

	let mut weight: HashMap<u32, f64> = HashMap::new();
	for &(px, py) in &corners {
		let w = ((px - x) as f64 * (py - y) as f64).abs() / area;
		if w < WEIGHT_EPSILON {
			continue;
		}
		if let Some(&id) = keypoints.get(&(px, py)) {
			*weight.entry(id).or_insert(0.0) += w;
			continue;
		}
		if let Some(n) = qtree.find(px, py) {
			distribute_along_edge(&mut weight, keypoints, n, px, py, w);
		}
		if let Some(n) = qtree.find_outer(px, py) {
			distribute_along_edge(&mut weight, keypoints, n, px, py, w);
		}
	}

	weight.into_iter().collect()
}

/// If `(px, py)` lies on a vertical or horizontal edge of `n`, and both
/// endpoints of that edge are keypoints, distributes `w` linearly between
/// them by the position of `(px, py)` along the edge (spec S4.5 step 3b).
fn distribute_along_edge(
	weight: &mut HashMap<u32, f64>,
	keypoints: &HashMap<(isize, isize), u32>,
	n: Rect,
	px: isize,
	py: isize,
	w: f64,
) {
	if px == n.xl || px == n.xr {
		if let (Some(&lo), Some(&hi)) = (keypoints.get(&(px, n.yl)), keypoints.get(&(px, n.yr))) {
			let len = (n.yr - n.yl) as f64;
			*weight.entry(lo).or_insert(0.0) += w * (py - n.yl) as f64 / len;
			*weight.entry(hi).or_insert(0.0) += w * (n.yr - py) as f64 / len;
		}
	}
	if py == n.yl || py == n.yr {
		if let (Some(&lo), Some(&hi)) = (keypoints.get(&(n.xl, py)), keypoints.get(&(n.xr, py))) {
			let len = (n.xr - n.xl) as f64;
			*weight.entry(lo).or_insert(0.0) += w * (px - n.xl) as f64 / len;
			*weight.entry(hi).or_insert(0.0) += w * (n.xr - px) as f64 / len;
		}
	}
}

/// The alternate dense "full keypoints" mode of spec S4.6: skips the
/// quadtree entirely and assigns one unknown per pixel, so every interp row
/// is trivially its own identity. Exists as a correctness reference for the
/// quadtree-reduced mode.
pub fn identity_interp_rows(width: usize, height: usize) -> Vec<InterpRow> {
	(0..(width * height) as u32).map(|id| vec![(id, 1.0)]).collect()
}

/// Builds the interp row for every canvas pixel, row-major (`row * width + col`).
pub fn build_all_interp_rows(
	qtree: &Quadtree,
	keypoints: &HashMap<(isize, isize), u32>,
	width: usize,
	height: usize,
) -> Vec<InterpRow> {
	let mut rows = Vec::with_capacity(width * height);
	for i in 0..height as isize {
		for j in 0..width as isize {
			rows.push(build_interp_row(qtree, keypoints, i, j));
		}
	}
	rows
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;

	fn sum_weight(row: &InterpRow) -> f64 { row.iter().map(|&(_, w)| w).sum() }

	#[test]
	fn interior_pixel_weights_are_nonnegative_and_sum_to_one() {
		let z = PixelGrid::new(8, 8, 1);
		let qtree = seed_quadtree(8, 8, &z);
		let keypoints = assign_keypoints(&qtree, 8, 8);
		for i in 1..7isize {
			for j in 1..7isize {
				let row = build_interp_row(&qtree, &keypoints, i, j);
				assert!(row.iter().all(|&(_, w)| w >= 0.0));
				assert_abs_diff_eq!(sum_weight(&row), 1.0, epsilon = 1e-9);
			}
		}
	}

	#[test]
	fn keypoint_pixel_interp_row_is_its_own_identity() {
		let z = PixelGrid::new(8, 8, 1);
		let qtree = seed_quadtree(8, 8, &z);
		let keypoints = assign_keypoints(&qtree, 8, 8);
		let &(x, y) = keypoints.keys().find(|&&(x, y)| x > 0 && y > 0).unwrap();
		let id = keypoints[&(x, y)];
		let row = build_interp_row(&qtree, &keypoints, x, y);
		assert_eq!(row, vec![(id, 1.0)]);
	}
}
