//! Sparse linear system assembly: gradient-difference rows, the anchor row,
//! and the normal equations `SᵀS x = SᵀB` (spec S4.6).

use std::collections::HashMap;

use log::info;
use sprs::{CsMat, TriMat};

use crate::grid::PixelGrid;
use crate::keypoints::InterpRow;
use crate::layer::Layer;
use crate::mixed::color_without;

/// Predecessor offsets for the two gradient axes: axis 0 is the vertical
/// predecessor `(i - 1, j)`, axis 1 is the horizontal predecessor `(i, j - 1)`.
const AXES: [(isize, isize); 2] = [(-1, 0), (0, -1)];

/// The assembled normal equations: a symmetric `N_k x N_k` sparse matrix
/// `A = SᵀS`, and one dense right-hand side `b_c = SᵀB_c` per color channel.
pub struct NormalEquations {
	pub a: CsMat<f64>,
	pub b: [Vec<f64>; 3],
	pub num_keypoints: usize,
}

/// Merges two interp rows as `a - b`, by keypoint id.
fn subtract_rows(a: &InterpRow, b: &InterpRow) -> Vec<(u32, f64)> {
	let mut merged: HashMap<u32, f64> = HashMap::new();
	for &(id, w) in a {
		*merged.entry(id).or_insert(0.0) += w;
	}
	for &(id, w) in b {
		*merged.entry(id).or_insert(0.0) -= w;
	}
	merged.into_iter().filter(|&(_, w)| w != 0.0).collect()
}

/// Accumulates one row of `S` (with right-hand sides `rhs`) into the normal
/// equations being built, then discards the row, so that the full `S`
/// matrix is never materialized at once (spec S5).
fn accumulate_row(
	a_acc: &mut HashMap<(usize, usize), f64>,
	b_acc: &mut [Vec<f64>; 3],
	row: &[(u32, f64)],
	rhs: [f64; 3],
) {
	for &(u, wu) in row {
		for &(v, wv) in row {
			*a_acc.entry((u as usize, v as usize)).or_insert(0.0) += wu * wv;
		}
		for c in 0..3 {
			b_acc[c][u as usize] += wu * rhs[c];
		}
	}
}

/// Builds the normal equations for the given interp rows, mixed/z rasters,
/// and layer stack.
pub fn assemble_normal_equations(
	width: usize,
	height: usize,
	mixed: &PixelGrid,
	z_index: &PixelGrid,
	layers: &[Layer],
	interp_rows: &[InterpRow],
	num_keypoints: usize,
) -> NormalEquations {
	let mut a_acc: HashMap<(usize, usize), f64> = HashMap::new();
	let mut b_acc: [Vec<f64>; 3] = [
		vec![0.0; num_keypoints],
		vec![0.0; num_keypoints],
		vec![0.0; num_keypoints],
	];

	info!("building gradient-difference rows...");
	for i in 0..height as isize {
		for j in 0..width as isize {
			for &(dx, dy) in &AXES {
				let (ti, tj) = (i + dx, j + dy);
				if ti < 0 || tj < 0 {
					continue;
				}
				let here = &interp_rows[(i as usize) * width + (j as usize)];
				let pred = &interp_rows[(ti as usize) * width + (tj as usize)];
				let row = subtract_rows(here, pred);

				let z = z_index.get(i, j, 0);
				let z_pred = z_index.get(ti, tj, 0);
				let rhs = if z == z_pred {
					[0.0, 0.0, 0.0]
				} else {
					let z_m = z.max(z_pred) as usize - 1;
					let mut rhs = [0.0; 3];
					for c in 0..3 {
						let g0 = mixed.get(i, j, c) as f64 - mixed.get(ti, tj, c) as f64;
						let g1 = color_without(layers, i, j, c, z_m) as f64
							- color_without(layers, ti, tj, c, z_m) as f64;
						rhs[c] = g1 - g0;
					}
					rhs
				};

				accumulate_row(&mut a_acc, &mut b_acc, &row, rhs);
			}
		}
	}

	info!("building anchor row...");
	let anchor = &interp_rows[width * height - 1];
	accumulate_row(&mut a_acc, &mut b_acc, anchor, [0.0, 0.0, 0.0]);

	info!("compressing {} normal-equations entries into CSR...", a_acc.len());
	let mut tri = TriMat::new((num_keypoints, num_keypoints));
	for (&(u, v), &val) in a_acc.iter() {
		tri.add_triplet(u, v, val);
	}
	let a = tri.to_csr();

	NormalEquations { a, b: b_acc, num_keypoints }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn subtract_rows_merges_and_drops_cancelled_entries() {
		let a = vec![(0u32, 1.0), (1u32, 0.5)];
		let b = vec![(1u32, 0.5), (2u32, 0.25)];
		let mut merged = subtract_rows(&a, &b);
		merged.sort_by_key(|&(id, _)| id);
		assert_eq!(merged, vec![(0, 1.0), (2, -0.25)]);
	}
}
