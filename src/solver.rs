//! Sparse iterative solve and output reconstruction (spec S4.7).

use log::{debug, info, warn};
use sprs::CsMat;

use crate::error::CompositeError;
use crate::keypoints::InterpRow;

fn dot(a: &[f64], b: &[f64]) -> f64 {
	a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
	dot(a, a).sqrt()
}

fn matvec(a: &CsMat<f64>, x: &[f64]) -> Vec<f64> {
	let mut y = vec![0.0; x.len()];
	for (row, vec) in a.outer_iterator().enumerate() {
		let mut sum = 0.0;
		for (col, &val) in vec.iter() {
			sum += val * x[col];
		}
		y[row] = sum;
	}
	y
}

fn diagonal(a: &CsMat<f64>) -> Vec<f64> {
	let n = a.rows();
	let mut d = vec![0.0; n];
	for (row, vec) in a.outer_iterator().enumerate() {
		for (col, &val) in vec.iter() {
			if col == row {
				d[row] = val;
			}
		}
	}
	d
}

/// Solves `A x ~ b` with Jacobi-preconditioned Conjugate Gradient. `A` must
/// be symmetric positive (semi-)definite; the anchor row in S4.6 makes it
/// positive definite in practice.
pub fn conjugate_gradient(
	a: &CsMat<f64>,
	b: &[f64],
	tolerance: f64,
	max_iterations: usize,
) -> Result<Vec<f64>, CompositeError> {
	let n = b.len();
	let diag = diagonal(a);
	let precond = |r: &[f64]| -> Vec<f64> {
		r.iter()
			.zip(diag.iter())
			.map(|(&ri, &di)| if di.abs() > 1e-300 { ri / di } else { ri })
			.collect()
	};

	let mut x = vec![0.0; n];
	let mut r = b.to_vec();

	let b_norm = norm(b);
	if b_norm < 1e-12 {
		debug!("right-hand side is ~0, returning trivial solution");
		return Ok(x);
	}

	let mut z = precond(&r);
	let mut p = z.clone();
	let mut rz_old = dot(&r, &z);

	for iter in 0..max_iterations {
		let ap = matvec(a, &p);
		let pap = dot(&p, &ap);
		if pap.abs() < 1e-300 {
			warn!("conjugate gradient hit a zero curvature direction at iteration {}", iter);
			return Err(CompositeError::SingularSystem);
		}
		let alpha = rz_old / pap;
		for i in 0..n {
			x[i] += alpha * p[i];
		}
		for i in 0..n {
			r[i] -= alpha * ap[i];
		}
		let residual = norm(&r) / b_norm;
		if residual < tolerance {
			info!("CG converged after {} iterations (residual {:e})", iter + 1, residual);
			return Ok(x);
		}
		z = precond(&r);
		let rz_new = dot(&r, &z);
		let beta = rz_new / rz_old;
		for i in 0..n {
			p[i] = z[i] + beta * p[i];
		}
		rz_old = rz_new;
	}

	let residual = norm(&r) / b_norm;
	Err(CompositeError::SolverNonConvergence { iterations: max_iterations, residual })
}

/// Reconstructs the dense correction field `Δ` by applying each pixel's
/// interp row to the solved keypoint vector `x`.
pub fn reconstruct_correction(interp_rows: &[InterpRow], x: &[f64]) -> Vec<f64> {
	interp_rows
		.iter()
		.map(|row| row.iter().map(|&(id, w)| x[id as usize] * w).sum())
		.collect()
}

/// `clamp(round(v), 0, 255)` as an 8-bit sample.
pub fn clamp_to_u8(v: f64) -> u8 {
	v.round().max(0.0).min(255.0) as u8
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;
	use sprs::TriMat;

	#[test]
	fn solves_a_small_spd_system() {
		// A = [[4, 1], [1, 3]], b = [1, 2] -> x = [1/11, 7/11]
		let mut tri = TriMat::new((2, 2));
		tri.add_triplet(0, 0, 4.0);
		tri.add_triplet(0, 1, 1.0);
		tri.add_triplet(1, 0, 1.0);
		tri.add_triplet(1, 1, 3.0);
		let a = tri.to_csr();
		let x = conjugate_gradient(&a, &[1.0, 2.0], 1e-10, 100).unwrap();
		assert_abs_diff_eq!(x[0], 1.0 / 11.0, epsilon = 1e-8);
		assert_abs_diff_eq!(x[1], 7.0 / 11.0, epsilon = 1e-8);
	}

	#[test]
	fn zero_rhs_returns_trivial_solution() {
		let mut tri = TriMat::new((2, 2));
		tri.add_triplet(0, 0, 2.0);
		tri.add_triplet(1, 1, 2.0);
		let a = tri.to_csr();
		let x = conjugate_gradient(&a, &[0.0, 0.0], 1e-10, 10).unwrap();
		assert_eq!(x, vec![0.0, 0.0]);
	}

	#[test]
	fn clamp_rounds_and_saturates() {
		assert_eq!(clamp_to_u8(-5.0), 0);
		assert_eq!(clamp_to_u8(260.0), 255);
		assert_eq!(clamp_to_u8(127.6), 128);
	}
}
