//! Crate-wide error type (spec S7), shaped after `takumi`'s `TakumiError`.

use thiserror::Error;

/// Alias to [`CompositeError`].
pub type Error = CompositeError;

/// A specialized `Result` type for compositor operations.
pub type Result<T> = std::result::Result<T, CompositeError>;

/// The error type for this crate.
#[derive(Error, Debug)]
pub enum CompositeError {
	/// Non-positive canvas dimensions, or an empty layer stack.
	#[error("invalid geometry: {0}")]
	InvalidGeometry(String),

	/// The CG solve exhausted its iteration cap before reaching tolerance.
	#[error("solver did not converge after {iterations} iterations (residual {residual:e})")]
	SolverNonConvergence { iterations: usize, residual: f64 },

	/// `A` was found to be singular or indefinite during the CG solve.
	#[error("normal-equations matrix is singular or indefinite")]
	SingularSystem,

	/// Standard I/O error, reported verbatim.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// Image decode/encode error, reported verbatim.
	#[error("image error: {0}")]
	Image(#[from] image::ImageError),

	/// Malformed textual layer manifest (an ambient CLI concern, not core).
	#[error("malformed manifest: {0}")]
	Manifest(String),
}
