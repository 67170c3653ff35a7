//! Seamless image compositing via gradient-domain Poisson blending over an
//! adaptive quadtree.
//!
//! A layer stack is reduced to a sparse linear least-squares system over a
//! small set of "keypoints" (conforming corners of a balanced quadtree seeded
//! along every seam between layers), solved per color channel with
//! Conjugate Gradient, and reconstructed back onto the full canvas.

pub mod assembly;
pub mod compositor;
pub mod config;
pub mod debug;
pub mod error;
pub mod grid;
pub mod keypoints;
pub mod layer;
pub mod manifest;
pub mod mixed;
pub mod quadtree;
pub mod solver;

pub use compositor::{CompositeResult, Compositor};
pub use config::CompositorConfig;
pub use error::{CompositeError, Result};
pub use layer::Layer;
