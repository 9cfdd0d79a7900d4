//! # Hopper Core
//!
//! Symbolic optimization model and model-transformation passes for hybrid
//! trajectory optimization of a planar hopping robot.
//!
//! ## Modules
//!
//! - [`model`]: Variables, expressions, constraints, disjunctions and the
//!   flat problem handed to a solver engine
//! - [`piecewise`]: Convex-combination encoder for scalar functions
//! - [`transform`]: Disjunction lowering (convex hull, big-M), McCormick
//!   relaxation and radix linearization of product terms
//! - [`math`]: Planar geometry and the trapezoidal integrator

pub mod error;
pub mod math;
pub mod model;
pub mod piecewise;
pub mod transform;

pub use error::{ErrorKind, ModelError};

use nalgebra::Vector2;

/// Planar (x, z) vector
pub type Vec2 = Vector2<f64>;

/// Gravitational acceleration in body-weight units (dimensionless model)
pub const GRAVITY: f64 = 1.0;

/// Gravity vector, z-up
pub fn gravity() -> Vec2 {
    Vec2::new(0.0, -GRAVITY)
}
