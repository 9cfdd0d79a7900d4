//! Mathematical utilities for planar hopping
//!
//! Planar rotations, cross products and the trapezoidal integration rule
//! shared by the trajectory model and the witness generators.

pub mod integrator;
pub mod planar;

pub use integrator::*;
pub use planar::*;
