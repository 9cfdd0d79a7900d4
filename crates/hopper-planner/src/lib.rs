//! Hopper Motion Planner
//!
//! Mixed-integer trajectory planning for a planar legged hopper moving over
//! a catalog of convex regions.
//!
//! # Architecture
//!
//! The planner builds one hybrid optimal control problem over a variable
//! time grid:
//!
//! ```text
//! minimize    J = Σ_t (Σ_c ‖f_c,t‖² + ‖p̈_c,t‖²) + τ_t²
//! subject to  r_t+1 = r_t + dt_t · v_mid,t        (trapezoidal body dynamics)
//!             τ_t = Σ_c rel_c,t × f_c,t            (bilinear torque)
//!             ∨_r [foot_c,t ∈ region r ∧ contact rules of r]
//! ```
//!
//! The disjunctions are lowered by convex hull or big-M, and the remaining
//! products are either kept (MINLP), relaxed with McCormick envelopes, or
//! made exactly linear by discretizing the contact forces.
//!
//! # Components
//!
//! - [`config`]: Planner configuration and validation
//! - [`regions`]: Convex region catalog
//! - [`robot`]: Robot constants and where they come from
//! - [`ocp`]: Trajectory model builder
//! - [`constraints`]: Disjunctive contact scheduler
//! - [`planner`]: Lowering, relaxation and discretization pipeline
//! - [`solver`]: Solver engine boundary
//! - [`trajectory`]: Result extraction and playback
//! - [`scenarios`]: Canned problems with known feasible trajectories

pub mod config;
pub mod constraints;
pub mod ocp;
pub mod planner;
pub mod regions;
pub mod robot;
pub mod scenarios;
pub mod solver;
pub mod trajectory;

// Re-exports
pub use config::{ConfigError, PlannerConfig};
pub use constraints::{ContactSchedule, ContactScheduler};
pub use ocp::{BoundaryConditions, HopperOcp};
pub use planner::{Formulation, MotionPlanner, PlanResult, PlannerError};
pub use regions::{FreeBlock, Region, RegionCatalog, RegionId};
pub use robot::{RobotConstants, RobotConstantsSource};
pub use solver::{SolveOutcome, SolveStatus, SolverEngine, SolverError};
pub use trajectory::PlannedTrajectory;
