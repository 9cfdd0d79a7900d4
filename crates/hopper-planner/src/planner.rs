//! Formulation pipeline
//!
//! [`MotionPlanner`] owns the configuration, the region catalog and the
//! robot constants. [`MotionPlanner::formulate`] builds one trajectory model
//! with its contact disjunctions; the resulting [`Formulation`] hands out
//! transformed copies of that model:
//!
//! - [`Formulation::lowered`]: disjunctions compiled away, products kept
//! - [`Formulation::relaxed`]: step durations fixed, every remaining product
//!   replaced by its McCormick envelope
//! - [`Formulation::discretized`]: step durations fixed, contact forces
//!   discretized so that the torque products become exactly linear
//!
//! The formulation itself is never transformed, so any number of variants
//! can be derived from it.

use hopper_core::model::{FlatProblem, Model, Treatment};
use hopper_core::transform::{
    digit_count, BigM, ConvexHull, McCormickRelaxation, RadixLinearization, TransformReport,
    Transformation,
};
use hopper_core::ModelError;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, LoweringConfig, LoweringScheme, PlannerConfig, SolverConfig};
use crate::constraints::{ContactSchedule, ContactScheduler};
use crate::ocp::{BoundaryConditions, HopperOcp, OcpVariables};
use crate::regions::RegionCatalog;
use crate::robot::{RobotConstants, RobotConstantsSource};
use crate::solver::{solve_flat, SolveOutcome, SolveStatus, SolverEngine, SolverError};
use crate::trajectory::PlannedTrajectory;

/// Any failure of the planning pipeline
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("assignment has {got} values but the model has {expected} variables")]
    AssignmentLength { expected: usize, got: usize },
}

/// Compile the pending disjunctions of `model` with the configured scheme
pub fn lower(model: &mut Model, lowering: &LoweringConfig) -> Result<TransformReport, ModelError> {
    match lowering.scheme {
        LoweringScheme::ConvexHull => ConvexHull.apply(model),
        LoweringScheme::BigM => {
            let pass = lowering.big_m.map_or_else(BigM::new, BigM::with_value);
            pass.apply(model)
        }
    }
}

/// Planner for one robot in one environment
#[derive(Debug, Clone)]
pub struct MotionPlanner {
    robot: String,
    config: PlannerConfig,
    catalog: RegionCatalog,
    constants: RobotConstants,
}

impl MotionPlanner {
    pub fn new(
        robot: impl Into<String>,
        config: PlannerConfig,
        catalog: RegionCatalog,
        constants: RobotConstants,
    ) -> Result<Self, PlannerError> {
        let robot = robot.into();
        config.validate()?;
        constants.validate(&robot)?;
        if catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog.into());
        }
        Ok(Self {
            robot,
            config,
            catalog,
            constants,
        })
    }

    /// Query the constants of `robot` once and build the planner
    pub fn from_source(
        robot: &str,
        config: PlannerConfig,
        catalog: RegionCatalog,
        source: &dyn RobotConstantsSource,
    ) -> Result<Self, PlannerError> {
        let constants = source.constants(robot)?;
        Self::new(robot, config, catalog, constants)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub fn constants(&self) -> &RobotConstants {
        &self.constants
    }

    /// Build the trajectory model, its boundary rows and its contact
    /// disjunctions
    pub fn formulate(&self, boundary: &BoundaryConditions) -> Result<Formulation, PlannerError> {
        let mut ocp = HopperOcp::build(&self.robot, &self.config, &self.constants)?;
        ocp.apply_boundary(boundary);
        let schedule = ContactScheduler::new(&self.catalog, &self.config.contact)?.schedule(&mut ocp)?;
        Ok(Formulation {
            ocp,
            schedule,
            lowering: self.config.lowering,
        })
    }

    /// Formulate, lower, solve and extract in one call
    pub fn plan(
        &self,
        boundary: &BoundaryConditions,
        engine: &dyn SolverEngine,
    ) -> Result<PlanResult, PlannerError> {
        let formulation = self.formulate(boundary)?;
        let lowered = formulation.lowered()?;
        let outcome = formulation.solve(lowered, engine, &self.config.solver)?;
        let trajectory = if outcome.has_solution() {
            Some(formulation.extract(&outcome.values)?)
        } else {
            None
        };
        Ok(PlanResult {
            outcome,
            trajectory,
        })
    }
}

/// Status and, when the engine found one, the trajectory
#[derive(Debug, Clone)]
pub struct PlanResult {
    pub outcome: SolveOutcome,
    pub trajectory: Option<PlannedTrajectory>,
}

impl PlanResult {
    pub fn status(&self) -> SolveStatus {
        self.outcome.status
    }
}

/// A trajectory model with its contact disjunctions, not yet lowered
#[derive(Debug, Clone)]
pub struct Formulation {
    ocp: HopperOcp,
    schedule: ContactSchedule,
    lowering: LoweringConfig,
}

impl Formulation {
    pub fn model(&self) -> &Model {
        self.ocp.model()
    }

    pub fn ocp(&self) -> &HopperOcp {
        &self.ocp
    }

    pub fn variables(&self) -> &OcpVariables {
        self.ocp.variables()
    }

    pub fn schedule(&self) -> &ContactSchedule {
        &self.schedule
    }

    /// Copy of the model with every disjunction lowered
    pub fn lowered(&self) -> Result<Model, PlannerError> {
        let mut model = self.model().clone();
        lower(&mut model, &self.lowering)?;
        Ok(model)
    }

    /// Lowered copy with every free step fixed to `dt` and every remaining
    /// product relaxed
    pub fn relaxed(&self, dt: f64) -> Result<Model, PlannerError> {
        let mut model = self.model().clone();
        self.fix_steps(&mut model, dt)?;
        lower(&mut model, &self.lowering)?;
        let tagged = model.tag_products(|_, _, _| Some(Treatment::Relax))?;
        McCormickRelaxation.apply(&mut model)?;
        info!(dt, products = tagged, "Built relaxed model");
        Ok(model)
    }

    /// Lowered copy with every free step fixed to `dt` and each torque
    /// product `rel × f` linearized with the force discretized to
    /// `precision`
    pub fn discretized(&self, dt: f64, precision: f64) -> Result<Model, PlannerError> {
        let pass = RadixLinearization::new(precision)?;
        let mut model = self.model().clone();
        self.fix_steps(&mut model, dt)?;
        lower(&mut model, &self.lowering)?;

        let v = self.variables();
        let mut tagged = 0;
        for c in &v.contacts {
            for t in 0..v.num_steps() {
                let [rel_x, rel_z] = c.relative.at(t);
                let [f_x, f_z] = c.force.at(t);
                for (rel, f) in [(rel_x, f_z), (rel_z, f_x)] {
                    model.tag_product(rel, f, Treatment::Discretize { operand: f })?;
                    tagged += 1;
                }
                if t == 0 {
                    let digits = digit_count(
                        model.effective_bounds(f_x).span(),
                        model.effective_bounds(rel_z).span(),
                        precision,
                    );
                    debug!(contact = %c.name, digits, "Force discretization");
                }
            }
        }
        pass.apply(&mut model)?;
        info!(dt, precision, products = tagged, "Built discretized model");
        Ok(model)
    }

    fn fix_steps(&self, model: &mut Model, dt: f64) -> Result<(), ModelError> {
        for &step in self.variables().free_steps() {
            model.fix(step, dt)?;
        }
        Ok(())
    }

    /// Fix every binary and integer variable to its value in `values`
    ///
    /// `values` may come from any transformed copy: transformations only
    /// append variables, so the leading entries line up with this model.
    pub fn fix_schedule(&mut self, values: &[f64]) -> Result<usize, PlannerError> {
        self.check_assignment(values)?;
        let fixed = self.ocp.model_mut().fix_discrete(values)?;
        debug!(fixed, "Fixed discrete variables");
        Ok(fixed)
    }

    /// Release every discrete variable fixed by [`Formulation::fix_schedule`]
    pub fn unfix_schedule(&mut self) -> usize {
        self.ocp.model_mut().unfix_discrete()
    }

    /// Flatten a transformed copy and hand it to `engine`
    pub fn solve(
        &self,
        model: Model,
        engine: &dyn SolverEngine,
        config: &SolverConfig,
    ) -> Result<SolveOutcome, PlannerError> {
        let problem: FlatProblem = model.flatten()?;
        Ok(solve_flat(engine, &problem, config)?)
    }

    /// Trajectory stored in an assignment of this model or of any copy
    /// derived from it
    pub fn extract(&self, values: &[f64]) -> Result<PlannedTrajectory, PlannerError> {
        self.check_assignment(values)?;
        Ok(PlannedTrajectory::extract(self.variables(), &self.schedule, values))
    }

    fn check_assignment(&self, values: &[f64]) -> Result<(), PlannerError> {
        let expected = self.model().num_variables();
        if values.len() < expected {
            return Err(PlannerError::AssignmentLength {
                expected,
                got: values.len(),
            });
        }
        Ok(())
    }
}
