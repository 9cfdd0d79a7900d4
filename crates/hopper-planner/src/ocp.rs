//! Trajectory optimization problem
//!
//! Builds the symbolic model of a planar hopper over a variable-step time
//! grid:
//!
//! ```text
//! v_mid = v[t] + dt/2 · F[t]           r[t+1] = r[t] + dt · v_mid
//! v[t+1] = v_mid + dt/2 · F[t+1]
//! w_mid = w[t] + dt/(2I) · T[t]        th[t+1] = th[t] + dt · w_mid
//! w[t+1] = w_mid + dt/(2I) · T[t+1]
//! foot[t+1] = foot[t] + dt · pd[t]     pd[t+1] = pd[t] + dt/2 · (pdd[t] + pdd[t+1])
//! F = Σ f + g                          T = Σ rel × f
//! hip = R(th) · hip_offset             rel = p + hip        foot = r + rel
//! ```
//!
//! Orientation enters only through `cos th` and `sin th`, each encoded as a
//! piecewise-linear function of `th`. Mid-step velocities are variables of
//! their own so that every product in the model is bilinear.

use hopper_core::model::{Bounds, Constraint, Expr, Model, ObjectiveSense, VarId};
use hopper_core::piecewise::{self, PiecewiseSpec};
use hopper_core::{Vec2, GRAVITY};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{BoundsConfig, ConfigError, HorizonConfig, PlannerConfig};
use crate::planner::PlannerError;
use crate::robot::RobotConstants;

/// Axis labels, in index order
pub const AXES: [&str; 2] = ["x", "z"];

/// Knots of the time grid and the bounds of their steps
///
/// Step `t` separates knot `t` from knot `t + 1`; the last knot has no
/// successor, so its step is pinned to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeGrid {
    num_steps: usize,
    dt_min: f64,
    dt_max: f64,
    final_time: Option<f64>,
}

impl TimeGrid {
    pub fn new(num_steps: usize, dt_min: f64, dt_max: f64) -> Result<Self, ConfigError> {
        Self::from_config(&HorizonConfig {
            num_steps,
            dt_min,
            dt_max,
            final_time: None,
        })
    }

    pub fn from_config(horizon: &HorizonConfig) -> Result<Self, ConfigError> {
        horizon.validate()?;
        Ok(Self {
            num_steps: horizon.num_steps,
            dt_min: horizon.dt_min,
            dt_max: horizon.dt_max,
            final_time: horizon.final_time,
        })
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Number of steps with dynamics, `N - 1`
    pub fn intervals(&self) -> usize {
        self.num_steps - 1
    }

    pub fn final_time(&self) -> Option<f64> {
        self.final_time
    }

    pub fn step_bounds(&self, t: usize) -> Bounds {
        if t + 1 == self.num_steps {
            Bounds::fixed(0.0)
        } else {
            Bounds::new(self.dt_min, self.dt_max)
        }
    }

    /// Knot times for the given step durations, starting at zero
    pub fn knot_times(durations: &[f64]) -> Vec<f64> {
        let mut times = Vec::with_capacity(durations.len());
        let mut elapsed = 0.0;
        for &dt in durations {
            times.push(elapsed);
            elapsed += dt;
        }
        times
    }
}

/// One variable per axis and knot
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarTrack {
    axes: [Vec<VarId>; 2],
}

impl PlanarTrack {
    fn declare(
        model: &mut Model,
        name: &str,
        len: usize,
        bounds: [Bounds; 2],
    ) -> Result<Self, PlannerError> {
        let x = scalar_track(model, &format!("{name}.x"), len, bounds[0])?;
        let z = scalar_track(model, &format!("{name}.z"), len, bounds[1])?;
        Ok(Self { axes: [x, z] })
    }

    pub fn axis(&self, axis: usize) -> &[VarId] {
        &self.axes[axis]
    }

    pub fn get(&self, axis: usize, t: usize) -> VarId {
        self.axes[axis][t]
    }

    pub fn at(&self, t: usize) -> [VarId; 2] {
        [self.axes[0][t], self.axes[1][t]]
    }

    pub fn len(&self) -> usize {
        self.axes[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes[0].is_empty()
    }

    /// Values of the track as points
    pub fn values(&self, values: &[f64]) -> Vec<Vec2> {
        (0..self.len())
            .map(|t| Vec2::new(values[self.axes[0][t].index()], values[self.axes[1][t].index()]))
            .collect()
    }
}

fn scalar_track(
    model: &mut Model,
    name: &str,
    len: usize,
    bounds: Bounds,
) -> Result<Vec<VarId>, PlannerError> {
    let mut ids = Vec::with_capacity(len);
    for t in 0..len {
        ids.push(model.add_continuous(format!("{name}[{t}]"), bounds)?);
    }
    Ok(ids)
}

fn symmetric2(limit: f64) -> [Bounds; 2] {
    [Bounds::symmetric(limit), Bounds::symmetric(limit)]
}

/// Variables of one contact point
#[derive(Debug, Clone)]
pub struct ContactVariables {
    pub name: String,
    /// Hip position in the body frame
    pub hip_offset: Vec2,
    /// Contact force `f`
    pub force: PlanarTrack,
    /// Foot relative to the hip, `p`
    pub leg: PlanarTrack,
    /// `pd`
    pub leg_rate: PlanarTrack,
    /// `pdd`
    pub leg_acceleration: PlanarTrack,
    /// Hip relative to the body centre in the world frame
    pub hip: PlanarTrack,
    /// Foot relative to the body centre
    pub relative: PlanarTrack,
    /// Foot in the world frame
    pub foot: PlanarTrack,
}

/// Every variable of the trajectory model, by role
#[derive(Debug, Clone)]
pub struct OcpVariables {
    pub dt: Vec<VarId>,
    pub position: PlanarTrack,
    pub velocity: PlanarTrack,
    /// One entry per interval
    pub velocity_mid: PlanarTrack,
    pub orientation: Vec<VarId>,
    pub angular_velocity: Vec<VarId>,
    /// One entry per interval
    pub angular_velocity_mid: Vec<VarId>,
    pub cos_orientation: Vec<VarId>,
    pub sin_orientation: Vec<VarId>,
    /// Net force
    pub force: PlanarTrack,
    /// Net torque about the body centre
    pub torque: Vec<VarId>,
    pub contacts: Vec<ContactVariables>,
}

impl OcpVariables {
    fn declare(
        model: &mut Model,
        grid: &TimeGrid,
        bounds: &BoundsConfig,
        constants: &RobotConstants,
    ) -> Result<Self, PlannerError> {
        let n = grid.num_steps();
        let intervals = grid.intervals();

        let mut dt = Vec::with_capacity(n);
        for t in 0..n {
            let id = model.add_continuous(format!("dt[{t}]"), grid.step_bounds(t))?;
            if t + 1 == n {
                model.fix(id, 0.0)?;
            }
            dt.push(id);
        }

        let position = PlanarTrack::declare(model, "r", n, symmetric2(bounds.position_max))?;
        let velocity = PlanarTrack::declare(model, "v", n, symmetric2(bounds.velocity_max))?;
        let velocity_mid =
            PlanarTrack::declare(model, "v_mid", intervals, symmetric2(bounds.velocity_max))?;
        let rotation = Bounds::symmetric(bounds.rotation_max);
        let orientation = scalar_track(model, "th", n, rotation)?;
        let spin = Bounds::symmetric(bounds.angular_velocity_max);
        let angular_velocity = scalar_track(model, "w", n, spin)?;
        let angular_velocity_mid = scalar_track(model, "w_mid", intervals, spin)?;
        let cos_orientation = scalar_track(model, "cth", n, Bounds::symmetric(1.0))?;
        let sin_orientation = scalar_track(model, "sth", n, Bounds::symmetric(1.0))?;
        let force = PlanarTrack::declare(model, "F", n, symmetric2(bounds.force_max))?;
        let torque = scalar_track(model, "T", n, Bounds::symmetric(bounds.force_max))?;

        let leg_box = [
            Bounds::new(bounds.leg_box_lower[0], bounds.leg_box_upper[0]),
            Bounds::new(bounds.leg_box_lower[1], bounds.leg_box_upper[1]),
        ];
        let mut contacts = Vec::with_capacity(constants.num_contacts());
        for (name, offset) in &constants.hip_offsets {
            let track = |model: &mut Model, role: &str, b: [Bounds; 2]| {
                PlanarTrack::declare(model, &format!("{name}.{role}"), n, b)
            };
            contacts.push(ContactVariables {
                name: name.clone(),
                hip_offset: Vec2::new(offset[0], offset[1]),
                force: track(model, "f", symmetric2(bounds.force_max))?,
                leg: track(model, "p", leg_box)?,
                leg_rate: track(model, "pd", symmetric2(bounds.velocity_max))?,
                leg_acceleration: track(model, "pdd", symmetric2(bounds.foot_acceleration_max))?,
                hip: track(model, "hip", symmetric2(bounds.reach_max))?,
                relative: track(model, "rel", symmetric2(bounds.reach_max))?,
                foot: track(model, "foot", symmetric2(bounds.position_max))?,
            });
        }

        Ok(Self {
            dt,
            position,
            velocity,
            velocity_mid,
            orientation,
            angular_velocity,
            angular_velocity_mid,
            cos_orientation,
            sin_orientation,
            force,
            torque,
            contacts,
        })
    }

    pub fn num_steps(&self) -> usize {
        self.dt.len()
    }

    /// Free step durations (every step but the last)
    pub fn free_steps(&self) -> &[VarId] {
        &self.dt[..self.dt.len().saturating_sub(1)]
    }

    pub fn contact(&self, name: &str) -> Option<&ContactVariables> {
        self.contacts.iter().find(|c| c.name == name)
    }
}

/// Optional start and end conditions
///
/// Every field left `None` (or `false`) adds nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConditions {
    pub initial_x: Option<f64>,
    pub initial_z: Option<f64>,
    pub initial_orientation: Option<f64>,
    pub initial_velocity: Option<[f64; 2]>,
    pub initial_angular_velocity: Option<f64>,
    /// Lower bound on the final horizontal position
    pub final_min_x: Option<f64>,
    /// Final height equals initial height
    pub return_to_start_height: bool,
    pub final_orientation: Option<f64>,
    pub final_velocity: Option<[f64; 2]>,
    pub final_angular_velocity: Option<f64>,
    /// Zero net force and torque at the last knot
    pub final_rest: bool,
}

impl BoundaryConditions {
    /// Hop from rest at `start_x` to rest at or beyond `target_x`, both in
    /// metres and scaled by `leg_length`
    pub fn hop(start_x: f64, target_x: f64, leg_length: f64) -> Self {
        Self {
            initial_x: Some(start_x / leg_length),
            initial_z: None,
            initial_orientation: Some(0.0),
            initial_velocity: Some([0.0, 0.0]),
            initial_angular_velocity: Some(0.0),
            final_min_x: Some(target_x / leg_length),
            return_to_start_height: true,
            final_orientation: Some(0.0),
            final_velocity: Some([0.0, 0.0]),
            final_angular_velocity: Some(0.0),
            final_rest: true,
        }
    }
}

/// Trajectory model of a hopper, before contact scheduling
#[derive(Debug, Clone)]
pub struct HopperOcp {
    model: Model,
    grid: TimeGrid,
    variables: OcpVariables,
    moment_of_inertia: f64,
}

impl HopperOcp {
    /// Declare variables, kinematics, dynamics and the effort objective
    pub fn build(
        name: &str,
        config: &PlannerConfig,
        constants: &RobotConstants,
    ) -> Result<Self, PlannerError> {
        config.validate()?;
        constants.validate(name)?;
        let grid = TimeGrid::from_config(&config.horizon)?;

        let mut model = Model::new(name);
        let variables = OcpVariables::declare(&mut model, &grid, &config.bounds, constants)?;

        encode_orientation(
            &mut model,
            &variables,
            config.bounds.rotation_max,
            config.contact.orientation_sectors,
        )?;
        add_kinematics(&mut model, &variables);
        add_balance(&mut model, &variables);
        add_dynamics(&mut model, &variables, constants.moment_of_inertia);
        if let Some(final_time) = grid.final_time() {
            let total = Expr::linear_sum(variables.dt.iter().map(|&dt| (1.0, dt)));
            model.add_constraint(Constraint::eq("dt.total", total, final_time));
        }
        model.set_objective(ObjectiveSense::Minimize, effort(&variables));

        let stats = model.stats();
        info!(
            steps = grid.num_steps(),
            contacts = variables.contacts.len(),
            variables = stats.variables,
            constraints = stats.constraints,
            products = stats.product_terms,
            "Built trajectory model"
        );

        Ok(Self {
            model,
            grid,
            variables,
            moment_of_inertia: constants.moment_of_inertia,
        })
    }

    /// Add the requested boundary rows; returns how many were added
    pub fn apply_boundary(&mut self, conditions: &BoundaryConditions) -> usize {
        let v = &self.variables;
        let first = 0;
        let last = v.num_steps() - 1;
        let mut rows = Vec::new();

        let mut pin = |name: &str, id: VarId, value: Option<f64>| {
            if let Some(value) = value {
                rows.push(Constraint::eq(format!("boundary.{name}"), id, value));
            }
        };
        pin("initial_x", v.position.get(0, first), conditions.initial_x);
        pin("initial_z", v.position.get(1, first), conditions.initial_z);
        pin("initial_orientation", v.orientation[first], conditions.initial_orientation);
        pin("initial_angular_velocity", v.angular_velocity[first], conditions.initial_angular_velocity);
        pin("final_orientation", v.orientation[last], conditions.final_orientation);
        pin("final_angular_velocity", v.angular_velocity[last], conditions.final_angular_velocity);
        for (axis, label) in AXES.iter().enumerate() {
            pin(
                &format!("initial_velocity.{label}"),
                v.velocity.get(axis, first),
                conditions.initial_velocity.map(|vel| vel[axis]),
            );
            pin(
                &format!("final_velocity.{label}"),
                v.velocity.get(axis, last),
                conditions.final_velocity.map(|vel| vel[axis]),
            );
        }

        if let Some(min_x) = conditions.final_min_x {
            rows.push(Constraint::ge("boundary.final_min_x", v.position.get(0, last), min_x));
        }
        if conditions.return_to_start_height {
            rows.push(Constraint::eq(
                "boundary.return_height",
                v.position.get(1, last) - v.position.get(1, first),
                0.0,
            ));
        }
        if conditions.final_rest {
            for (axis, label) in AXES.iter().enumerate() {
                rows.push(Constraint::eq(
                    format!("boundary.final_force.{label}"),
                    v.force.get(axis, last),
                    0.0,
                ));
            }
            rows.push(Constraint::eq("boundary.final_torque", v.torque[last], 0.0));
        }

        let count = rows.len();
        for row in rows {
            self.model.add_constraint(row);
        }
        debug!(rows = count, "Applied boundary conditions");
        count
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub(crate) fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn variables(&self) -> &OcpVariables {
        &self.variables
    }

    pub fn moment_of_inertia(&self) -> f64 {
        self.moment_of_inertia
    }
}

fn encode_orientation(
    model: &mut Model,
    v: &OcpVariables,
    rotation_max: f64,
    sectors: usize,
) -> Result<(), PlannerError> {
    let cos = PiecewiseSpec::uniform(-rotation_max, rotation_max, sectors, f64::cos)?;
    let sin = PiecewiseSpec::uniform(-rotation_max, rotation_max, sectors, f64::sin)?;
    for t in 0..v.num_steps() {
        piecewise::encode(model, &format!("cos[{t}]"), v.orientation[t], v.cos_orientation[t], &cos)?;
        piecewise::encode(model, &format!("sin[{t}]"), v.orientation[t], v.sin_orientation[t], &sin)?;
    }
    Ok(())
}

/// Hip rotation and foot position definitions
fn add_kinematics(model: &mut Model, v: &OcpVariables) {
    for c in &v.contacts {
        let (ox, oz) = (c.hip_offset.x, c.hip_offset.y);
        for t in 0..v.num_steps() {
            let (cth, sth) = (v.cos_orientation[t], v.sin_orientation[t]);
            let hip_x = c.hip.get(0, t) - Expr::linear_sum([(ox, cth), (oz, sth)]);
            let hip_z = c.hip.get(1, t) - Expr::linear_sum([(oz, cth), (-ox, sth)]);
            model.add_constraint(Constraint::eq(format!("{}.hip.x[{t}]", c.name), hip_x, 0.0));
            model.add_constraint(Constraint::eq(format!("{}.hip.z[{t}]", c.name), hip_z, 0.0));

            for (axis, label) in AXES.iter().enumerate() {
                let relative =
                    Expr::var(c.relative.get(axis, t)) - c.leg.get(axis, t) - c.hip.get(axis, t);
                model.add_constraint(Constraint::eq(
                    format!("{}.rel.{label}[{t}]", c.name),
                    relative,
                    0.0,
                ));
                let foot = Expr::var(c.foot.get(axis, t))
                    - c.relative.get(axis, t)
                    - v.position.get(axis, t);
                model.add_constraint(Constraint::eq(
                    format!("{}.foot_position.{label}[{t}]", c.name),
                    foot,
                    0.0,
                ));
            }
        }
    }
}

/// Net force and torque about the body centre
fn add_balance(model: &mut Model, v: &OcpVariables) {
    for t in 0..v.num_steps() {
        for (axis, label) in AXES.iter().enumerate() {
            let mut net = Expr::var(v.force.get(axis, t));
            for c in &v.contacts {
                net.add_term(-1.0, c.force.get(axis, t));
            }
            let gravity = if axis == 1 { -GRAVITY } else { 0.0 };
            model.add_constraint(Constraint::eq(format!("F.{label}[{t}]"), net, gravity));
        }

        let mut torque = Expr::var(v.torque[t]);
        for c in &v.contacts {
            let [rel_x, rel_z] = c.relative.at(t);
            let [f_x, f_z] = c.force.at(t);
            torque.add_product(-1.0, rel_x, f_z);
            torque.add_product(1.0, rel_z, f_x);
        }
        model.add_constraint(Constraint::eq(format!("T[{t}]"), torque, 0.0));
    }
}

/// Integration rows for every interval
fn add_dynamics(model: &mut Model, v: &OcpVariables, moment_of_inertia: f64) {
    let spin = 0.5 / moment_of_inertia;
    for t in 0..v.num_steps().saturating_sub(1) {
        let dt = v.dt[t];
        for (axis, label) in AXES.iter().enumerate() {
            let mid = v.velocity_mid.get(axis, t);

            let mut half = Expr::var(mid) - v.velocity.get(axis, t);
            half.add_product(-0.5, dt, v.force.get(axis, t));
            model.add_constraint(Constraint::eq(format!("v_mid.{label}[{t}]"), half, 0.0));

            let mut position = Expr::var(v.position.get(axis, t + 1)) - v.position.get(axis, t);
            position.add_product(-1.0, dt, mid);
            model.add_constraint(Constraint::eq(format!("r.{label}[{t}]"), position, 0.0));

            let mut velocity = Expr::var(v.velocity.get(axis, t + 1)) - mid;
            velocity.add_product(-0.5, dt, v.force.get(axis, t + 1));
            model.add_constraint(Constraint::eq(format!("v.{label}[{t}]"), velocity, 0.0));

            for c in &v.contacts {
                let mut foot = Expr::var(c.foot.get(axis, t + 1)) - c.foot.get(axis, t);
                foot.add_product(-1.0, dt, c.leg_rate.get(axis, t));
                model.add_constraint(Constraint::eq(format!("{}.foot.{label}[{t}]", c.name), foot, 0.0));

                let mut rate = Expr::var(c.leg_rate.get(axis, t + 1)) - c.leg_rate.get(axis, t);
                rate.add_product(-0.5, dt, c.leg_acceleration.get(axis, t));
                rate.add_product(-0.5, dt, c.leg_acceleration.get(axis, t + 1));
                model.add_constraint(Constraint::eq(format!("{}.pd.{label}[{t}]", c.name), rate, 0.0));
            }
        }

        let mid = v.angular_velocity_mid[t];
        let mut half = Expr::var(mid) - v.angular_velocity[t];
        half.add_product(-spin, dt, v.torque[t]);
        model.add_constraint(Constraint::eq(format!("w_mid[{t}]"), half, 0.0));

        let mut orientation = Expr::var(v.orientation[t + 1]) - v.orientation[t];
        orientation.add_product(-1.0, dt, mid);
        model.add_constraint(Constraint::eq(format!("th[{t}]"), orientation, 0.0));

        let mut angular = Expr::var(v.angular_velocity[t + 1]) - mid;
        angular.add_product(-spin, dt, v.torque[t + 1]);
        model.add_constraint(Constraint::eq(format!("w[{t}]"), angular, 0.0));
    }
}

/// Σ |f|² + Σ |pdd|² + Σ T²
fn effort(v: &OcpVariables) -> Expr {
    let mut objective = Expr::zero();
    for c in &v.contacts {
        for t in 0..v.num_steps() {
            for axis in 0..AXES.len() {
                let f = c.force.get(axis, t);
                let a = c.leg_acceleration.get(axis, t);
                objective.add_product(1.0, f, f);
                objective.add_product(1.0, a, a);
            }
        }
    }
    for &torque in &v.torque {
        objective.add_product(1.0, torque, torque);
    }
    objective
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(num_steps: usize) -> PlannerConfig {
        let mut config = PlannerConfig::default();
        config.horizon.num_steps = num_steps;
        config
    }

    fn robot() -> RobotConstants {
        RobotConstants::single_leg(0.5, [0.0, -0.25])
    }

    #[test]
    fn test_time_grid() {
        assert_eq!(TimeGrid::new(0, 0.05, 0.2), Err(ConfigError::EmptyTimeGrid(0)));

        let grid = TimeGrid::new(5, 0.05, 0.2).unwrap();
        assert_eq!(grid.intervals(), 4);
        assert_eq!(grid.step_bounds(0), Bounds::new(0.05, 0.2));
        assert_eq!(grid.step_bounds(4), Bounds::fixed(0.0));
        assert_eq!(TimeGrid::knot_times(&[0.2, 0.1, 0.0]), vec![0.0, 0.2, 0.30000000000000004]);
    }

    #[test]
    fn test_last_step_is_fixed_to_zero() {
        let ocp = HopperOcp::build("hopper", &small_config(4), &robot()).unwrap();
        let dt = &ocp.variables().dt;
        assert_eq!(dt.len(), 4);
        assert_eq!(ocp.model().fixed_value(dt[3]), Some(0.0));
        assert!(dt[..3].iter().all(|&id| ocp.model().fixed_value(id).is_none()));
        assert_eq!(ocp.variables().free_steps().len(), 3);
    }

    #[test]
    fn test_single_knot_has_no_dynamics() {
        let ocp = HopperOcp::build("hopper", &small_config(1), &robot()).unwrap();
        assert!(ocp.variables().velocity_mid.is_empty());
        assert!(ocp.model().constraint_by_name("r.x[0]").is_none());
        assert!(ocp.model().constraint_by_name("F.z[0]").is_some());
    }

    #[test]
    fn test_force_balance_row() {
        let ocp = HopperOcp::build("hopper", &small_config(3), &robot()).unwrap();
        let v = ocp.variables();
        let row = ocp.model().constraint_by_name("F.z[1]").unwrap();
        assert_eq!(row.rhs, -GRAVITY);
        assert_eq!(row.expr.coefficient(v.force.get(1, 1)), 1.0);
        assert_eq!(row.expr.coefficient(v.contacts[0].force.get(1, 1)), -1.0);
        assert!(row.expr.is_linear());
    }

    #[test]
    fn test_torque_row_is_cross_product() {
        let ocp = HopperOcp::build("hopper", &small_config(2), &robot()).unwrap();
        let c = &ocp.variables().contacts[0];
        let row = ocp.model().constraint_by_name("T[0]").unwrap();
        assert_eq!(row.expr.product_coefficient(c.relative.get(0, 0), c.force.get(1, 0)), -1.0);
        assert_eq!(row.expr.product_coefficient(c.relative.get(1, 0), c.force.get(0, 0)), 1.0);
    }

    #[test]
    fn test_invalid_inputs_abort_construction() {
        let config = small_config(0);
        assert!(matches!(
            HopperOcp::build("hopper", &config, &robot()),
            Err(PlannerError::Config(ConfigError::EmptyTimeGrid(0)))
        ));
        let heavy = RobotConstants::single_leg(-1.0, [0.0, -0.25]);
        assert!(matches!(
            HopperOcp::build("hopper", &small_config(3), &heavy),
            Err(PlannerError::Config(ConfigError::InvalidMomentOfInertia(_)))
        ));
    }

    #[test]
    fn test_final_time_row() {
        let mut config = small_config(5);
        config.horizon.final_time = Some(0.8);
        let ocp = HopperOcp::build("hopper", &config, &robot()).unwrap();
        let row = ocp.model().constraint_by_name("dt.total").unwrap();
        assert_eq!(row.rhs, 0.8);
        assert!(ocp.variables().dt.iter().all(|&dt| row.expr.coefficient(dt) == 1.0));
    }

    #[test]
    fn test_hop_boundary() {
        let mut ocp = HopperOcp::build("hopper", &small_config(3), &robot()).unwrap();
        let rows = ocp.apply_boundary(&BoundaryConditions::hop(0.0, 1.5, 1.0));
        // x0, th0, w0, thf, wf, v0 (2), vf (2), min x, height, rest (3)
        assert_eq!(rows, 14);
        let min_x = ocp.model().constraint_by_name("boundary.final_min_x").unwrap();
        assert_eq!(min_x.rhs, 1.5);
        assert_eq!(ocp.apply_boundary(&BoundaryConditions::default()), 0);
    }
}
