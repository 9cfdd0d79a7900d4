//! Canned planning scenarios
//!
//! Each scenario bundles a configuration, a region catalog, robot constants
//! and boundary conditions. [`Scenario::platform_crossing`] also comes with
//! a physically consistent witness trajectory, rolled out with the same
//! integration scheme as the model, which any correct formulation of the
//! scenario must accept.

use hopper_core::math::{
    body_to_world, explicit_rates, integrate_channel, midpoint_velocity, trapezoidal_accelerations,
};
use hopper_core::model::VarId;
use hopper_core::{Vec2, GRAVITY};

use crate::config::{ConfigError, PlannerConfig};
use crate::ocp::{BoundaryConditions, AXES};
use crate::planner::{Formulation, MotionPlanner, PlannerError};
use crate::regions::{FreeBlock, RegionCatalog, RegionId};
use crate::robot::RobotConstants;

/// Hip offset of the canned single-leg robot
pub const HIP_OFFSET: [f64; 2] = [0.0, -0.25];

/// Moment of inertia of the canned single-leg robot
pub const MOMENT_OF_INERTIA: f64 = 0.5;

/// A self-contained planning problem
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub config: PlannerConfig,
    pub catalog: RegionCatalog,
    pub constants: RobotConstants,
    pub boundary: BoundaryConditions,
}

impl Scenario {
    /// Cross a platform in one hop
    ///
    /// One contact point; a platform `x ∈ [0, 2]` at height 0 with μ = 0.5
    /// and free space above it; five knots spanning 0.8; start at `x = 0`
    /// and end at or beyond `x = 1.5`.
    pub fn platform_crossing() -> Result<Self, ConfigError> {
        let mut config = PlannerConfig::default();
        config.horizon.num_steps = 5;
        config.horizon.final_time = Some(0.8);

        let mut catalog = RegionCatalog::new();
        catalog.add_platform(0.0, 2.0, 0.0, 0.5)?;
        catalog.add_free_block(FreeBlock {
            bottom: Some(0.0),
            ..FreeBlock::default()
        })?;

        Ok(Self {
            name: "platform_crossing",
            config,
            catalog,
            constants: RobotConstants::single_leg(MOMENT_OF_INERTIA, HIP_OFFSET),
            boundary: BoundaryConditions {
                initial_x: Some(0.0),
                initial_orientation: Some(0.0),
                final_min_x: Some(1.5),
                ..BoundaryConditions::default()
            },
        })
    }

    /// Hop across a gap between two platforms, from rest to rest
    pub fn gap_hop() -> Result<Self, ConfigError> {
        let mut config = PlannerConfig::default();
        config.horizon.num_steps = 10;

        let mut catalog = RegionCatalog::new();
        catalog.add_platform(-1.0, 0.5, 0.0, 0.7)?;
        catalog.add_platform(1.5, 3.0, 0.0, 0.7)?;
        catalog.add_free_block(FreeBlock {
            bottom: Some(0.0),
            ..FreeBlock::default()
        })?;

        Ok(Self {
            name: "gap_hop",
            config,
            catalog,
            constants: RobotConstants::single_leg(MOMENT_OF_INERTIA, HIP_OFFSET),
            boundary: BoundaryConditions::hop(0.0, 2.0, 1.0),
        })
    }

    pub fn planner(&self) -> Result<MotionPlanner, PlannerError> {
        MotionPlanner::new(
            self.name,
            self.config.clone(),
            self.catalog.clone(),
            self.constants.clone(),
        )
    }
}

/// Ballistic hop over the platform with the foot swinging forward
///
/// Body: constant horizontal velocity, vertical velocity under gravity
/// alone, no rotation. Foot: on the platform at the first and last knot,
/// in free space in between, following the body at a fixed height below
/// it. No contact force is needed at any knot.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossingWitness {
    pub durations: Vec<f64>,
    pub position: [Vec<f64>; 2],
    pub velocity: [Vec<f64>; 2],
    pub velocity_mid: [Vec<f64>; 2],
    pub foot: [Vec<f64>; 2],
    pub foot_rate: [Vec<f64>; 2],
    pub foot_acceleration: [Vec<f64>; 2],
    pub regions: Vec<RegionId>,
}

impl CrossingWitness {
    pub fn roll_out() -> Self {
        let durations = vec![0.2, 0.2, 0.2, 0.2, 0.0];
        let n = durations.len();

        let (x, vx) = integrate_channel(0.0, 1.875, &vec![0.0; n], &durations);
        let (z, vz) = integrate_channel(0.75, 0.4, &vec![-GRAVITY; n], &durations);
        let mid = |v: &[f64], a: f64| -> Vec<f64> {
            (0..n - 1).map(|t| midpoint_velocity(v[t], a, durations[t])).collect()
        };
        let velocity_mid = [mid(&vx, 0.0), mid(&vz, -GRAVITY)];

        // the foot hangs 0.75 below the body centre, so it touches z = 0
        // exactly when the body is back at its starting height
        let foot_x = vec![0.6, 0.6, 0.68, 0.76, 0.84];
        let foot_z: Vec<f64> = z.iter().map(|z| z - 0.75).collect();
        let rate_x = explicit_rates(&foot_x, &durations, 0.0);
        let rate_z = explicit_rates(&foot_z, &durations, -0.5);
        let acceleration_x = trapezoidal_accelerations(&rate_x, 0.0, &durations);
        let acceleration_z = trapezoidal_accelerations(&rate_z, -1.0, &durations);

        let platform = RegionId(0);
        let free = RegionId(1);
        Self {
            durations,
            position: [x, z],
            velocity: [vx, vz],
            velocity_mid,
            foot: [foot_x, foot_z],
            foot_rate: [rate_x, rate_z],
            foot_acceleration: [acceleration_x, acceleration_z],
            regions: vec![platform, free, free, free, platform],
        }
    }

    /// Assignment of a formulation of `scenario`, with every derived
    /// auxiliary filled in
    ///
    /// Every contact of the robot follows the same foot path.
    pub fn assignment(&self, formulation: &Formulation, scenario: &Scenario) -> Vec<f64> {
        let v = formulation.variables();
        let model = formulation.model();
        let mut values = model.default_assignment();
        let mut set = |id: VarId, value: f64| values[id.index()] = value;

        for t in 0..v.num_steps() {
            set(v.dt[t], self.durations[t]);
            set(v.orientation[t], 0.0);
            set(v.angular_velocity[t], 0.0);
            set(v.torque[t], 0.0);
            set(v.cos_orientation[t], 1.0);
            set(v.sin_orientation[t], 0.0);
            if t + 1 < v.num_steps() {
                set(v.angular_velocity_mid[t], 0.0);
            }
            for axis in 0..AXES.len() {
                set(v.position.get(axis, t), self.position[axis][t]);
                set(v.velocity.get(axis, t), self.velocity[axis][t]);
                set(v.force.get(axis, t), if axis == 1 { -GRAVITY } else { 0.0 });
                if t + 1 < v.num_steps() {
                    set(v.velocity_mid.get(axis, t), self.velocity_mid[axis][t]);
                }
            }
            for c in &v.contacts {
                let hip = body_to_world(&c.hip_offset, 0.0);
                let body = Vec2::new(self.position[0][t], self.position[1][t]);
                let foot = Vec2::new(self.foot[0][t], self.foot[1][t]);
                let relative = foot - body;
                let leg = relative - hip;
                for axis in 0..AXES.len() {
                    set(c.force.get(axis, t), 0.0);
                    set(c.hip.get(axis, t), hip[axis]);
                    set(c.relative.get(axis, t), relative[axis]);
                    set(c.leg.get(axis, t), leg[axis]);
                    set(c.foot.get(axis, t), foot[axis]);
                    set(c.leg_rate.get(axis, t), self.foot_rate[axis][t]);
                    set(c.leg_acceleration.get(axis, t), self.foot_acceleration[axis][t]);
                }
            }
        }

        let schedule = formulation.schedule();
        for c in 0..v.contacts.len() {
            for (y, value) in schedule.selection(c, &self.regions) {
                values[y.index()] = value;
            }
        }
        let radius = scenario.config.contact.body_radius;
        for (t, indicators) in schedule.body.iter().enumerate() {
            let body = Vec2::new(self.position[0][t], self.position[1][t]);
            let chosen = schedule.body_regions.iter().position(|&id| {
                scenario.catalog.get(id).is_some_and(|r| {
                    r.shrunk_rows(radius).iter().all(|(a, b)| a.dot(&body) <= *b)
                })
            });
            for (k, y) in indicators.iter().enumerate() {
                values[y.index()] = if Some(k) == chosen { 1.0 } else { 0.0 };
            }
        }

        model.complete_assignment(&mut values);
        values
    }
}
