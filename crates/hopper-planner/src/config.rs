//! Planner configuration
//!
//! Time horizon, variable bounds, contact handling, disjunction lowering and
//! solver settings for the hopping trajectory planner. Every section has
//! defaults and round-trips through serde, so a deployment can override
//! only the fields it cares about.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors, raised before any constraint is generated
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("time grid needs at least one step, got {0}")]
    EmptyTimeGrid(usize),
    #[error("time step bounds [{min}, {max}] must be finite with 0 < min <= max")]
    InvalidStepBounds { min: f64, max: f64 },
    #[error("final time {final_time} cannot be covered by {intervals} intervals in [{min}, {max}]")]
    UnreachableFinalTime {
        final_time: f64,
        intervals: usize,
        min: f64,
        max: f64,
    },
    #[error("{name} must be positive and finite, got {value}")]
    InvalidLimit { name: &'static str, value: f64 },
    #[error("leg workspace box is empty along {axis}: [{lower}, {upper}]")]
    InvalidLegBox { axis: char, lower: f64, upper: f64 },
    #[error("orientation needs at least one sector")]
    NoOrientationSectors,
    #[error("region {region}: {rows} inequality rows but {rhs} right-hand sides")]
    RegionDimension { region: String, rows: usize, rhs: usize },
    #[error("region {region}: {reason}")]
    InvalidRegion { region: String, reason: String },
    #[error("free block needs at least one side")]
    EmptyFreeBlock,
    #[error("region catalog is empty")]
    EmptyCatalog,
    #[error("moment of inertia must be positive and finite, got {0}")]
    InvalidMomentOfInertia(f64),
    #[error("robot {0} has no contact points")]
    MissingHipOffsets(String),
    #[error("robot constants for {robot} unavailable: {reason}")]
    ConstantsUnavailable { robot: String, reason: String },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Main planner configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Time grid
    pub horizon: HorizonConfig,
    /// Variable bounds
    pub bounds: BoundsConfig,
    /// Contact and orientation modelling
    pub contact: ContactConfig,
    /// Disjunction lowering scheme
    pub lowering: LoweringConfig,
    /// Solver boundary settings
    pub solver: SolverConfig,
}

impl PlannerConfig {
    /// Parse a (possibly partial) JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.horizon.validate()?;
        self.bounds.validate()?;
        self.contact.validate()?;
        self.lowering.validate()?;
        self.solver.validate()
    }
}

/// Time grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    /// Number of knots N; the last knot has no step after it
    pub num_steps: usize,
    /// Lower bound of every free step [dimensionless time]
    pub dt_min: f64,
    /// Upper bound of every free step
    pub dt_max: f64,
    /// Total duration Σ dt, if it is constrained
    pub final_time: Option<f64>,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            num_steps: 10,
            dt_min: 0.05,
            dt_max: 0.2,
            final_time: None,
        }
    }
}

impl HorizonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_steps < 1 {
            return Err(ConfigError::EmptyTimeGrid(self.num_steps));
        }
        let (min, max) = (self.dt_min, self.dt_max);
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
            return Err(ConfigError::InvalidStepBounds { min, max });
        }
        if let Some(final_time) = self.final_time {
            let intervals = self.num_steps - 1;
            let reachable = final_time.is_finite()
                && final_time >= min * intervals as f64 - 1e-12
                && final_time <= max * intervals as f64 + 1e-12;
            if !reachable {
                return Err(ConfigError::UnreachableFinalTime {
                    final_time,
                    intervals,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Variable bounds, all in leg-length units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    /// Body and foot position limit
    pub position_max: f64,
    /// Body orientation limit [rad]; also the piecewise breakpoint span
    pub rotation_max: f64,
    /// Body, mid-step and foot velocity limit
    pub velocity_max: f64,
    /// Angular velocity limit
    pub angular_velocity_max: f64,
    /// Net force, contact force and torque limit
    pub force_max: f64,
    /// Foot acceleration limit
    pub foot_acceleration_max: f64,
    /// Limit of the world-frame hip offset and of the foot position
    /// relative to the body
    pub reach_max: f64,
    /// Lower corner (x, z) of the foot workspace relative to the hip
    pub leg_box_lower: [f64; 2],
    /// Upper corner (x, z) of the foot workspace relative to the hip
    pub leg_box_upper: [f64; 2],
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            position_max: 10.0,
            rotation_max: 2.0 * PI,
            velocity_max: 10.0,
            angular_velocity_max: 10.0,
            force_max: 10.0,
            foot_acceleration_max: 10.0,
            reach_max: 1.0,
            // unit-leg box, shrunk so the diagonal fits inside the leg length
            leg_box_lower: [-FRAC_1_SQRT_2, -FRAC_1_SQRT_2],
            leg_box_upper: [FRAC_1_SQRT_2, -0.5 * FRAC_1_SQRT_2],
        }
    }
}

impl BoundsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("position_max", self.position_max),
            ("rotation_max", self.rotation_max),
            ("velocity_max", self.velocity_max),
            ("angular_velocity_max", self.angular_velocity_max),
            ("force_max", self.force_max),
            ("foot_acceleration_max", self.foot_acceleration_max),
            ("reach_max", self.reach_max),
        ];
        for (name, value) in limits {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidLimit { name, value });
            }
        }
        for (i, axis) in ['x', 'z'].into_iter().enumerate() {
            let (lower, upper) = (self.leg_box_lower[i], self.leg_box_upper[i]);
            if !(lower.is_finite() && upper.is_finite() && lower <= upper) {
                return Err(ConfigError::InvalidLegBox { axis, lower, upper });
            }
        }
        Ok(())
    }
}

/// Contact and orientation modelling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Clearance kept between the body centre and non-contact regions
    pub body_radius: f64,
    /// Add the body-placement disjunction over non-contact regions
    pub body_avoidance: bool,
    /// Piecewise-linear segments used for `cos θ` and `sin θ`
    pub orientation_sectors: usize,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            body_radius: 0.5,
            body_avoidance: false,
            orientation_sectors: 8,
        }
    }
}

impl ContactConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.body_radius.is_finite() && self.body_radius >= 0.0) {
            return Err(ConfigError::InvalidLimit {
                name: "body_radius",
                value: self.body_radius,
            });
        }
        if self.orientation_sectors < 1 {
            return Err(ConfigError::NoOrientationSectors);
        }
        Ok(())
    }
}

/// How disjunctions are compiled away
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoweringScheme {
    /// Disaggregated convex-hull encoding
    #[default]
    ConvexHull,
    /// Big-M encoding
    BigM,
}

/// Disjunction lowering configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringConfig {
    pub scheme: LoweringScheme,
    /// Fixed big-M constant; derived from variable bounds when absent
    pub big_m: Option<f64>,
}

impl LoweringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.big_m {
            Some(value) if !(value.is_finite() && value > 0.0) => {
                Err(ConfigError::InvalidLimit { name: "big_m", value })
            }
            _ => Ok(()),
        }
    }
}

/// Class of engine the flat problem is handed to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineSelector {
    /// Mixed-integer linear (quadratic objective allowed)
    Milp,
    /// Continuous nonlinear
    Nlp,
    /// Mixed-integer nonlinear
    #[default]
    Minlp,
}

/// Solver boundary settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall-clock limit per solve [s]
    pub time_limit_seconds: f64,
    /// Thread-count hint; 0 lets the engine decide
    pub threads: usize,
    /// Relative optimality gap at which a mixed-integer solve may stop
    pub mip_gap: f64,
    pub engine: EngineSelector,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_seconds: 3600.0,
            threads: 0,
            mip_gap: 0.05,
            engine: EngineSelector::default(),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time_limit_seconds.is_finite() && self.time_limit_seconds > 0.0) {
            return Err(ConfigError::InvalidLimit {
                name: "time_limit_seconds",
                value: self.time_limit_seconds,
            });
        }
        if !(self.mip_gap.is_finite() && self.mip_gap >= 0.0) {
            return Err(ConfigError::InvalidLimit {
                name: "mip_gap",
                value: self.mip_gap,
            });
        }
        Ok(())
    }
}
