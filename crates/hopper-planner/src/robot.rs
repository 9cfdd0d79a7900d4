//! Robot constants
//!
//! Moment of inertia and hip offsets are owned by whoever describes the
//! physical robot. The planner reads them once, before building a model,
//! through [`RobotConstantsSource`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use hopper_core::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

/// Dimensionless constants of one robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConstants {
    /// Moment of inertia about the body centre, in units of mass × leg²
    pub moment_of_inertia: f64,
    /// Hip position in the body frame, keyed by contact-point name
    pub hip_offsets: BTreeMap<String, [f64; 2]>,
}

impl RobotConstants {
    /// Robot with a single contact point named `foot`
    pub fn single_leg(moment_of_inertia: f64, hip_offset: [f64; 2]) -> Self {
        Self {
            moment_of_inertia,
            hip_offsets: BTreeMap::from([("foot".to_string(), hip_offset)]),
        }
    }

    pub fn validate(&self, robot: &str) -> Result<(), ConfigError> {
        let inertia = self.moment_of_inertia;
        if !(inertia.is_finite() && inertia > 0.0) {
            return Err(ConfigError::InvalidMomentOfInertia(inertia));
        }
        if self.hip_offsets.is_empty() {
            return Err(ConfigError::MissingHipOffsets(robot.to_string()));
        }
        for (contact, offset) in &self.hip_offsets {
            if offset.iter().any(|v| !v.is_finite()) {
                return Err(ConfigError::ConstantsUnavailable {
                    robot: robot.to_string(),
                    reason: format!("hip offset of {contact} is not finite"),
                });
            }
        }
        Ok(())
    }

    /// Contact-point names in model order
    pub fn contacts(&self) -> impl Iterator<Item = &str> {
        self.hip_offsets.keys().map(String::as_str)
    }

    pub fn num_contacts(&self) -> usize {
        self.hip_offsets.len()
    }

    pub fn hip_offset(&self, contact: &str) -> Option<Vec2> {
        self.hip_offsets.get(contact).map(|o| Vec2::new(o[0], o[1]))
    }
}

/// Read-only provider of robot constants
pub trait RobotConstantsSource {
    /// Constants of `robot`; fails if they are missing or invalid
    fn constants(&self, robot: &str) -> Result<RobotConstants, ConfigError>;
}

/// In-memory table of robots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticConstants {
    robots: BTreeMap<String, RobotConstants>,
}

impl StaticConstants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_robot(mut self, robot: impl Into<String>, constants: RobotConstants) -> Self {
        self.robots.insert(robot.into(), constants);
        self
    }

    /// Parse a JSON object mapping robot ids to constants
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

impl RobotConstantsSource for StaticConstants {
    fn constants(&self, robot: &str) -> Result<RobotConstants, ConfigError> {
        let constants = self
            .robots
            .get(robot)
            .cloned()
            .ok_or_else(|| ConfigError::ConstantsUnavailable {
                robot: robot.to_string(),
                reason: "unknown robot".to_string(),
            })?;
        constants.validate(robot)?;
        debug!(
            robot,
            moment_of_inertia = constants.moment_of_inertia,
            contacts = constants.num_contacts(),
            "Loaded robot constants"
        );
        Ok(constants)
    }
}

/// JSON file in the [`StaticConstants`] layout, read on every query
#[derive(Debug, Clone)]
pub struct ConstantsFile {
    path: PathBuf,
}

impl ConstantsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RobotConstantsSource for ConstantsFile {
    fn constants(&self, robot: &str) -> Result<RobotConstants, ConfigError> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            ConfigError::ConstantsUnavailable {
                robot: robot.to_string(),
                reason: format!("{}: {e}", self.path.display()),
            }
        })?;
        StaticConstants::from_json(&json)?.constants(robot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_lookup() {
        let source =
            StaticConstants::new().with_robot("hopper", RobotConstants::single_leg(0.5, [0.0, -0.25]));
        let constants = source.constants("hopper").unwrap();
        assert_eq!(constants.contacts().collect::<Vec<_>>(), vec!["foot"]);
        assert_eq!(constants.hip_offset("foot"), Some(Vec2::new(0.0, -0.25)));

        assert!(matches!(
            source.constants("biped"),
            Err(ConfigError::ConstantsUnavailable { .. })
        ));
    }

    #[test]
    fn test_invalid_constants_are_rejected() {
        let source = StaticConstants::new()
            .with_robot("flat", RobotConstants::single_leg(0.0, [0.0, -0.25]))
            .with_robot(
                "legless",
                RobotConstants {
                    moment_of_inertia: 1.0,
                    hip_offsets: BTreeMap::new(),
                },
            );
        assert_eq!(
            source.constants("flat"),
            Err(ConfigError::InvalidMomentOfInertia(0.0))
        );
        assert_eq!(
            source.constants("legless"),
            Err(ConfigError::MissingHipOffsets("legless".to_string()))
        );
    }

    #[test]
    fn test_json_table() {
        let source = StaticConstants::from_json(
            r#"{ "hopper": { "moment_of_inertia": 0.3,
                             "hip_offsets": { "left": [-0.1, -0.2], "right": [0.1, -0.2] } } }"#,
        )
        .unwrap();
        let constants = source.constants("hopper").unwrap();
        assert_eq!(constants.num_contacts(), 2);
        assert_eq!(constants.contacts().collect::<Vec<_>>(), vec!["left", "right"]);
        assert!(StaticConstants::from_json("{").is_err());
    }

    #[test]
    fn test_missing_file() {
        let source = ConstantsFile::new("/nonexistent/robots.json");
        assert!(matches!(
            source.constants("hopper"),
            Err(ConfigError::ConstantsUnavailable { .. })
        ));
    }
}
