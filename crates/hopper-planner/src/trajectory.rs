//! Planned trajectory
//!
//! Values of a solved model gathered per knot, in time-grid order, for the
//! playback side. Knot times are the running sum of the step durations.

use hopper_core::math::cross2;
use hopper_core::model::VarId;
use hopper_core::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::constraints::ContactSchedule;
use crate::ocp::{OcpVariables, TimeGrid};
use crate::regions::{RegionCatalog, RegionId};

/// Per-knot history of one contact point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactTrack {
    pub name: String,
    /// Foot relative to the body centre
    pub relative_position: Vec<Vec2>,
    /// Foot in the world frame
    pub foot_position: Vec<Vec2>,
    /// Hip in the world frame
    pub hip_position: Vec<Vec2>,
    pub force: Vec<Vec2>,
    /// Region whose indicator is set, per knot
    pub region: Vec<Option<RegionId>>,
    /// Raw indicator values, `indicators[t][r]`
    pub indicators: Vec<Vec<f64>>,
}

/// A complete planned trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTrajectory {
    /// Knot times
    pub times: Vec<f64>,
    pub position: Vec<Vec2>,
    pub velocity: Vec<Vec2>,
    pub orientation: Vec<f64>,
    pub angular_velocity: Vec<f64>,
    /// Net torque about the body centre
    pub torque: Vec<f64>,
    pub contacts: Vec<ContactTrack>,
}

/// Body state between knots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    pub time: f64,
    pub position: Vec2,
    pub velocity: Vec2,
    pub orientation: f64,
}

impl PlannedTrajectory {
    /// Read the trajectory out of an assignment
    ///
    /// `values` must cover every variable in `variables`.
    pub fn extract(variables: &OcpVariables, schedule: &ContactSchedule, values: &[f64]) -> Self {
        let scalar = |ids: &[VarId]| -> Vec<f64> {
            ids.iter().map(|id| values[id.index()]).collect()
        };
        let durations = scalar(&variables.dt);
        let position = variables.position.values(values);

        let contacts = variables
            .contacts
            .iter()
            .enumerate()
            .map(|(c, vars)| {
                let hip = vars.hip.values(values);
                let indicators: Vec<Vec<f64>> = schedule
                    .contacts
                    .get(c)
                    .map(|knots| knots.iter().map(|ids| scalar(ids)).collect())
                    .unwrap_or_default();
                ContactTrack {
                    name: vars.name.clone(),
                    relative_position: vars.relative.values(values),
                    foot_position: vars.foot.values(values),
                    hip_position: position.iter().zip(&hip).map(|(r, h)| r + h).collect(),
                    force: vars.force.values(values),
                    region: (0..durations.len())
                        .map(|t| schedule.active_region(values, c, t))
                        .collect(),
                    indicators,
                }
            })
            .collect();

        Self {
            times: TimeGrid::knot_times(&durations),
            velocity: variables.velocity.values(values),
            position,
            orientation: scalar(&variables.orientation),
            angular_velocity: scalar(&variables.angular_velocity),
            torque: scalar(&variables.torque),
            contacts,
        }
    }

    pub fn num_knots(&self) -> usize {
        self.times.len()
    }

    pub fn duration(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Linear interpolation of the body state, clamped to the horizon
    pub fn sample(&self, time: f64) -> Option<TrajectorySample> {
        let last = self.times.len().checked_sub(1)?;
        let at = |k: usize| TrajectorySample {
            time: self.times[k],
            position: self.position[k],
            velocity: self.velocity[k],
            orientation: self.orientation[k],
        };
        if time <= self.times[0] {
            return Some(at(0));
        }
        if time >= self.times[last] {
            return Some(at(last));
        }
        let k = self.times.iter().rposition(|&t| t <= time)?.min(last - 1);
        let (t0, t1) = (self.times[k], self.times[k + 1]);
        let alpha = if t1 > t0 { (time - t0) / (t1 - t0) } else { 0.0 };
        Some(TrajectorySample {
            time,
            position: self.position[k].lerp(&self.position[k + 1], alpha),
            velocity: self.velocity[k].lerp(&self.velocity[k + 1], alpha),
            orientation: self.orientation[k] + alpha * (self.orientation[k + 1] - self.orientation[k]),
        })
    }

    /// Torque of the contact forces about the body centre at knot `t`
    pub fn contact_torque(&self, t: usize) -> f64 {
        self.contacts
            .iter()
            .map(|c| cross2(&c.relative_position[t], &c.force[t]))
            .sum()
    }

    /// `(contact, knot)` pairs whose foot lies outside its active region
    pub fn region_violations(&self, catalog: &RegionCatalog, tolerance: f64) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (c, track) in self.contacts.iter().enumerate() {
            for (t, region) in track.region.iter().enumerate() {
                let inside = region
                    .and_then(|id| catalog.get(id))
                    .is_some_and(|r| r.contains(&track.foot_position[t], tolerance));
                if !inside {
                    out.push((c, t));
                }
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight_line() -> PlannedTrajectory {
        PlannedTrajectory {
            times: vec![0.0, 0.2, 0.4],
            position: vec![Vec2::new(0.0, 1.0), Vec2::new(0.2, 1.0), Vec2::new(0.4, 1.0)],
            velocity: vec![Vec2::new(1.0, 0.0); 3],
            orientation: vec![0.0, 0.1, 0.2],
            angular_velocity: vec![0.5; 3],
            torque: vec![0.0; 3],
            contacts: Vec::new(),
        }
    }

    #[test]
    fn test_sample_interpolates() {
        let trajectory = straight_line();
        let sample = trajectory.sample(0.3).unwrap();
        assert_relative_eq!(sample.position.x, 0.3, epsilon = 1e-12);
        assert_relative_eq!(sample.orientation, 0.15, epsilon = 1e-12);

        assert_eq!(trajectory.sample(-1.0).unwrap().position, Vec2::new(0.0, 1.0));
        assert_eq!(trajectory.sample(9.0).unwrap().position, Vec2::new(0.4, 1.0));
        assert_relative_eq!(trajectory.duration(), 0.4);
    }

    #[test]
    fn test_contact_torque_sums_lever_arms() {
        let mut trajectory = straight_line();
        for (name, x) in [("front", 0.5), ("back", -0.5)] {
            trajectory.contacts.push(ContactTrack {
                name: name.to_string(),
                relative_position: vec![Vec2::new(x, -0.75); 3],
                foot_position: vec![Vec2::zeros(); 3],
                hip_position: vec![Vec2::zeros(); 3],
                force: vec![Vec2::new(0.1, 1.0); 3],
                region: vec![None; 3],
                indicators: Vec::new(),
            });
        }
        // x f_z - z f_x: (0.5 + 0.075) + (-0.5 + 0.075)
        assert_relative_eq!(trajectory.contact_torque(1), 0.15, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_trajectory_has_no_samples() {
        let trajectory = PlannedTrajectory {
            times: Vec::new(),
            position: Vec::new(),
            velocity: Vec::new(),
            orientation: Vec::new(),
            angular_velocity: Vec::new(),
            torque: Vec::new(),
            contacts: Vec::new(),
        };
        assert!(trajectory.sample(0.0).is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let mut trajectory = straight_line();
        trajectory.contacts.push(ContactTrack {
            name: "foot".to_string(),
            relative_position: vec![Vec2::new(0.1, -0.75); 3],
            foot_position: vec![Vec2::new(0.1, 0.25); 3],
            hip_position: vec![Vec2::new(0.0, 0.75); 3],
            force: vec![Vec2::zeros(); 3],
            region: vec![Some(RegionId(1)), None, Some(RegionId(0))],
            indicators: vec![vec![0.0, 1.0], vec![0.0, 0.0], vec![1.0, 0.0]],
        });
        assert_relative_eq!(trajectory.contact_torque(0), 0.0);
        let json = trajectory.to_json().unwrap();
        assert_eq!(PlannedTrajectory::from_json(&json).unwrap(), trajectory);
    }
}
