//! Disjunctive contact scheduling
//!
//! For every contact point and knot, the foot occupies exactly one region
//! of the catalog. Each choice is a disjunct gated by its own indicator:
//!
//! - the foot lies inside the region (equalities split into two rows)
//! - on a contact surface (μ > 0): `|f·τ| ≤ μ f·n` and the tangential foot
//!   rate is zero
//! - in free space (μ = 0): `f = 0` and the hip lies inside the region too
//!
//! With body avoidance enabled, a second disjunction per knot places the
//! body centre inside one of the free-space regions shrunk by the body
//! radius.

use hopper_core::math::tangent;
use hopper_core::model::{Constraint, Expr, VarId};
use tracing::{info, warn};

use crate::config::{ConfigError, ContactConfig};
use crate::ocp::{ContactVariables, HopperOcp, OcpVariables, AXES};
use crate::planner::PlannerError;
use crate::regions::{Region, RegionCatalog, RegionId};

/// Indicators created by the scheduler
#[derive(Debug, Clone, Default)]
pub struct ContactSchedule {
    /// `contacts[c][t][r]`: contact `c` is in region `r` at knot `t`
    pub contacts: Vec<Vec<Vec<VarId>>>,
    /// Regions eligible for the body centre
    pub body_regions: Vec<RegionId>,
    /// `body[t][k]`: the body centre is in `body_regions[k]` at knot `t`
    pub body: Vec<Vec<VarId>>,
}

impl ContactSchedule {
    /// Region whose indicator is set for contact `c` at knot `t`
    pub fn active_region(&self, values: &[f64], contact: usize, t: usize) -> Option<RegionId> {
        self.contacts
            .get(contact)?
            .get(t)?
            .iter()
            .position(|y| values[y.index()] > 0.5)
            .map(RegionId)
    }

    /// Every indicator, contact disjunctions first
    pub fn indicators(&self) -> impl Iterator<Item = VarId> + '_ {
        let contacts = self.contacts.iter().flatten().flatten();
        contacts.chain(self.body.iter().flatten()).copied()
    }

    /// Value the indicators of the contact disjunctions take for a given
    /// region choice, as `(indicator, value)` pairs
    pub fn selection(&self, contact: usize, regions: &[RegionId]) -> Vec<(VarId, f64)> {
        let mut out = Vec::new();
        if let Some(knots) = self.contacts.get(contact) {
            for (indicators, region) in knots.iter().zip(regions) {
                for (r, &y) in indicators.iter().enumerate() {
                    out.push((y, if r == region.0 { 1.0 } else { 0.0 }));
                }
            }
        }
        out
    }
}

/// Builds the contact disjunctions of a trajectory model
#[derive(Debug, Clone, Copy)]
pub struct ContactScheduler<'a> {
    catalog: &'a RegionCatalog,
    contact: &'a ContactConfig,
}

impl<'a> ContactScheduler<'a> {
    pub fn new(catalog: &'a RegionCatalog, contact: &'a ContactConfig) -> Result<Self, ConfigError> {
        if catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        contact.validate()?;
        Ok(Self { catalog, contact })
    }

    /// Add one disjunction per (contact, knot), plus the body disjunctions
    /// when enabled
    pub fn schedule(&self, ocp: &mut HopperOcp) -> Result<ContactSchedule, PlannerError> {
        let variables = ocp.variables().clone();
        let mut schedule = ContactSchedule::default();

        for c in &variables.contacts {
            let mut knots = Vec::with_capacity(variables.num_steps());
            for t in 0..variables.num_steps() {
                knots.push(self.contact_disjunction(ocp, &variables, c, t)?);
            }
            schedule.contacts.push(knots);
        }

        if self.contact.body_avoidance {
            schedule.body_regions = self
                .catalog
                .iter()
                .filter(|(_, region)| !region.is_contact())
                .map(|(id, _)| id)
                .collect();
            if schedule.body_regions.is_empty() {
                warn!("Body avoidance requested but the catalog has no free-space region");
            } else {
                for t in 0..variables.num_steps() {
                    let indicators = self.body_disjunction(ocp, &variables, &schedule.body_regions, t)?;
                    schedule.body.push(indicators);
                }
            }
        }

        let stats = ocp.model().stats();
        info!(
            contacts = variables.contacts.len(),
            regions = self.catalog.len(),
            body_avoidance = !schedule.body.is_empty(),
            disjunctions = stats.disjunctions,
            disjuncts = stats.disjuncts,
            "Scheduled contact disjunctions"
        );
        Ok(schedule)
    }

    fn contact_disjunction(
        &self,
        ocp: &mut HopperOcp,
        v: &OcpVariables,
        c: &ContactVariables,
        t: usize,
    ) -> Result<Vec<VarId>, PlannerError> {
        let model = ocp.model_mut();
        let mut disjuncts = Vec::with_capacity(self.catalog.len());
        let mut indicators = Vec::with_capacity(self.catalog.len());
        for (id, region) in self.catalog.iter() {
            let label = format!("contact[{},region={},t={t}]", c.name, id.0);
            let disjunct = model.add_disjunct(label)?;
            for row in region_rows(region, v, c, t) {
                model.add_disjunct_constraint(disjunct, row);
            }
            indicators.push(model.disjunct(disjunct).indicator);
            disjuncts.push(disjunct);
        }
        model.add_disjunction(format!("contact[{},t={t}]", c.name), disjuncts);
        Ok(indicators)
    }

    fn body_disjunction(
        &self,
        ocp: &mut HopperOcp,
        v: &OcpVariables,
        regions: &[RegionId],
        t: usize,
    ) -> Result<Vec<VarId>, PlannerError> {
        let model = ocp.model_mut();
        let x = Expr::var(v.position.get(0, t));
        let z = Expr::var(v.position.get(1, t));
        let mut disjuncts = Vec::with_capacity(regions.len());
        let mut indicators = Vec::with_capacity(regions.len());
        for &id in regions {
            let Some(region) = self.catalog.get(id) else {
                continue;
            };
            let disjunct = model.add_disjunct(format!("body[region={},t={t}]", id.0))?;
            for row in region.clearance("body_clearance", self.contact.body_radius, &x, &z) {
                model.add_disjunct_constraint(disjunct, row);
            }
            indicators.push(model.disjunct(disjunct).indicator);
            disjuncts.push(disjunct);
        }
        model.add_disjunction(format!("body[t={t}]"), disjuncts);
        Ok(indicators)
    }
}

/// Constraints of the disjunct "contact `c` is in `region` at knot `t`"
fn region_rows(region: &Region, v: &OcpVariables, c: &ContactVariables, t: usize) -> Vec<Constraint> {
    let [foot_x, foot_z] = c.foot.at(t);
    let mut rows = region.containment("foot_in_region", &Expr::var(foot_x), &Expr::var(foot_z));

    let [f_x, f_z] = c.force.at(t);
    if region.is_contact() {
        let normal = region.normal();
        let tau = tangent(&normal);
        let mu = region.mu();
        let tangential = Expr::linear_sum([(tau.x, f_x), (tau.y, f_z)]);
        let normal_force = Expr::linear_sum([(normal.x, f_x), (normal.y, f_z)]);
        rows.push(Constraint::le(
            "friction_upper",
            tangential.clone() - normal_force.clone().scaled(mu),
            0.0,
        ));
        rows.push(Constraint::ge(
            "friction_lower",
            tangential + normal_force.scaled(mu),
            0.0,
        ));
        let [pd_x, pd_z] = c.leg_rate.at(t);
        rows.push(Constraint::eq(
            "sticking",
            Expr::linear_sum([(tau.x, pd_x), (tau.y, pd_z)]),
            0.0,
        ));
    } else {
        for (axis, label) in AXES.iter().enumerate() {
            rows.push(Constraint::eq(format!("no_force.{label}"), c.force.get(axis, t), 0.0));
        }
        let hip_x = Expr::var(v.position.get(0, t)) + c.hip.get(0, t);
        let hip_z = Expr::var(v.position.get(1, t)) + c.hip.get(1, t);
        rows.extend(region.containment("hip_in_region", &hip_x, &hip_z));
    }
    rows
}
