//! Flat problem handed across the solver boundary
//!
//! Columns and rows are plain vectors indexed like the model arenas, so a
//! solver engine never needs to know about disjunctions, tags or
//! derivations.

use serde::{Deserialize, Serialize};

use super::{Domain, Model, ObjectiveSense};
use crate::error::ModelError;

/// Column of the flat problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatVariable {
    pub name: String,
    pub domain: Domain,
    pub lower: f64,
    pub upper: f64,
    pub branch_priority: Option<i32>,
}

/// Row `lower <= linear + bilinear <= upper`; `None` is unbounded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatRow {
    pub name: String,
    pub linear: Vec<(usize, f64)>,
    pub bilinear: Vec<(usize, usize, f64)>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl FlatRow {
    pub fn activity(&self, values: &[f64]) -> f64 {
        let linear: f64 = self.linear.iter().map(|&(j, a)| a * values[j]).sum();
        let bilinear: f64 = self
            .bilinear
            .iter()
            .map(|&(i, j, a)| a * values[i] * values[j])
            .sum();
        linear + bilinear
    }

    pub fn violation(&self, values: &[f64]) -> f64 {
        let activity = self.activity(values);
        let below = self.lower.map_or(0.0, |lo| lo - activity);
        let above = self.upper.map_or(0.0, |hi| activity - hi);
        below.max(above).max(0.0)
    }
}

/// Objective with linear and quadratic parts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatObjective {
    pub sense: ObjectiveSense,
    pub linear: Vec<(usize, f64)>,
    pub quadratic: Vec<(usize, usize, f64)>,
    pub constant: f64,
}

impl FlatObjective {
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let linear: f64 = self.linear.iter().map(|&(j, a)| a * values[j]).sum();
        let quadratic: f64 = self
            .quadratic
            .iter()
            .map(|&(i, j, a)| a * values[i] * values[j])
            .sum();
        self.constant + linear + quadratic
    }
}

/// Structural class of a flat problem, used to pick a compatible engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemClass {
    Linear,
    MixedIntegerLinear,
    Nonlinear,
    MixedIntegerNonlinear,
}

impl ProblemClass {
    pub fn is_mixed_integer(self) -> bool {
        matches!(
            self,
            ProblemClass::MixedIntegerLinear | ProblemClass::MixedIntegerNonlinear
        )
    }

    pub fn is_nonlinear(self) -> bool {
        matches!(
            self,
            ProblemClass::Nonlinear | ProblemClass::MixedIntegerNonlinear
        )
    }
}

/// Fully lowered problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatProblem {
    pub name: String,
    pub variables: Vec<FlatVariable>,
    pub rows: Vec<FlatRow>,
    pub objective: Option<FlatObjective>,
}

impl FlatProblem {
    pub(crate) fn from_model(model: Model) -> Result<Self, ModelError> {
        if !model.disjunctions.is_empty() {
            return Err(ModelError::UnloweredDisjunctions {
                count: model.disjunctions.len(),
            });
        }

        let known = |id: super::VarId| model.variables[id.index()].fixed;

        let variables = model
            .variables
            .iter()
            .map(|v| {
                let bounds = v.effective_bounds();
                FlatVariable {
                    name: v.name.clone(),
                    domain: v.domain,
                    lower: bounds.lower,
                    upper: bounds.upper,
                    branch_priority: v.branch_priority,
                }
            })
            .collect();

        let rows = model
            .constraints
            .iter()
            .map(|c| {
                let expr = &c.expr;
                let mut linear: Vec<(usize, f64)> =
                    expr.linear_terms().map(|(id, a)| (id.index(), a)).collect();
                let mut bilinear = Vec::new();
                let mut constant = expr.constant_term();
                for (a, b, coef) in expr.bilinear_terms() {
                    match (known(a), known(b)) {
                        (Some(va), Some(vb)) => constant += coef * va * vb,
                        (Some(va), None) => linear.push((b.index(), coef * va)),
                        (None, Some(vb)) => linear.push((a.index(), coef * vb)),
                        (None, None) => bilinear.push((a.index(), b.index(), coef)),
                    }
                }
                let (lower, upper) = c.row_bounds();
                FlatRow {
                    name: c.name.clone(),
                    linear: merge(linear),
                    bilinear,
                    lower: lower.map(|lo| lo - constant),
                    upper: upper.map(|hi| hi - constant),
                }
            })
            .collect();

        let objective = model.objective.as_ref().map(|obj| FlatObjective {
            sense: obj.sense,
            linear: obj.expr.linear_terms().map(|(id, a)| (id.index(), a)).collect(),
            quadratic: obj
                .expr
                .bilinear_terms()
                .map(|(a, b, coef)| (a.index(), b.index(), coef))
                .collect(),
            constant: obj.expr.constant_term(),
        });

        Ok(Self {
            name: model.name,
            variables,
            rows,
            objective,
        })
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn class(&self) -> ProblemClass {
        let discrete = self
            .variables
            .iter()
            .any(|v| v.domain.is_discrete() && v.lower < v.upper);
        let nonlinear = self.rows.iter().any(|r| !r.bilinear.is_empty());
        match (discrete, nonlinear) {
            (false, false) => ProblemClass::Linear,
            (true, false) => ProblemClass::MixedIntegerLinear,
            (false, true) => ProblemClass::Nonlinear,
            (true, true) => ProblemClass::MixedIntegerNonlinear,
        }
    }

    /// Largest bound, integrality or row violation of an assignment
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        let column = self
            .variables
            .iter()
            .zip(values)
            .map(|(v, &x)| {
                let bound = (v.lower - x).max(x - v.upper).max(0.0);
                let integrality = if v.domain.is_discrete() {
                    (x - x.round()).abs()
                } else {
                    0.0
                };
                bound.max(integrality)
            })
            .fold(0.0, f64::max);
        self.rows
            .iter()
            .map(|r| r.violation(values))
            .fold(column, f64::max)
    }

    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        values.len() == self.variables.len() && self.max_violation(values) <= tolerance
    }
}

fn merge(mut terms: Vec<(usize, f64)>) -> Vec<(usize, f64)> {
    terms.sort_by_key(|&(j, _)| j);
    let mut out: Vec<(usize, f64)> = Vec::with_capacity(terms.len());
    for (j, a) in terms {
        match out.last_mut() {
            Some(last) if last.0 == j => last.1 += a,
            _ => out.push((j, a)),
        }
    }
    out.retain(|&(_, a)| a != 0.0);
    out
}
