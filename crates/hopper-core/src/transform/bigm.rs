//! Big-M lowering of disjunctions
//!
//! Each disjunct row is relaxed by a constant that is large enough to make
//! it vacuous when the indicator is zero:
//!
//! ```text
//! g(x) ≤ rhs   becomes   g(x) - rhs ≤ M (1 - y)
//! g(x) ≥ rhs   becomes   g(x) - rhs ≥ -M (1 - y)
//! ```
//!
//! Equalities are split into both inequalities. `M` is taken from interval
//! bounds of `g` over the variable boxes unless a fixed value is configured.
//! No auxiliaries are added, at the price of a weaker relaxation than the
//! convex hull.

use tracing::info;

use super::{exactly_one, validate_disjunctions, TransformReport, Transformation};
use crate::error::ModelError;
use crate::model::{Constraint, Disjunction, Expr, Model, Sense, VarId};

/// Big-M disjunction lowering
#[derive(Debug, Clone, Copy, Default)]
pub struct BigM {
    big_m: Option<f64>,
}

impl BigM {
    /// Derive each constant from variable bounds
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one constant for every row
    pub fn with_value(big_m: f64) -> Self {
        Self { big_m: Some(big_m) }
    }

    pub fn value(&self) -> Option<f64> {
        self.big_m
    }
}

impl Transformation for BigM {
    fn name(&self) -> &'static str {
        "big_m"
    }

    fn apply(&self, model: &mut Model) -> Result<TransformReport, ModelError> {
        if let Some(m) = self.big_m {
            if !(m.is_finite() && m > 0.0) {
                return Err(ModelError::InvalidBigM(m));
            }
        }
        validate_disjunctions(model, false)?;
        let report = TransformReport::measure(self.name(), model, |model| {
            let disjunctions = model.take_disjunctions();
            for disjunction in &disjunctions {
                self.lower(model, disjunction);
            }
            Ok(disjunctions.len())
        })?;
        info!(
            disjunctions = report.items,
            constraints = report.constraints_added,
            fixed_m = ?self.big_m,
            "Lowered disjunctions with big-M"
        );
        Ok(report)
    }
}

impl BigM {
    fn lower(&self, model: &mut Model, disjunction: &Disjunction) {
        let mut indicators = Vec::with_capacity(disjunction.disjuncts.len());
        for &id in &disjunction.disjuncts {
            let disjunct = model.disjunct(id).clone();
            for constraint in &disjunct.constraints {
                let range = constraint.expr.bounds(|v| model.effective_bounds(v));
                let name = format!("{}.{}", disjunct.label, constraint.name);
                match constraint.sense {
                    Sense::Le => {
                        let m = self.big_m.unwrap_or((range.upper - constraint.rhs).max(0.0));
                        model.add_constraint(relax_upper(name, constraint, disjunct.indicator, m));
                    }
                    Sense::Ge => {
                        let m = self.big_m.unwrap_or((constraint.rhs - range.lower).max(0.0));
                        model.add_constraint(relax_lower(name, constraint, disjunct.indicator, m));
                    }
                    Sense::Eq => {
                        let upper = self.big_m.unwrap_or((range.upper - constraint.rhs).max(0.0));
                        let lower = self.big_m.unwrap_or((constraint.rhs - range.lower).max(0.0));
                        model.add_constraint(relax_upper(
                            format!("{name}.le"),
                            constraint,
                            disjunct.indicator,
                            upper,
                        ));
                        model.add_constraint(relax_lower(
                            format!("{name}.ge"),
                            constraint,
                            disjunct.indicator,
                            lower,
                        ));
                    }
                }
            }
            indicators.push(disjunct.indicator);
        }
        exactly_one(model, &disjunction.label, &indicators);
    }
}

/// `g + M y ≤ rhs + M`
fn relax_upper(name: String, constraint: &Constraint, indicator: VarId, m: f64) -> Constraint {
    let mut expr: Expr = constraint.expr.clone();
    expr.add_term(m, indicator);
    Constraint::le(name, expr, constraint.rhs + m)
}

/// `g - M y ≥ rhs - M`
fn relax_lower(name: String, constraint: &Constraint, indicator: VarId, m: f64) -> Constraint {
    let mut expr: Expr = constraint.expr.clone();
    expr.add_term(-m, indicator);
    Constraint::ge(name, expr, constraint.rhs - m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bounds;

    #[test]
    fn test_bigm_constants_from_bounds() {
        let mut model = Model::new("bigm");
        let x = model.add_continuous("x", Bounds::symmetric(5.0)).unwrap();
        let left = model.add_disjunct("left").unwrap();
        model.add_disjunct_constraint(left, Constraint::le("upper", x, -1.0));
        let on = model.add_disjunct("on").unwrap();
        model.add_disjunct_constraint(on, Constraint::eq("pin", x, 2.0));
        model.add_disjunction("choice", vec![left, on]);
        let yl = model.disjunct(left).indicator;

        let report = BigM::new().apply(&mut model).unwrap();
        assert_eq!(report.variables_added, 0);
        assert_eq!(report.constraints_added, 4);

        // x + 1 ≤ 6 (1 - y): M = 5 - (-1)
        let row = model.constraint_by_name("left.upper").unwrap();
        assert_eq!(row.expr.coefficient(yl), 6.0);
        assert_eq!(row.rhs, 5.0);
        assert!(model.constraint_by_name("on.pin.le").is_some());
        assert!(model.constraint_by_name("on.pin.ge").is_some());
    }

    #[test]
    fn test_bigm_gates_rows() {
        let mut model = Model::new("bigm");
        let x = model.add_continuous("x", Bounds::symmetric(5.0)).unwrap();
        let left = model.add_disjunct("left").unwrap();
        model.add_disjunct_constraint(left, Constraint::le("upper", x, -1.0));
        let right = model.add_disjunct("right").unwrap();
        model.add_disjunct_constraint(right, Constraint::ge("lower", x, 1.0));
        model.add_disjunction("side", vec![left, right]);
        let yl = model.disjunct(left).indicator;
        let yr = model.disjunct(right).indicator;
        BigM::new().apply(&mut model).unwrap();

        let mut values = vec![0.0; model.num_variables()];
        values[x.index()] = -5.0;
        values[yl.index()] = 1.0;
        assert!(model.is_feasible(&values, 1e-9));

        values[x.index()] = 0.5;
        assert!(!model.is_feasible(&values, 1e-9));
        values[yl.index()] = 0.0;
        values[yr.index()] = 1.0;
        assert!(!model.is_feasible(&values, 1e-9));
    }

    #[test]
    fn test_invalid_override() {
        let mut model = Model::new("bigm");
        assert!(matches!(
            BigM::with_value(-1.0).apply(&mut model),
            Err(ModelError::InvalidBigM(_))
        ));
    }
}
