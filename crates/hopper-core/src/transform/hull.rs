//! Convex-hull lowering of disjunctions
//!
//! For a disjunction over disjuncts `k` with indicators `y_k`, every free
//! variable `x` that appears in any disjunct is split into copies `x_k`:
//!
//! ```text
//! x = Σ_k x_k
//! lo·y_k ≤ x_k ≤ hi·y_k
//! a·x + c ≤ rhs   becomes   a·x_k + (c - rhs)·y_k ≤ 0     (same for ≥, =)
//! Σ_k y_k = 1
//! ```
//!
//! With `y_k = 0` the copy is pinned to zero and the row is vacuous; with
//! `y_k = 1` the copy carries `x` and the original row. The continuous
//! relaxation is the convex hull of the union of the disjunct polytopes,
//! which is never weaker than a big-M encoding.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use super::{exactly_one, validate_disjunctions, TransformReport, Transformation};
use crate::error::ModelError;
use crate::model::{Constraint, Derivation, Disjunct, Disjunction, Expr, Model, VarId};

/// Convex-hull (disaggregated) disjunction lowering
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvexHull;

impl Transformation for ConvexHull {
    fn name(&self) -> &'static str {
        "convex_hull"
    }

    fn apply(&self, model: &mut Model) -> Result<TransformReport, ModelError> {
        validate_disjunctions(model, true)?;
        let report = TransformReport::measure(self.name(), model, |model| {
            let disjunctions = model.take_disjunctions();
            for disjunction in &disjunctions {
                lower(model, disjunction)?;
            }
            Ok(disjunctions.len())
        })?;
        info!(
            disjunctions = report.items,
            variables = report.variables_added,
            constraints = report.constraints_added,
            "Lowered disjunctions to convex hull"
        );
        Ok(report)
    }
}

fn lower(model: &mut Model, disjunction: &Disjunction) -> Result<(), ModelError> {
    let disjuncts: Vec<Disjunct> = disjunction
        .disjuncts
        .iter()
        .map(|&id| model.disjunct(id).clone())
        .collect();

    let shared: BTreeSet<VarId> = disjuncts
        .iter()
        .flat_map(|d| d.constraints.iter())
        .flat_map(|c| c.expr.variables())
        .filter(|&id| model.fixed_value(id).is_none())
        .collect();

    let mut copies: Vec<BTreeMap<VarId, VarId>> = vec![BTreeMap::new(); disjuncts.len()];
    for &x in &shared {
        let bounds = model.effective_bounds(x);
        let mut aggregate = Expr::var(x);
        for (k, disjunct) in disjuncts.iter().enumerate() {
            let name = format!("{}@{}", model.var_name(x), disjunct.label);
            let copy = model.add_continuous(name.as_str(), bounds.with_zero())?;
            model.set_derivation(
                copy,
                Derivation::Product {
                    a: x,
                    b: disjunct.indicator,
                },
            );
            model.add_constraint(Constraint::le(
                format!("{name}.upper"),
                copy - bounds.upper * disjunct.indicator,
                0.0,
            ));
            model.add_constraint(Constraint::ge(
                format!("{name}.lower"),
                copy - bounds.lower * disjunct.indicator,
                0.0,
            ));
            aggregate -= Expr::var(copy);
            copies[k].insert(x, copy);
        }
        let name = format!("{}.{}.aggregate", model.var_name(x), disjunction.label);
        model.add_constraint(Constraint::eq(name, aggregate, 0.0));
    }

    for (k, disjunct) in disjuncts.iter().enumerate() {
        for constraint in &disjunct.constraints {
            let folded = constraint.expr.fold(|id| model.fixed_value(id));
            let mut expr = folded.rename(|id| copies[k].get(&id).copied().unwrap_or(id));
            let offset = expr.constant_term() - constraint.rhs;
            expr.add_constant(-expr.constant_term());
            expr.add_term(offset, disjunct.indicator);
            model.add_constraint(Constraint::new(
                format!("{}.{}", disjunct.label, constraint.name),
                expr,
                constraint.sense,
                0.0,
            ));
        }
    }

    let indicators: Vec<VarId> = disjuncts.iter().map(|d| d.indicator).collect();
    exactly_one(model, &disjunction.label, &indicators);

    debug!(
        disjunction = %disjunction.label,
        disjuncts = disjuncts.len(),
        disaggregated = shared.len(),
        "Lowered disjunction"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bounds;

    /// `x ≤ -1` or `x ≥ 1` over `x ∈ [-5, 5]`
    fn two_sided() -> (Model, VarId, VarId, VarId) {
        let mut model = Model::new("hull");
        let x = model.add_continuous("x", Bounds::symmetric(5.0)).unwrap();
        let left = model.add_disjunct("left").unwrap();
        model.add_disjunct_constraint(left, Constraint::le("upper", x, -1.0));
        let right = model.add_disjunct("right").unwrap();
        model.add_disjunct_constraint(right, Constraint::ge("lower", x, 1.0));
        model.add_disjunction("side", vec![left, right]);
        let yl = model.disjunct(left).indicator;
        let yr = model.disjunct(right).indicator;
        (model, x, yl, yr)
    }

    fn assignment(model: &Model, pairs: &[(VarId, f64)]) -> Vec<f64> {
        let mut values = model.default_assignment();
        for &(id, value) in pairs {
            values[id.index()] = value;
        }
        model.complete_assignment(&mut values);
        values
    }

    #[test]
    fn test_hull_report() {
        let (mut model, _, _, _) = two_sided();
        let report = ConvexHull.apply(&mut model).unwrap();
        assert_eq!(report.items, 1);
        // one copy of x per disjunct
        assert_eq!(report.variables_added, 2);
        // 2 bound rows per copy, aggregate, 2 disjunct rows, exactly-one
        assert_eq!(report.constraints_added, 8);
        assert!(model.disjunctions().is_empty());
        assert!(model.constraint_by_name("side.exactly_one").is_some());
    }

    #[test]
    fn test_hull_accepts_active_disjunct() {
        let (mut model, x, yl, yr) = two_sided();
        ConvexHull.apply(&mut model).unwrap();

        let values = assignment(&model, &[(x, 2.0), (yr, 1.0)]);
        assert!(model.is_feasible(&values, 1e-9));

        let values = assignment(&model, &[(x, -3.0), (yl, 1.0)]);
        assert!(model.is_feasible(&values, 1e-9));
    }

    #[test]
    fn test_hull_rejects_gap_and_wrong_disjunct() {
        let (mut model, x, yl, yr) = two_sided();
        ConvexHull.apply(&mut model).unwrap();

        let values = assignment(&model, &[(x, 0.0), (yr, 1.0)]);
        assert!(!model.is_feasible(&values, 1e-9));

        let values = assignment(&model, &[(x, 2.0), (yl, 1.0)]);
        assert!(!model.is_feasible(&values, 1e-9));

        let values = assignment(&model, &[(x, 2.0), (yl, 1.0), (yr, 1.0)]);
        let violations = model.violations(&values, 1e-9);
        assert!(violations.iter().any(|v| v.name == "side.exactly_one"));
    }

    #[test]
    fn test_fixed_variables_become_constants() {
        let mut model = Model::new("hull");
        let x = model.add_continuous("x", Bounds::symmetric(5.0)).unwrap();
        let h = model.add_continuous("h", Bounds::symmetric(5.0)).unwrap();
        model.fix(h, 2.0).unwrap();
        let above = model.add_disjunct("above").unwrap();
        model.add_disjunct_constraint(above, Constraint::ge("clear", x - h, 0.0));
        model.add_disjunction("only", vec![above]);

        let report = ConvexHull.apply(&mut model).unwrap();
        assert_eq!(report.variables_added, 1);
        let row = model.constraint_by_name("above.clear").unwrap();
        let y = model.disjunct(above).indicator;
        assert_eq!(row.expr.coefficient(h), 0.0);
        assert_eq!(row.expr.coefficient(y), -2.0);
    }

    #[test]
    fn test_nonlinear_disjunct_leaves_model_untouched() {
        let (mut model, x, _, _) = two_sided();
        let extra = model.add_disjunct("curved").unwrap();
        model.add_disjunct_constraint(extra, Constraint::le("square", x * x, 1.0));
        model.add_disjunction("bad", vec![extra]);
        let before = model.num_variables();

        let err = ConvexHull.apply(&mut model).unwrap_err();
        assert!(matches!(err, ModelError::NonlinearDisjunct { .. }));
        assert_eq!(model.num_variables(), before);
        assert_eq!(model.disjunctions().len(), 2);
    }

    #[test]
    fn test_empty_disjunction_is_rejected() {
        let mut model = Model::new("hull");
        model.add_disjunction("nothing", Vec::new());
        assert!(matches!(
            ConvexHull.apply(&mut model),
            Err(ModelError::EmptyDisjunction { .. })
        ));
    }
}
