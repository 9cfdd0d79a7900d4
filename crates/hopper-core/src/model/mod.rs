//! Symbolic optimization model
//!
//! Variables, constraints and disjuncts live in flat arenas and are referred
//! to by index ([`VarId`], [`DisjunctId`]). Nothing is ever removed from an
//! arena: transformation passes append auxiliaries and constraints, or
//! replace the product terms they were asked to treat.

mod constraint;
mod disjunction;
mod expr;
mod flat;
mod variable;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::piecewise::PiecewiseBlock;
use crate::transform::radix::truncated_digit;

pub use constraint::{Constraint, Sense};
pub use disjunction::{Disjunct, DisjunctId, Disjunction};
pub use expr::{product_key, Expr};
pub use flat::{FlatObjective, FlatProblem, FlatRow, FlatVariable, ProblemClass};
pub use variable::{Bounds, Derivation, Domain, VarId, Variable};

/// Treatment requested for a product term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Treatment {
    /// McCormick envelope relaxation
    Relax,
    /// Exact radix linearization with `operand` as the discretized factor
    Discretize { operand: VarId },
}

impl Treatment {
    pub fn name(&self) -> &'static str {
        match self {
            Treatment::Relax => "relaxation",
            Treatment::Discretize { .. } => "discretization",
        }
    }
}

/// Optimization direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

/// Objective function
#[derive(Debug, Clone)]
pub struct Objective {
    pub sense: ObjectiveSense,
    pub expr: Expr,
}

/// Size summary of a model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelStats {
    pub variables: usize,
    pub discrete_variables: usize,
    pub fixed_variables: usize,
    pub constraints: usize,
    pub product_terms: usize,
    pub disjuncts: usize,
    pub disjunctions: usize,
}

/// A constraint violated by an assignment
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub name: String,
    pub amount: f64,
}

/// Symbolic optimization model
#[derive(Debug, Clone, Default)]
pub struct Model {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    disjuncts: Vec<Disjunct>,
    disjunctions: Vec<Disjunction>,
    piecewise: Vec<PiecewiseBlock>,
    tags: BTreeMap<(VarId, VarId), Treatment>,
    objective: Option<Objective>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Add a variable; bounds must be finite with `lower <= upper`
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        domain: Domain,
        bounds: Bounds,
    ) -> Result<VarId, ModelError> {
        let name = name.into();
        let valid_domain = match domain {
            Domain::Binary => bounds.lower >= 0.0 && bounds.upper <= 1.0,
            _ => true,
        };
        if !bounds.is_valid() || !valid_domain {
            return Err(ModelError::InvalidBounds {
                name,
                lower: bounds.lower,
                upper: bounds.upper,
            });
        }
        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            name,
            domain,
            bounds,
            fixed: None,
            branch_priority: None,
            derivation: None,
        });
        Ok(id)
    }

    pub fn add_continuous(
        &mut self,
        name: impl Into<String>,
        bounds: Bounds,
    ) -> Result<VarId, ModelError> {
        self.add_variable(name, Domain::Continuous, bounds)
    }

    pub fn add_binary(&mut self, name: impl Into<String>) -> Result<VarId, ModelError> {
        self.add_variable(name, Domain::Binary, Bounds::binary())
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn var_name(&self, id: VarId) -> &str {
        &self.variables[id.0].name
    }

    /// Bounds used by the passes: collapsed onto the value of fixed variables
    pub fn effective_bounds(&self, id: VarId) -> Bounds {
        self.variables[id.0].effective_bounds()
    }

    pub fn fixed_value(&self, id: VarId) -> Option<f64> {
        self.variables[id.0].fixed
    }

    fn check(&self, id: VarId) -> Result<(), ModelError> {
        if id.0 < self.variables.len() {
            Ok(())
        } else {
            Err(ModelError::UnknownVariable(id.0))
        }
    }

    pub fn set_bounds(&mut self, id: VarId, bounds: Bounds) -> Result<(), ModelError> {
        self.check(id)?;
        if !bounds.is_valid() {
            return Err(ModelError::InvalidBounds {
                name: self.variables[id.0].name.clone(),
                lower: bounds.lower,
                upper: bounds.upper,
            });
        }
        self.variables[id.0].bounds = bounds;
        Ok(())
    }

    /// Pin a variable to a value inside its bounds
    pub fn fix(&mut self, id: VarId, value: f64) -> Result<(), ModelError> {
        self.check(id)?;
        let var = &mut self.variables[id.0];
        if !value.is_finite() || !var.bounds.contains(value, 0.0) {
            return Err(ModelError::FixOutOfBounds {
                name: var.name.clone(),
                value,
                lower: var.bounds.lower,
                upper: var.bounds.upper,
            });
        }
        var.fixed = Some(value);
        Ok(())
    }

    pub fn unfix(&mut self, id: VarId) -> Result<(), ModelError> {
        self.check(id)?;
        self.variables[id.0].fixed = None;
        Ok(())
    }

    /// Fix every binary and integer variable to its (rounded) value
    ///
    /// Leaves a continuous problem for a fixed combinatorial choice.
    pub fn fix_discrete(&mut self, values: &[f64]) -> Result<usize, ModelError> {
        let mut count = 0;
        for index in 0..self.variables.len() {
            if self.variables[index].domain.is_discrete() {
                let value = values
                    .get(index)
                    .copied()
                    .ok_or(ModelError::UnknownVariable(index))?
                    .round();
                self.fix(VarId(index), value)?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Release every fixed binary and integer variable
    pub fn unfix_discrete(&mut self) -> usize {
        let mut count = 0;
        for var in &mut self.variables {
            if var.domain.is_discrete() && var.fixed.take().is_some() {
                count += 1;
            }
        }
        count
    }

    pub fn set_branch_priority(&mut self, id: VarId, priority: i32) -> Result<(), ModelError> {
        self.check(id)?;
        self.variables[id.0].branch_priority = Some(priority);
        Ok(())
    }

    pub(crate) fn set_derivation(&mut self, id: VarId, derivation: Derivation) {
        self.variables[id.0].derivation = Some(derivation);
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    pub fn add_constraint(&mut self, constraint: Constraint) -> usize {
        self.constraints.push(constraint);
        self.constraints.len() - 1
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint_by_name(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Replace every `a * b` term by the same multiple of `w`, in plain and
    /// disjunct constraints; returns the number of rewritten constraints
    pub(crate) fn substitute_product(&mut self, a: VarId, b: VarId, w: VarId) -> usize {
        let disjunct_constraints = self
            .disjuncts
            .iter_mut()
            .flat_map(|d| d.constraints.iter_mut());
        let mut rewritten = 0;
        for constraint in self.constraints.iter_mut().chain(disjunct_constraints) {
            if let Some(coef) = constraint.expr.remove_product(a, b) {
                constraint.expr.add_term(coef, w);
                rewritten += 1;
            }
        }
        rewritten
    }

    // ------------------------------------------------------------------
    // Disjunctions
    // ------------------------------------------------------------------

    /// Create an empty disjunct with a fresh binary indicator
    pub fn add_disjunct(&mut self, label: impl Into<String>) -> Result<DisjunctId, ModelError> {
        let label = label.into();
        let indicator = self.add_binary(format!("{label}.indicator"))?;
        self.disjuncts.push(Disjunct {
            label,
            indicator,
            constraints: Vec::new(),
        });
        Ok(DisjunctId(self.disjuncts.len() - 1))
    }

    pub fn add_disjunct_constraint(&mut self, disjunct: DisjunctId, constraint: Constraint) {
        self.disjuncts[disjunct.0].constraints.push(constraint);
    }

    pub fn disjunct(&self, id: DisjunctId) -> &Disjunct {
        &self.disjuncts[id.0]
    }

    pub fn add_disjunction(&mut self, label: impl Into<String>, disjuncts: Vec<DisjunctId>) -> usize {
        self.disjunctions.push(Disjunction {
            label: label.into(),
            disjuncts,
        });
        self.disjunctions.len() - 1
    }

    pub fn disjunctions(&self) -> &[Disjunction] {
        &self.disjunctions
    }

    /// Hand every pending disjunction to a lowering pass
    pub(crate) fn take_disjunctions(&mut self) -> Vec<Disjunction> {
        std::mem::take(&mut self.disjunctions)
    }

    // ------------------------------------------------------------------
    // Piecewise blocks
    // ------------------------------------------------------------------

    pub(crate) fn push_piecewise(&mut self, block: PiecewiseBlock) -> usize {
        self.piecewise.push(block);
        self.piecewise.len() - 1
    }

    pub fn piecewise_blocks(&self) -> &[PiecewiseBlock] {
        &self.piecewise
    }

    // ------------------------------------------------------------------
    // Product tags
    // ------------------------------------------------------------------

    /// Request a treatment for the product `a * b`
    ///
    /// A product is handled by exactly one pass; tagging it for a different
    /// treatment is an error.
    pub fn tag_product(&mut self, a: VarId, b: VarId, treatment: Treatment) -> Result<(), ModelError> {
        self.check(a)?;
        self.check(b)?;
        if let Treatment::Discretize { operand } = treatment {
            if operand != a && operand != b {
                return Err(ModelError::NotAnOperand {
                    a: self.var_name(a).to_string(),
                    b: self.var_name(b).to_string(),
                    discretized: self.var_name(operand).to_string(),
                });
            }
        }
        let key = product_key(a, b);
        match self.tags.get(&key) {
            Some(existing) if *existing != treatment => Err(ModelError::ConflictingTag {
                a: self.var_name(a).to_string(),
                b: self.var_name(b).to_string(),
                existing: existing.name(),
            }),
            _ => {
                self.tags.insert(key, treatment);
                Ok(())
            }
        }
    }

    /// Tag every product of two free variables for which `select` returns a
    /// treatment; returns the number of newly tagged products
    pub fn tag_products<F>(&mut self, mut select: F) -> Result<usize, ModelError>
    where
        F: FnMut(&Model, VarId, VarId) -> Option<Treatment>,
    {
        let mut selected = Vec::new();
        for (a, b) in self.free_products() {
            if self.tags.contains_key(&(a, b)) {
                continue;
            }
            if let Some(treatment) = select(self, a, b) {
                selected.push((a, b, treatment));
            }
        }
        let count = selected.len();
        for (a, b, treatment) in selected {
            self.tag_product(a, b, treatment)?;
        }
        Ok(count)
    }

    pub fn tags(&self) -> &BTreeMap<(VarId, VarId), Treatment> {
        &self.tags
    }

    pub(crate) fn take_tags<F>(&mut self, mut matches: F) -> Vec<((VarId, VarId), Treatment)>
    where
        F: FnMut(&Treatment) -> bool,
    {
        let keys: Vec<_> = self
            .tags
            .iter()
            .filter(|(_, t)| matches(t))
            .map(|(k, t)| (*k, *t))
            .collect();
        for (key, _) in &keys {
            self.tags.remove(key);
        }
        keys
    }

    /// Distinct products in constraints whose operands are both free
    pub fn free_products(&self) -> Vec<(VarId, VarId)> {
        let mut products = std::collections::BTreeSet::new();
        let disjunct_constraints = self.disjuncts.iter().flat_map(|d| d.constraints.iter());
        for constraint in self.constraints.iter().chain(disjunct_constraints) {
            for (a, b, _) in constraint.expr.bilinear_terms() {
                if !self.variables[a.0].is_fixed() && !self.variables[b.0].is_fixed() {
                    products.insert((a, b));
                }
            }
        }
        products.into_iter().collect()
    }

    // ------------------------------------------------------------------
    // Objective
    // ------------------------------------------------------------------

    pub fn set_objective(&mut self, sense: ObjectiveSense, expr: Expr) {
        self.objective = Some(Objective { sense, expr });
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    // ------------------------------------------------------------------
    // Assignments
    // ------------------------------------------------------------------

    /// An assignment with every variable at its fixed value or lower bound
    pub fn default_assignment(&self) -> Vec<f64> {
        self.variables
            .iter()
            .map(|v| v.fixed.unwrap_or(v.bounds.lower))
            .collect()
    }

    /// Fill in every derived auxiliary from the values it depends on
    ///
    /// Fixed variables take their fixed value. Auxiliaries are evaluated in
    /// creation order, which is also dependency order.
    pub fn complete_assignment(&self, values: &mut Vec<f64>) {
        values.resize(self.variables.len(), 0.0);
        for index in 0..self.variables.len() {
            let var = &self.variables[index];
            if let Some(value) = var.fixed {
                values[index] = value;
                continue;
            }
            if let Some(derivation) = &var.derivation {
                values[index] = self.derive(derivation, values);
            }
        }
    }

    fn derive(&self, derivation: &Derivation, values: &[f64]) -> f64 {
        match derivation {
            Derivation::Product { a, b } => values[a.0] * values[b.0],
            Derivation::ShiftedProduct { source, offset, digit } => {
                (values[source.0] - offset) * values[digit.0]
            }
            Derivation::Expression(expr) => expr.evaluate(values),
            Derivation::BinaryDigit { source, lower, span, position, digits } => {
                let fraction = if *span > 0.0 {
                    (values[source.0] - lower) / span
                } else {
                    0.0
                };
                truncated_digit(fraction, *position, *digits)
            }
            Derivation::PiecewiseWeight { block, index } => {
                let block = &self.piecewise[*block];
                block.spec.weights(values[block.input.0])[*index]
            }
            Derivation::PiecewiseSegment { block, index } => {
                let block = &self.piecewise[*block];
                if block.spec.segment(values[block.input.0]) == *index {
                    1.0
                } else {
                    0.0
                }
            }
            Derivation::PiecewiseOutput { block } => {
                let block = &self.piecewise[*block];
                block.spec.interpolate(values[block.input.0])
            }
        }
    }

    /// Every bound, integrality and constraint violation above `tolerance`
    ///
    /// Disjunctions that have not been lowered yet are checked logically:
    /// their indicators must sum to one and the constraints of the active
    /// disjunct must hold.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<Violation> {
        let mut out = Vec::new();
        for (var, &value) in self.variables.iter().zip(values) {
            let bounds = var.effective_bounds();
            if !bounds.contains(value, tolerance) {
                let amount = (bounds.lower - value).max(value - bounds.upper);
                out.push(Violation {
                    name: format!("{}.bounds", var.name),
                    amount,
                });
            }
            if var.domain.is_discrete() && (value - value.round()).abs() > tolerance {
                out.push(Violation {
                    name: format!("{}.integrality", var.name),
                    amount: (value - value.round()).abs(),
                });
            }
        }
        for constraint in &self.constraints {
            let amount = constraint.violation(values);
            if amount > tolerance {
                out.push(Violation {
                    name: constraint.name.clone(),
                    amount,
                });
            }
        }
        for disjunction in &self.disjunctions {
            let active: f64 = disjunction
                .disjuncts
                .iter()
                .map(|d| values[self.disjuncts[d.0].indicator.0])
                .sum();
            if (active - 1.0).abs() > tolerance {
                out.push(Violation {
                    name: format!("{}.exactly_one", disjunction.label),
                    amount: (active - 1.0).abs(),
                });
            }
            for id in &disjunction.disjuncts {
                let disjunct = &self.disjuncts[id.0];
                if values[disjunct.indicator.0] < 0.5 {
                    continue;
                }
                for constraint in &disjunct.constraints {
                    let amount = constraint.violation(values);
                    if amount > tolerance {
                        out.push(Violation {
                            name: format!("{}.{}", disjunct.label, constraint.name),
                            amount,
                        });
                    }
                }
            }
        }
        out
    }

    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        self.violations(values, tolerance).is_empty()
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            variables: self.variables.len(),
            discrete_variables: self.variables.iter().filter(|v| v.domain.is_discrete()).count(),
            fixed_variables: self.variables.iter().filter(|v| v.is_fixed()).count(),
            constraints: self.constraints.len(),
            product_terms: self.free_products().len(),
            disjuncts: self.disjuncts.len(),
            disjunctions: self.disjunctions.len(),
        }
    }

    /// Consume the model into the flat form handed to a solver engine
    ///
    /// Every disjunction must have been lowered. Fixed variables keep their
    /// column with collapsed bounds; products with a fixed operand are
    /// folded into linear terms.
    pub fn flatten(self) -> Result<FlatProblem, ModelError> {
        FlatProblem::from_model(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_variable_rejects_bad_bounds() {
        let mut model = Model::new("test");
        let err = model
            .add_continuous("x", Bounds::new(1.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidBounds { .. }));
        assert!(model
            .add_continuous("y", Bounds::new(0.0, f64::INFINITY))
            .is_err());
        assert!(model
            .add_variable("z", Domain::Binary, Bounds::new(0.0, 2.0))
            .is_err());
    }

    #[test]
    fn test_fix_and_unfix_discrete() {
        let mut model = Model::new("test");
        let x = model.add_continuous("x", Bounds::symmetric(1.0)).unwrap();
        let y = model.add_binary("y").unwrap();
        let values = vec![0.3, 0.9999];

        assert_eq!(model.fix_discrete(&values).unwrap(), 1);
        assert_eq!(model.fixed_value(y), Some(1.0));
        assert_eq!(model.fixed_value(x), None);

        assert_eq!(model.unfix_discrete(), 1);
        assert_eq!(model.fixed_value(y), None);
    }

    #[test]
    fn test_fix_out_of_bounds() {
        let mut model = Model::new("test");
        let x = model.add_continuous("x", Bounds::new(0.05, 0.2)).unwrap();
        assert!(matches!(
            model.fix(x, 0.5),
            Err(ModelError::FixOutOfBounds { .. })
        ));
        assert!(model.fix(x, 0.1).is_ok());
    }

    #[test]
    fn test_conflicting_tags() {
        let mut model = Model::new("test");
        let a = model.add_continuous("a", Bounds::symmetric(1.0)).unwrap();
        let b = model.add_continuous("b", Bounds::symmetric(1.0)).unwrap();
        let c = model.add_continuous("c", Bounds::symmetric(1.0)).unwrap();

        model.tag_product(a, b, Treatment::Relax).unwrap();
        model.tag_product(b, a, Treatment::Relax).unwrap();
        assert!(matches!(
            model.tag_product(a, b, Treatment::Discretize { operand: a }),
            Err(ModelError::ConflictingTag { .. })
        ));
        assert!(matches!(
            model.tag_product(a, b, Treatment::Discretize { operand: c }),
            Err(ModelError::NotAnOperand { .. })
        ));
    }

    #[test]
    fn test_free_products_skip_fixed_operands() {
        let mut model = Model::new("test");
        let dt = model.add_continuous("dt", Bounds::new(0.05, 0.2)).unwrap();
        let v = model.add_continuous("v", Bounds::symmetric(10.0)).unwrap();
        let f = model.add_continuous("f", Bounds::symmetric(10.0)).unwrap();
        model.add_constraint(Constraint::eq("c", dt * v + v * f, 0.0));

        assert_eq!(model.free_products().len(), 2);
        model.fix(dt, 0.1).unwrap();
        assert_eq!(model.free_products(), vec![product_key(v, f)]);
    }

    #[test]
    fn test_unlowered_disjunction_is_checked_logically() {
        let mut model = Model::new("test");
        let x = model.add_continuous("x", Bounds::symmetric(5.0)).unwrap();
        let left = model.add_disjunct("left").unwrap();
        model.add_disjunct_constraint(left, Constraint::le("upper", x, -1.0));
        let right = model.add_disjunct("right").unwrap();
        model.add_disjunct_constraint(right, Constraint::ge("lower", x, 1.0));
        model.add_disjunction("side", vec![left, right]);

        let yl = model.disjunct(left).indicator;
        let yr = model.disjunct(right).indicator;
        let mut values = vec![0.0; model.num_variables()];
        values[x.index()] = 2.0;
        values[yr.index()] = 1.0;
        assert!(model.is_feasible(&values, 1e-9));

        values[yr.index()] = 0.0;
        values[yl.index()] = 1.0;
        let violations = model.violations(&values, 1e-9);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].name, "left.upper");
    }
}
