//! Algebraic constraints `expr (<= | == | >=) rhs`

use serde::{Deserialize, Serialize};

use super::expr::Expr;

/// Constraint sense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Le,
    Eq,
    Ge,
}

/// A named constraint
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expr: Expr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(name: impl Into<String>, expr: impl Into<Expr>, sense: Sense, rhs: f64) -> Self {
        Self {
            name: name.into(),
            expr: expr.into(),
            sense,
            rhs,
        }
    }

    pub fn le(name: impl Into<String>, expr: impl Into<Expr>, rhs: f64) -> Self {
        Self::new(name, expr, Sense::Le, rhs)
    }

    pub fn ge(name: impl Into<String>, expr: impl Into<Expr>, rhs: f64) -> Self {
        Self::new(name, expr, Sense::Ge, rhs)
    }

    pub fn eq(name: impl Into<String>, expr: impl Into<Expr>, rhs: f64) -> Self {
        Self::new(name, expr, Sense::Eq, rhs)
    }

    pub fn is_linear(&self) -> bool {
        self.expr.is_linear()
    }

    /// Amount by which an assignment violates the constraint (0 if satisfied)
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => (lhs - self.rhs).max(0.0),
            Sense::Ge => (self.rhs - lhs).max(0.0),
            Sense::Eq => (lhs - self.rhs).abs(),
        }
    }

    /// `(lower, upper)` row bounds, `None` meaning unbounded
    pub fn row_bounds(&self) -> (Option<f64>, Option<f64>) {
        match self.sense {
            Sense::Le => (None, Some(self.rhs)),
            Sense::Ge => (Some(self.rhs), None),
            Sense::Eq => (Some(self.rhs), Some(self.rhs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarId;

    #[test]
    fn test_violation() {
        let x = VarId(0);
        let le = Constraint::le("le", x, 1.0);
        let ge = Constraint::ge("ge", x, 1.0);
        let eq = Constraint::eq("eq", x, 1.0);

        assert_eq!(le.violation(&[0.5]), 0.0);
        assert_eq!(le.violation(&[1.5]), 0.5);
        assert_eq!(ge.violation(&[0.5]), 0.5);
        assert_eq!(eq.violation(&[0.75]), 0.25);
    }
}
