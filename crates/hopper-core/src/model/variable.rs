//! Decision variables, domains and bounds

use std::fmt;

use serde::{Deserialize, Serialize};

use super::expr::Expr;

/// Arena index of a variable inside its [`Model`](super::Model)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Variable domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    Continuous,
    Binary,
    Integer,
}

impl Domain {
    pub fn is_discrete(self) -> bool {
        !matches!(self, Domain::Continuous)
    }
}

/// Closed interval `[lower, upper]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// `[-limit, limit]`
    pub fn symmetric(limit: f64) -> Self {
        Self::new(-limit, limit)
    }

    pub fn binary() -> Self {
        Self::new(0.0, 1.0)
    }

    pub fn fixed(value: f64) -> Self {
        Self::new(value, value)
    }

    /// Finite and ordered
    pub fn is_valid(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite() && self.lower <= self.upper
    }

    pub fn span(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64, tolerance: f64) -> bool {
        value >= self.lower - tolerance && value <= self.upper + tolerance
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    /// Image under multiplication by a scalar
    pub fn scaled(&self, factor: f64) -> Bounds {
        let a = self.lower * factor;
        let b = self.upper * factor;
        Bounds::new(a.min(b), a.max(b))
    }

    /// Image of `x * y` for `x` in `self`, `y` in `other`
    pub fn product(&self, other: &Bounds) -> Bounds {
        let corners = [
            self.lower * other.lower,
            self.lower * other.upper,
            self.upper * other.lower,
            self.upper * other.upper,
        ];
        let lower = corners.iter().copied().fold(f64::INFINITY, f64::min);
        let upper = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Bounds::new(lower, upper)
    }

    /// Image of `x * x`
    pub fn squared(&self) -> Bounds {
        let upper = (self.lower * self.lower).max(self.upper * self.upper);
        let lower = if self.lower <= 0.0 && self.upper >= 0.0 {
            0.0
        } else {
            (self.lower * self.lower).min(self.upper * self.upper)
        };
        Bounds::new(lower, upper)
    }

    /// Smallest interval containing both `self` and zero
    pub fn with_zero(&self) -> Bounds {
        Bounds::new(self.lower.min(0.0), self.upper.max(0.0))
    }
}

/// How the value of an auxiliary variable follows from other variables
///
/// Every auxiliary introduced by the piecewise encoder or a transformation
/// pass carries one, so an assignment of the original variables can be
/// completed into an assignment of the transformed model.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// `a * b`
    Product { a: VarId, b: VarId },
    /// `(source - offset) * digit`
    ShiftedProduct { source: VarId, offset: f64, digit: VarId },
    /// Value of a linear expression
    Expression(Expr),
    /// Digit `position` (1-based, most significant first) of the truncated
    /// radix-2 expansion of `(source - lower) / span` over `digits` places
    BinaryDigit { source: VarId, lower: f64, span: f64, position: u32, digits: u32 },
    /// Convex-combination weight of breakpoint `index` in a piecewise block
    PiecewiseWeight { block: usize, index: usize },
    /// Segment selector `index` in a piecewise block
    PiecewiseSegment { block: usize, index: usize },
    /// Interpolated output of a piecewise block
    PiecewiseOutput { block: usize },
}

/// A decision variable
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub domain: Domain,
    pub bounds: Bounds,
    /// Value the variable is pinned to, if any
    pub fixed: Option<f64>,
    /// Solver branching hint; higher is branched on first
    pub branch_priority: Option<i32>,
    pub derivation: Option<Derivation>,
}

impl Variable {
    pub fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }

    /// Bounds collapsed onto the fixed value when the variable is fixed
    pub fn effective_bounds(&self) -> Bounds {
        match self.fixed {
            Some(value) => Bounds::fixed(value),
            None => self.bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_validity() {
        assert!(Bounds::new(-1.0, 1.0).is_valid());
        assert!(Bounds::fixed(0.0).is_valid());
        assert!(!Bounds::new(1.0, -1.0).is_valid());
        assert!(!Bounds::new(f64::NEG_INFINITY, 0.0).is_valid());
        assert!(!Bounds::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_product_interval() {
        let a = Bounds::new(-2.0, 1.0);
        let b = Bounds::new(3.0, 5.0);
        assert_eq!(a.product(&b), Bounds::new(-10.0, 5.0));
        assert_eq!(a.squared(), Bounds::new(0.0, 4.0));
        assert_eq!(b.squared(), Bounds::new(9.0, 25.0));
    }

    #[test]
    fn test_with_zero() {
        assert_eq!(Bounds::new(0.05, 0.2).with_zero(), Bounds::new(0.0, 0.2));
        assert_eq!(Bounds::new(-1.0, -0.5).with_zero(), Bounds::new(-1.0, 0.0));
    }
}
