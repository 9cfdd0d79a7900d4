//! Linear and bilinear expressions over model variables

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use super::variable::{Bounds, VarId};

/// Sum of linear terms, bilinear products and a constant
///
/// Products are keyed by an ordered operand pair so that `a*b` and `b*a`
/// accumulate into the same term. Squares are products with `a == b`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expr {
    linear: BTreeMap<VarId, f64>,
    bilinear: BTreeMap<(VarId, VarId), f64>,
    constant: f64,
}

/// Canonical key for the product of two variables
pub fn product_key(a: VarId, b: VarId) -> (VarId, VarId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Expr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            ..Self::default()
        }
    }

    pub fn var(id: VarId) -> Self {
        Self::term(1.0, id)
    }

    pub fn term(coef: f64, id: VarId) -> Self {
        let mut expr = Self::zero();
        expr.add_term(coef, id);
        expr
    }

    pub fn product(a: VarId, b: VarId) -> Self {
        let mut expr = Self::zero();
        expr.add_product(1.0, a, b);
        expr
    }

    /// Sum of `coef * var` pairs
    pub fn linear_sum<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = (f64, VarId)>,
    {
        let mut expr = Self::zero();
        for (coef, id) in terms {
            expr.add_term(coef, id);
        }
        expr
    }

    pub fn add_term(&mut self, coef: f64, id: VarId) {
        if coef == 0.0 {
            return;
        }
        let entry = self.linear.entry(id).or_insert(0.0);
        *entry += coef;
        if *entry == 0.0 {
            self.linear.remove(&id);
        }
    }

    pub fn add_product(&mut self, coef: f64, a: VarId, b: VarId) {
        if coef == 0.0 {
            return;
        }
        let key = product_key(a, b);
        let entry = self.bilinear.entry(key).or_insert(0.0);
        *entry += coef;
        if *entry == 0.0 {
            self.bilinear.remove(&key);
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Add `scale * other` in place
    pub fn add_scaled(&mut self, other: &Expr, scale: f64) {
        for (&id, &coef) in &other.linear {
            self.add_term(scale * coef, id);
        }
        for (&(a, b), &coef) in &other.bilinear {
            self.add_product(scale * coef, a, b);
        }
        self.constant += scale * other.constant;
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        if factor == 0.0 {
            return Self::zero();
        }
        for coef in self.linear.values_mut() {
            *coef *= factor;
        }
        for coef in self.bilinear.values_mut() {
            *coef *= factor;
        }
        self.constant *= factor;
        self
    }

    pub fn linear_terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.linear.iter().map(|(&id, &coef)| (id, coef))
    }

    pub fn bilinear_terms(&self) -> impl Iterator<Item = (VarId, VarId, f64)> + '_ {
        self.bilinear.iter().map(|(&(a, b), &coef)| (a, b, coef))
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    pub fn coefficient(&self, id: VarId) -> f64 {
        self.linear.get(&id).copied().unwrap_or(0.0)
    }

    pub fn product_coefficient(&self, a: VarId, b: VarId) -> f64 {
        self.bilinear.get(&product_key(a, b)).copied().unwrap_or(0.0)
    }

    pub fn is_linear(&self) -> bool {
        self.bilinear.is_empty()
    }

    /// Remove a product term, returning its coefficient
    pub fn remove_product(&mut self, a: VarId, b: VarId) -> Option<f64> {
        self.bilinear.remove(&product_key(a, b))
    }

    /// Every variable referenced by the expression
    pub fn variables(&self) -> BTreeSet<VarId> {
        let mut vars: BTreeSet<VarId> = self.linear.keys().copied().collect();
        for &(a, b) in self.bilinear.keys() {
            vars.insert(a);
            vars.insert(b);
        }
        vars
    }

    /// Evaluate with one value per variable index
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let linear: f64 = self
            .linear
            .iter()
            .map(|(id, coef)| coef * values[id.index()])
            .sum();
        let bilinear: f64 = self
            .bilinear
            .iter()
            .map(|((a, b), coef)| coef * values[a.index()] * values[b.index()])
            .sum();
        self.constant + linear + bilinear
    }

    /// Replace variables with known values by constants
    ///
    /// A product with exactly one known operand becomes a linear term in the
    /// other operand.
    pub fn fold<F>(&self, known: F) -> Expr
    where
        F: Fn(VarId) -> Option<f64>,
    {
        let mut out = Expr::constant(self.constant);
        for (&id, &coef) in &self.linear {
            match known(id) {
                Some(value) => out.constant += coef * value,
                None => out.add_term(coef, id),
            }
        }
        for (&(a, b), &coef) in &self.bilinear {
            match (known(a), known(b)) {
                (Some(va), Some(vb)) => out.constant += coef * va * vb,
                (Some(va), None) => out.add_term(coef * va, b),
                (None, Some(vb)) => out.add_term(coef * vb, a),
                (None, None) => out.add_product(coef, a, b),
            }
        }
        out
    }

    /// Substitute each variable by a (possibly different) variable
    pub fn rename<F>(&self, map: F) -> Expr
    where
        F: Fn(VarId) -> VarId,
    {
        let mut out = Expr::constant(self.constant);
        for (&id, &coef) in &self.linear {
            out.add_term(coef, map(id));
        }
        for (&(a, b), &coef) in &self.bilinear {
            out.add_product(coef, map(a), map(b));
        }
        out
    }

    /// Interval enclosure of the expression over variable boxes
    pub fn bounds<F>(&self, lookup: F) -> Bounds
    where
        F: Fn(VarId) -> Bounds,
    {
        let mut lower = self.constant;
        let mut upper = self.constant;
        for (&id, &coef) in &self.linear {
            let range = lookup(id).scaled(coef);
            lower += range.lower;
            upper += range.upper;
        }
        for (&(a, b), &coef) in &self.bilinear {
            let range = if a == b {
                lookup(a).squared()
            } else {
                lookup(a).product(&lookup(b))
            }
            .scaled(coef);
            lower += range.lower;
            upper += range.upper;
        }
        Bounds { lower, upper }
    }
}

impl From<VarId> for Expr {
    fn from(id: VarId) -> Self {
        Expr::var(id)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

impl AddAssign<Expr> for Expr {
    fn add_assign(&mut self, rhs: Expr) {
        self.add_scaled(&rhs, 1.0);
    }
}

impl SubAssign<Expr> for Expr {
    fn sub_assign(&mut self, rhs: Expr) {
        self.add_scaled(&rhs, -1.0);
    }
}

impl Add<Expr> for Expr {
    type Output = Expr;
    fn add(mut self, rhs: Expr) -> Expr {
        self += rhs;
        self
    }
}

impl Sub<Expr> for Expr {
    type Output = Expr;
    fn sub(mut self, rhs: Expr) -> Expr {
        self -= rhs;
        self
    }
}

impl Add<VarId> for Expr {
    type Output = Expr;
    fn add(mut self, rhs: VarId) -> Expr {
        self.add_term(1.0, rhs);
        self
    }
}

impl Sub<VarId> for Expr {
    type Output = Expr;
    fn sub(mut self, rhs: VarId) -> Expr {
        self.add_term(-1.0, rhs);
        self
    }
}

impl Add<f64> for Expr {
    type Output = Expr;
    fn add(mut self, rhs: f64) -> Expr {
        self.constant += rhs;
        self
    }
}

impl Sub<f64> for Expr {
    type Output = Expr;
    fn sub(mut self, rhs: f64) -> Expr {
        self.constant -= rhs;
        self
    }
}

impl Mul<f64> for Expr {
    type Output = Expr;
    fn mul(self, rhs: f64) -> Expr {
        self.scaled(rhs)
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        rhs.scaled(self)
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        self.scaled(-1.0)
    }
}

impl Add<VarId> for VarId {
    type Output = Expr;
    fn add(self, rhs: VarId) -> Expr {
        Expr::var(self) + rhs
    }
}

impl Sub<VarId> for VarId {
    type Output = Expr;
    fn sub(self, rhs: VarId) -> Expr {
        Expr::var(self) - rhs
    }
}

impl Add<Expr> for VarId {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::var(self) + rhs
    }
}

impl Sub<Expr> for VarId {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::var(self) - rhs
    }
}

impl Mul<VarId> for VarId {
    type Output = Expr;
    fn mul(self, rhs: VarId) -> Expr {
        Expr::product(self, rhs)
    }
}

impl Mul<VarId> for f64 {
    type Output = Expr;
    fn mul(self, rhs: VarId) -> Expr {
        Expr::term(self, rhs)
    }
}

impl Mul<f64> for VarId {
    type Output = Expr;
    fn mul(self, rhs: f64) -> Expr {
        Expr::term(rhs, self)
    }
}

impl Neg for VarId {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::term(-1.0, self)
    }
}
