//! McCormick envelope relaxation of product terms
//!
//! A product `w = a·b` over the box `[a_lo, a_hi] × [b_lo, b_hi]` is replaced
//! by a fresh variable `w` and the four inequalities
//!
//! ```text
//! w ≥ a_lo·b + a·b_lo - a_lo·b_lo
//! w ≥ a_hi·b + a·b_hi - a_hi·b_hi
//! w ≤ a_lo·b + a·b_hi - a_lo·b_hi
//! w ≤ a_hi·b + a·b_lo - a_hi·b_lo
//! ```
//!
//! Every true product inside the box satisfies all four, and the envelope
//! is tight on the edges of the box. A relaxed solve is therefore a valid
//! bound for the original model, not a feasible point of it.

use tracing::{debug, info};

use super::{TransformReport, Transformation};
use crate::error::ModelError;
use crate::model::{Bounds, Constraint, Derivation, Model, Sense, Treatment, VarId};

/// One envelope inequality: `w (sense) coef_a·a + coef_b·b + constant`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeRow {
    pub label: &'static str,
    pub coef_a: f64,
    pub coef_b: f64,
    pub constant: f64,
    /// `Ge` for under-estimators, `Le` for over-estimators
    pub sense: Sense,
}

impl EnvelopeRow {
    pub fn estimate(&self, a: f64, b: f64) -> f64 {
        self.coef_a * a + self.coef_b * b + self.constant
    }

    /// Whether `w` lies on the admissible side, up to `tolerance`
    pub fn admits(&self, a: f64, b: f64, w: f64, tolerance: f64) -> bool {
        let estimate = self.estimate(a, b);
        match self.sense {
            Sense::Ge => w >= estimate - tolerance,
            Sense::Le => w <= estimate + tolerance,
            Sense::Eq => (w - estimate).abs() <= tolerance,
        }
    }
}

/// Envelope of `a·b` over a box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McCormickEnvelope {
    pub a: Bounds,
    pub b: Bounds,
}

impl McCormickEnvelope {
    pub fn new(a: Bounds, b: Bounds) -> Self {
        Self { a, b }
    }

    pub fn rows(&self) -> [EnvelopeRow; 4] {
        let (a, b) = (self.a, self.b);
        [
            EnvelopeRow {
                label: "under_lo",
                coef_a: b.lower,
                coef_b: a.lower,
                constant: -a.lower * b.lower,
                sense: Sense::Ge,
            },
            EnvelopeRow {
                label: "under_hi",
                coef_a: b.upper,
                coef_b: a.upper,
                constant: -a.upper * b.upper,
                sense: Sense::Ge,
            },
            EnvelopeRow {
                label: "over_lo",
                coef_a: b.upper,
                coef_b: a.lower,
                constant: -a.lower * b.upper,
                sense: Sense::Le,
            },
            EnvelopeRow {
                label: "over_hi",
                coef_a: b.lower,
                coef_b: a.upper,
                constant: -a.upper * b.lower,
                sense: Sense::Le,
            },
        ]
    }

    pub fn contains(&self, a: f64, b: f64, w: f64, tolerance: f64) -> bool {
        self.rows().iter().all(|row| row.admits(a, b, w, tolerance))
    }

    /// Interval `[max under-estimate, min over-estimate]` at `(a, b)`
    pub fn interval(&self, a: f64, b: f64) -> Bounds {
        let rows = self.rows();
        let lower = rows
            .iter()
            .filter(|r| r.sense == Sense::Ge)
            .map(|r| r.estimate(a, b))
            .fold(f64::NEG_INFINITY, f64::max);
        let upper = rows
            .iter()
            .filter(|r| r.sense == Sense::Le)
            .map(|r| r.estimate(a, b))
            .fold(f64::INFINITY, f64::min);
        Bounds { lower, upper }
    }
}

/// Replace every product tagged [`Treatment::Relax`] by its envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct McCormickRelaxation;

impl Transformation for McCormickRelaxation {
    fn name(&self) -> &'static str {
        "mccormick"
    }

    fn apply(&self, model: &mut Model) -> Result<TransformReport, ModelError> {
        let report = TransformReport::measure(self.name(), model, |model| {
            let tagged = model.take_tags(|t| *t == Treatment::Relax);
            for &((a, b), _) in &tagged {
                relax(model, a, b)?;
            }
            Ok(tagged.len())
        })?;
        info!(
            products = report.items,
            constraints = report.constraints_added,
            "Relaxed products with McCormick envelopes"
        );
        Ok(report)
    }
}

fn relax(model: &mut Model, a: VarId, b: VarId) -> Result<(), ModelError> {
    let (a_bounds, b_bounds) = (model.effective_bounds(a), model.effective_bounds(b));
    let range = if a == b {
        a_bounds.squared()
    } else {
        a_bounds.product(&b_bounds)
    };
    let label = format!("{}*{}", model.var_name(a), model.var_name(b));
    let w = model.add_continuous(label.as_str(), range)?;
    model.set_derivation(w, Derivation::Product { a, b });

    for row in McCormickEnvelope::new(a_bounds, b_bounds).rows() {
        let mut expr = -(row.coef_a * a);
        expr.add_term(-row.coef_b, b);
        expr.add_term(1.0, w);
        model.add_constraint(Constraint::new(
            format!("mccormick[{label}].{}", row.label),
            expr,
            row.sense,
            row.constant,
        ));
    }
    let rewritten = model.substitute_product(a, b, w);
    debug!(product = %label, rewritten, "Relaxed product");
    Ok(())
}
