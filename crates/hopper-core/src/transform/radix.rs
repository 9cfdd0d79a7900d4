//! Exact radix linearization of product terms
//!
//! For a product `w = d·c` with `d` tagged as the discretized operand, `d`
//! is expanded into `k` binary digits over its range,
//!
//! ```text
//! d̂ = d_lo + Δd Σ_j 2^-j z_j        d̂ ≤ d ≤ d̂ + Δd 2^-k
//! ```
//!
//! and each digit gates a copy of the shifted continuous operand,
//! `u_j = (c - c_lo)·z_j`, through four linear rows. The product is then
//!
//! ```text
//! w = c_lo·d + d_lo·(c - c_lo) + Δd Σ_j 2^-j u_j
//! ```
//!
//! which differs from `d·c` by `(c - c_lo)(d̂ - d)`, at most `Δd Δc 2^-k` in
//! magnitude. Choosing `k = ⌈log₂(Δd Δc / precision)⌉` keeps the error within
//! the requested precision. Digits of one operand are shared by all of its
//! products and carry branch priority 1.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{TransformReport, Transformation};
use crate::error::ModelError;
use crate::model::{Bounds, Constraint, Derivation, Expr, Model, Treatment, VarId};

/// Digits beyond this exceed the resolution of `f64` over any useful range
pub const MAX_DIGITS: u32 = 48;

/// Branch priority given to every digit
pub const DIGIT_PRIORITY: i32 = 1;

/// Number of binary digits that keep `Δd Δc 2^-k` within `precision`
pub fn digit_count(span_d: f64, span_c: f64, precision: f64) -> u32 {
    let ratio = span_d * span_c / precision;
    if ratio <= 2.0 {
        1
    } else {
        ratio.log2().ceil() as u32
    }
}

/// Digit `position` (1-based) of the `digits`-place truncated expansion of
/// `fraction ∈ [0, 1]`
///
/// The fraction is capped at `1 - 2^-digits` so the expansion never rounds
/// up past the top of the range.
pub fn truncated_digit(fraction: f64, position: u32, digits: u32) -> f64 {
    if position == 0 || position > digits || digits > MAX_DIGITS {
        return 0.0;
    }
    let scale = (1u64 << digits) as f64;
    let top = (1u64 << digits) - 1;
    let mantissa = ((fraction.clamp(0.0, 1.0) * scale).floor() as u64).min(top);
    ((mantissa >> (digits - position)) & 1) as f64
}

/// Replace every product tagged [`Treatment::Discretize`] by its exact
/// digit expansion
#[derive(Debug, Clone, Copy)]
pub struct RadixLinearization {
    precision: f64,
}

impl RadixLinearization {
    pub fn new(precision: f64) -> Result<Self, ModelError> {
        if !(precision.is_finite() && precision > 0.0) {
            return Err(ModelError::InvalidPrecision(precision));
        }
        Ok(Self { precision })
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// Digit count required by every discretized operand, checked against
    /// [`MAX_DIGITS`]
    fn plan(&self, model: &Model) -> Result<BTreeMap<VarId, u32>, ModelError> {
        let mut digits: BTreeMap<VarId, u32> = BTreeMap::new();
        for (&(a, b), treatment) in model.tags() {
            let Treatment::Discretize { operand } = *treatment else {
                continue;
            };
            let other = if operand == a { b } else { a };
            let k = digit_count(
                model.effective_bounds(operand).span(),
                model.effective_bounds(other).span(),
                self.precision,
            );
            if k > MAX_DIGITS {
                return Err(ModelError::TooManyDigits {
                    a: model.var_name(a).to_string(),
                    b: model.var_name(b).to_string(),
                    required: k,
                    max: MAX_DIGITS,
                });
            }
            let entry = digits.entry(operand).or_insert(k);
            *entry = (*entry).max(k);
        }
        Ok(digits)
    }
}

impl Transformation for RadixLinearization {
    fn name(&self) -> &'static str {
        "radix"
    }

    fn apply(&self, model: &mut Model) -> Result<TransformReport, ModelError> {
        let plan = self.plan(model)?;
        let report = TransformReport::measure(self.name(), model, |model| {
            let mut expansions = BTreeMap::new();
            for (&operand, &k) in &plan {
                expansions.insert(operand, expand(model, operand, k)?);
            }
            let tagged = model.take_tags(|t| matches!(t, Treatment::Discretize { .. }));
            for &((a, b), treatment) in &tagged {
                let Treatment::Discretize { operand } = treatment else {
                    continue;
                };
                let other = if operand == a { b } else { a };
                if let Some(expansion) = expansions.get(&operand) {
                    linearize(model, expansion, other)?;
                }
            }
            Ok(tagged.len())
        })?;
        info!(
            products = report.items,
            operands = plan.len(),
            max_digits = plan.values().copied().max().unwrap_or(0),
            variables = report.variables_added,
            "Linearized products by radix expansion"
        );
        Ok(report)
    }
}

/// Digits of one discretized operand
struct Expansion {
    operand: VarId,
    bounds: Bounds,
    digits: Vec<VarId>,
}

fn expand(model: &mut Model, operand: VarId, k: u32) -> Result<Expansion, ModelError> {
    let bounds = model.effective_bounds(operand);
    let span = bounds.span();
    let name = model.var_name(operand).to_string();

    let mut digits = Vec::with_capacity(k as usize);
    let mut reconstruction = Expr::var(operand);
    for position in 1..=k {
        let z = model.add_binary(format!("{name}.digit[{position}]"))?;
        model.set_derivation(
            z,
            Derivation::BinaryDigit {
                source: operand,
                lower: bounds.lower,
                span,
                position,
                digits: k,
            },
        );
        model.set_branch_priority(z, DIGIT_PRIORITY)?;
        reconstruction.add_term(-span * weight(position), z);
        digits.push(z);
    }
    model.add_constraint(Constraint::ge(
        format!("{name}.radix.floor"),
        reconstruction.clone(),
        bounds.lower,
    ));
    model.add_constraint(Constraint::le(
        format!("{name}.radix.ceil"),
        reconstruction,
        bounds.lower + span * weight(k),
    ));
    debug!(operand = %name, digits = k, "Expanded discretized operand");
    Ok(Expansion {
        operand,
        bounds,
        digits,
    })
}

fn linearize(model: &mut Model, expansion: &Expansion, c: VarId) -> Result<(), ModelError> {
    let d = expansion.operand;
    let (d_bounds, c_bounds) = (expansion.bounds, model.effective_bounds(c));
    let span_d = d_bounds.span();
    let span_c = c_bounds.span();
    let label = format!("{}*{}", model.var_name(d), model.var_name(c));

    // w = c_lo·d + d_lo·c - d_lo·c_lo + Δd Σ 2^-j u_j
    let mut definition = Expr::term(c_bounds.lower, d);
    definition.add_term(d_bounds.lower, c);
    definition.add_constant(-d_bounds.lower * c_bounds.lower);

    for (j, &z) in expansion.digits.iter().enumerate() {
        let position = j as u32 + 1;
        let aux_name = format!("{label}.aux[{position}]");
        let u = model.add_continuous(aux_name.as_str(), Bounds::new(0.0, span_c))?;
        model.set_derivation(
            u,
            Derivation::ShiftedProduct {
                source: c,
                offset: c_bounds.lower,
                digit: z,
            },
        );
        model.add_constraint(Constraint::le(
            format!("{aux_name}.gate"),
            u - span_c * z,
            0.0,
        ));
        model.add_constraint(Constraint::le(
            format!("{aux_name}.follow_upper"),
            u - c,
            -c_bounds.lower,
        ));
        model.add_constraint(Constraint::ge(
            format!("{aux_name}.follow_lower"),
            u - c - span_c * z,
            -c_bounds.lower - span_c,
        ));
        definition.add_term(span_d * weight(position), u);
    }

    let error = span_d * span_c * weight(expansion.digits.len() as u32);
    let range = d_bounds.product(&c_bounds);
    let w = model.add_continuous(
        label.as_str(),
        Bounds::new(range.lower - error, range.upper + error),
    )?;
    model.set_derivation(w, Derivation::Expression(definition.clone()));
    model.add_constraint(Constraint::eq(
        format!("{label}.radix"),
        definition - w,
        0.0,
    ));
    let rewritten = model.substitute_product(d, c, w);
    debug!(product = %label, rewritten, error_bound = error, "Linearized product");
    Ok(())
}

/// `2^-position`
fn weight(position: u32) -> f64 {
    0.5f64.powi(position as i32)
}
