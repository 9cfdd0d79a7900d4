//! Piecewise-linear function encoder
//!
//! Approximates `y = f(x)` by interpolation between breakpoints using the
//! convex-combination formulation:
//!
//! ```text
//! x = Σᵢ λᵢ bᵢ          y = Σᵢ λᵢ f(bᵢ)
//! Σᵢ λᵢ = 1            λᵢ ≥ 0
//! Σⱼ zⱼ = 1            zⱼ ∈ {0, 1}   (one per segment)
//! λ₀ ≤ z₀,  λᵢ ≤ zᵢ₋₁ + zᵢ,  λₙ ≤ zₙ₋₁
//! ```
//!
//! The adjacency rows let at most two neighbouring weights be non-zero, so
//! the encoding is exact at every breakpoint and linear in between.

use tracing::debug;

use crate::error::ModelError;
use crate::model::{Bounds, Constraint, Derivation, Expr, Model, VarId};

/// Breakpoints and exact function values
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseSpec {
    breakpoints: Vec<f64>,
    values: Vec<f64>,
}

impl PiecewiseSpec {
    /// Breakpoints must be finite and strictly increasing, with one value each
    pub fn new(breakpoints: Vec<f64>, values: Vec<f64>) -> Result<Self, ModelError> {
        let invalid = |reason: &str| ModelError::InvalidBreakpoints {
            label: "breakpoints".to_string(),
            reason: reason.to_string(),
        };
        if breakpoints.len() < 2 {
            return Err(invalid("at least two breakpoints are required"));
        }
        if breakpoints.len() != values.len() {
            return Err(invalid("one value per breakpoint is required"));
        }
        if breakpoints.iter().chain(&values).any(|v| !v.is_finite()) {
            return Err(invalid("breakpoints and values must be finite"));
        }
        if breakpoints.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid("breakpoints must be strictly increasing"));
        }
        Ok(Self { breakpoints, values })
    }

    /// Sample `f` at the given breakpoints
    pub fn from_fn<F>(breakpoints: Vec<f64>, f: F) -> Result<Self, ModelError>
    where
        F: Fn(f64) -> f64,
    {
        let values = breakpoints.iter().map(|&x| f(x)).collect();
        Self::new(breakpoints, values)
    }

    /// `segments + 1` evenly spaced breakpoints over `[lower, upper]`
    pub fn uniform<F>(lower: f64, upper: f64, segments: usize, f: F) -> Result<Self, ModelError>
    where
        F: Fn(f64) -> f64,
    {
        if segments == 0 {
            return Err(ModelError::InvalidBreakpoints {
                label: "breakpoints".to_string(),
                reason: "at least one segment is required".to_string(),
            });
        }
        let step = (upper - lower) / segments as f64;
        let breakpoints = (0..=segments)
            .map(|i| if i == segments { upper } else { lower + i as f64 * step })
            .collect();
        Self::from_fn(breakpoints, f)
    }

    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn num_segments(&self) -> usize {
        self.breakpoints.len() - 1
    }

    pub fn domain(&self) -> Bounds {
        Bounds::new(self.breakpoints[0], self.breakpoints[self.breakpoints.len() - 1])
    }

    /// Index of the segment containing `x` (clamped to the domain)
    pub fn segment(&self, x: f64) -> usize {
        let x = self.domain().clamp(x);
        let last = self.num_segments() - 1;
        (0..last)
            .find(|&j| x <= self.breakpoints[j + 1])
            .unwrap_or(last)
    }

    /// Convex-combination weights of `x` (clamped to the domain)
    pub fn weights(&self, x: f64) -> Vec<f64> {
        let x = self.domain().clamp(x);
        let j = self.segment(x);
        let (lo, hi) = (self.breakpoints[j], self.breakpoints[j + 1]);
        let mut weights = vec![0.0; self.breakpoints.len()];
        let right = (x - lo) / (hi - lo);
        weights[j] = 1.0 - right;
        weights[j + 1] = right;
        weights
    }

    /// Piecewise-linear interpolant at `x` (clamped to the domain)
    pub fn interpolate(&self, x: f64) -> f64 {
        self.weights(x)
            .iter()
            .zip(&self.values)
            .map(|(w, v)| w * v)
            .sum()
    }
}

/// Encoding stored in the model so auxiliaries can be re-derived
#[derive(Debug, Clone)]
pub struct PiecewiseBlock {
    pub label: String,
    pub input: VarId,
    pub output: VarId,
    pub spec: PiecewiseSpec,
    pub weights: Vec<VarId>,
    pub segments: Vec<VarId>,
}

/// Handles to the auxiliaries created by [`encode`]
#[derive(Debug, Clone)]
pub struct PiecewiseEncoding {
    pub block: usize,
    pub weights: Vec<VarId>,
    pub segments: Vec<VarId>,
}

/// Encode `output = f(input)` into `model`
///
/// The breakpoints must bracket the bounds of `input`. `output` becomes a
/// derived variable: its value follows from `input` by interpolation.
pub fn encode(
    model: &mut Model,
    label: &str,
    input: VarId,
    output: VarId,
    spec: &PiecewiseSpec,
) -> Result<PiecewiseEncoding, ModelError> {
    let bounds = model.variable(input).bounds;
    let domain = spec.domain();
    if domain.lower > bounds.lower || domain.upper < bounds.upper {
        return Err(ModelError::InvalidBreakpoints {
            label: label.to_string(),
            reason: format!(
                "breakpoints [{}, {}] do not bracket {} in [{}, {}]",
                domain.lower,
                domain.upper,
                model.var_name(input),
                bounds.lower,
                bounds.upper
            ),
        });
    }

    let block = model.piecewise_blocks().len();
    let n = spec.breakpoints().len();

    let mut weights = Vec::with_capacity(n);
    for index in 0..n {
        let id = model.add_continuous(format!("{label}.lambda[{index}]"), Bounds::new(0.0, 1.0))?;
        model.set_derivation(id, Derivation::PiecewiseWeight { block, index });
        weights.push(id);
    }
    let mut segments = Vec::with_capacity(n - 1);
    for index in 0..n - 1 {
        let id = model.add_binary(format!("{label}.segment[{index}]"))?;
        model.set_derivation(id, Derivation::PiecewiseSegment { block, index });
        segments.push(id);
    }
    model.set_derivation(output, Derivation::PiecewiseOutput { block });

    let weight_sum = Expr::linear_sum(weights.iter().map(|&w| (1.0, w)));
    model.add_constraint(Constraint::eq(format!("{label}.convexity"), weight_sum, 1.0));

    let segment_sum = Expr::linear_sum(segments.iter().map(|&z| (1.0, z)));
    model.add_constraint(Constraint::eq(format!("{label}.one_segment"), segment_sum, 1.0));

    let input_combination =
        Expr::linear_sum(spec.breakpoints().iter().zip(&weights).map(|(&b, &w)| (b, w)));
    model.add_constraint(Constraint::eq(
        format!("{label}.input"),
        input_combination - input,
        0.0,
    ));

    let output_combination =
        Expr::linear_sum(spec.values().iter().zip(&weights).map(|(&v, &w)| (v, w)));
    model.add_constraint(Constraint::eq(
        format!("{label}.output"),
        output_combination - output,
        0.0,
    ));

    for (index, &weight) in weights.iter().enumerate() {
        let mut adjacency = Expr::var(weight);
        if index > 0 {
            adjacency.add_term(-1.0, segments[index - 1]);
        }
        if index < n - 1 {
            adjacency.add_term(-1.0, segments[index]);
        }
        model.add_constraint(Constraint::le(
            format!("{label}.adjacency[{index}]"),
            adjacency,
            0.0,
        ));
    }

    model.push_piecewise(PiecewiseBlock {
        label: label.to_string(),
        input,
        output,
        spec: spec.clone(),
        weights: weights.clone(),
        segments: segments.clone(),
    });

    debug!(
        label,
        breakpoints = n,
        "Encoded piecewise-linear function"
    );

    Ok(PiecewiseEncoding {
        block,
        weights,
        segments,
    })
}
