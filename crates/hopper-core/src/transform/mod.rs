//! Model transformation passes
//!
//! Each pass rewrites a [`Model`] in place. Lowering passes consume the
//! pending disjunctions; product passes consume the product tags matching
//! their treatment and leave every other term alone. A pass validates its
//! whole input before touching the model, so a failed pass leaves the model
//! as it found it.
//!
//! Typical order: lower disjunctions ([`ConvexHull`] or [`BigM`]), then treat
//! products ([`McCormickRelaxation`] or [`RadixLinearization`]), then
//! [`Model::flatten`].

pub mod bigm;
pub mod hull;
pub mod mccormick;
pub mod radix;

pub use bigm::BigM;
pub use hull::ConvexHull;
pub use mccormick::{EnvelopeRow, McCormickEnvelope, McCormickRelaxation};
pub use radix::{digit_count, truncated_digit, RadixLinearization};

use crate::error::ModelError;
use crate::model::{Constraint, Expr, Model, VarId};

/// A model-to-model rewrite
pub trait Transformation {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    /// Rewrite `model` in place
    fn apply(&self, model: &mut Model) -> Result<TransformReport, ModelError>;
}

/// What a pass did to a model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub pass: &'static str,
    /// Disjunctions lowered or product terms rewritten
    pub items: usize,
    pub variables_added: usize,
    pub constraints_added: usize,
}

impl TransformReport {
    pub(crate) fn measure<F>(pass: &'static str, model: &mut Model, body: F) -> Result<Self, ModelError>
    where
        F: FnOnce(&mut Model) -> Result<usize, ModelError>,
    {
        let variables = model.num_variables();
        let constraints = model.constraints().len();
        let items = body(model)?;
        Ok(Self {
            pass,
            items,
            variables_added: model.num_variables() - variables,
            constraints_added: model.constraints().len() - constraints,
        })
    }
}

/// Check every pending disjunction before a lowering pass mutates anything
pub(crate) fn validate_disjunctions(model: &Model, require_linear: bool) -> Result<(), ModelError> {
    for disjunction in model.disjunctions() {
        if disjunction.disjuncts.is_empty() {
            return Err(ModelError::EmptyDisjunction {
                disjunction: disjunction.label.clone(),
            });
        }
        if !require_linear {
            continue;
        }
        for &id in &disjunction.disjuncts {
            let disjunct = model.disjunct(id);
            if let Some(constraint) = disjunct.constraints.iter().find(|c| !c.is_linear()) {
                return Err(ModelError::NonlinearDisjunct {
                    disjunct: disjunct.label.clone(),
                    constraint: constraint.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Indicators of a disjunction sum to exactly one
pub(crate) fn exactly_one(model: &mut Model, label: &str, indicators: &[VarId]) {
    let sum = Expr::linear_sum(indicators.iter().map(|&y| (1.0, y)));
    model.add_constraint(Constraint::eq(format!("{label}.exactly_one"), sum, 1.0));
}
