//! Error types for model construction and transformation

use thiserror::Error;

/// Broad classification of a [`ModelError`]
///
/// Both kinds are fatal: construction aborts instead of producing a
/// partially built model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input detected before any constraint is generated
    Configuration,
    /// Inconsistency discovered while lowering or linearizing a model
    Transformation,
}

/// Errors raised by the symbolic model and its transformation passes
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("variable {name}: invalid bounds [{lower}, {upper}]")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("variable id {0} does not belong to this model")]
    UnknownVariable(usize),

    #[error("cannot fix {name} to {value}: outside [{lower}, {upper}]")]
    FixOutOfBounds { name: String, value: f64, lower: f64, upper: f64 },

    #[error("piecewise {label}: {reason}")]
    InvalidBreakpoints { label: String, reason: String },

    #[error("desired precision must be positive and finite, got {0}")]
    InvalidPrecision(f64),

    #[error("big-M constant must be positive and finite, got {0}")]
    InvalidBigM(f64),

    #[error("product ({a}, {b}) is already tagged for {existing}")]
    ConflictingTag { a: String, b: String, existing: &'static str },

    #[error("product ({a}, {b}): {discretized} is not one of its operands")]
    NotAnOperand { a: String, b: String, discretized: String },

    #[error("disjunct {disjunct}: constraint {constraint} is not linear")]
    NonlinearDisjunct { disjunct: String, constraint: String },

    #[error("disjunction {disjunction} has no disjuncts")]
    EmptyDisjunction { disjunction: String },

    #[error("{count} disjunction(s) must be lowered before flattening")]
    UnloweredDisjunctions { count: usize },

    #[error("product ({a}, {b}) needs {required} digits, more than the supported {max}")]
    TooManyDigits { a: String, b: String, required: u32, max: u32 },
}

impl ModelError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::InvalidBounds { .. }
            | ModelError::UnknownVariable(_)
            | ModelError::FixOutOfBounds { .. }
            | ModelError::InvalidBreakpoints { .. }
            | ModelError::InvalidPrecision(_)
            | ModelError::InvalidBigM(_)
            | ModelError::ConflictingTag { .. }
            | ModelError::NotAnOperand { .. } => ErrorKind::Configuration,
            ModelError::NonlinearDisjunct { .. }
            | ModelError::EmptyDisjunction { .. }
            | ModelError::UnloweredDisjunctions { .. }
            | ModelError::TooManyDigits { .. } => ErrorKind::Transformation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ModelError::InvalidPrecision(0.0).kind(), ErrorKind::Configuration);
        assert_eq!(
            ModelError::UnloweredDisjunctions { count: 2 }.kind(),
            ErrorKind::Transformation
        );
    }

    #[test]
    fn test_error_message_names_the_disjunct() {
        let err = ModelError::NonlinearDisjunct {
            disjunct: "contact[foot,region=1,t=3]".to_string(),
            constraint: "friction_upper".to_string(),
        };
        assert!(err.to_string().contains("region=1,t=3"));
    }
}
