//! Solver boundary
//!
//! A solver engine receives a fully lowered [`FlatProblem`] and returns a
//! status together with the best assignment it found. Infeasibility and
//! time limits are outcomes, not errors; [`SolverError`] is reserved for an
//! engine that could not run at all.

use hopper_core::model::{FlatProblem, ProblemClass};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{EngineSelector, SolverConfig};

/// Failures of the engine itself, surfaced verbatim
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SolverError {
    #[error("solver engine unavailable: {0}")]
    Unavailable(String),
    #[error("solver licence error: {0}")]
    Licence(String),
    #[error("solver ran out of resources: {0}")]
    Resource(String),
    #[error("{engine:?} engine cannot solve a {class:?} problem")]
    UnsupportedClass {
        engine: EngineSelector,
        class: ProblemClass,
    },
    #[error("engine returned {got} values for {expected} variables")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Termination status of a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    /// Stopped by the time limit; `values` holds the incumbent, if any
    TimeLimit,
    Error,
}

/// Result of a solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// One value per flat column; empty when the engine has none
    pub values: Vec<f64>,
    pub objective: Option<f64>,
}

impl SolveOutcome {
    pub fn infeasible() -> Self {
        Self {
            status: SolveStatus::Infeasible,
            values: Vec::new(),
            objective: None,
        }
    }

    /// Whether `values` holds a usable assignment
    pub fn has_solution(&self) -> bool {
        !self.values.is_empty()
            && matches!(self.status, SolveStatus::Optimal | SolveStatus::TimeLimit)
    }
}

/// An optimization engine behind the solver boundary
pub trait SolverEngine {
    fn name(&self) -> &str;

    /// Solve `problem`, blocking for at most the configured time limit
    fn solve(&self, problem: &FlatProblem, config: &SolverConfig) -> Result<SolveOutcome, SolverError>;
}

/// Whether an engine class accepts a problem class
pub fn supports(engine: EngineSelector, class: ProblemClass) -> bool {
    match engine {
        EngineSelector::Milp => !class.is_nonlinear(),
        EngineSelector::Nlp => !class.is_mixed_integer(),
        EngineSelector::Minlp => true,
    }
}

/// Hand `problem` to `engine` and check what comes back
pub fn solve_flat(
    engine: &dyn SolverEngine,
    problem: &FlatProblem,
    config: &SolverConfig,
) -> Result<SolveOutcome, SolverError> {
    let class = problem.class();
    if !supports(config.engine, class) {
        return Err(SolverError::UnsupportedClass {
            engine: config.engine,
            class,
        });
    }
    debug!(
        engine = engine.name(),
        class = ?class,
        variables = problem.num_variables(),
        rows = problem.num_rows(),
        time_limit = config.time_limit_seconds,
        threads = config.threads,
        mip_gap = config.mip_gap,
        "Handing problem to solver"
    );
    let outcome = engine.solve(problem, config)?;
    if !outcome.values.is_empty() && outcome.values.len() != problem.num_variables() {
        return Err(SolverError::DimensionMismatch {
            expected: problem.num_variables(),
            got: outcome.values.len(),
        });
    }
    info!(
        engine = engine.name(),
        status = ?outcome.status,
        objective = ?outcome.objective,
        "Solve finished"
    );
    Ok(outcome)
}

/// Engine that answers with a fixed candidate assignment
///
/// Reports `Optimal` when the candidate satisfies every bound, integrality
/// requirement and row within `tolerance`, and `Infeasible` otherwise. It
/// stands in for a real engine when checking a formulation against a known
/// trajectory.
#[derive(Debug, Clone)]
pub struct CandidateEngine {
    candidate: Vec<f64>,
    tolerance: f64,
}

impl CandidateEngine {
    pub fn new(candidate: Vec<f64>, tolerance: f64) -> Self {
        Self {
            candidate,
            tolerance,
        }
    }
}

impl SolverEngine for CandidateEngine {
    fn name(&self) -> &str {
        "candidate"
    }

    fn solve(&self, problem: &FlatProblem, _config: &SolverConfig) -> Result<SolveOutcome, SolverError> {
        if self.candidate.len() != problem.num_variables() {
            return Err(SolverError::DimensionMismatch {
                expected: problem.num_variables(),
                got: self.candidate.len(),
            });
        }
        let violation = problem.max_violation(&self.candidate);
        if violation > self.tolerance {
            debug!(violation, tolerance = self.tolerance, "Candidate rejected");
            return Ok(SolveOutcome::infeasible());
        }
        Ok(SolveOutcome {
            status: SolveStatus::Optimal,
            values: self.candidate.clone(),
            objective: problem.objective.as_ref().map(|o| o.evaluate(&self.candidate)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopper_core::model::{Bounds, Constraint, Model};

    fn problem() -> FlatProblem {
        let mut model = Model::new("boundary");
        let x = model.add_continuous("x", Bounds::new(0.0, 2.0)).unwrap();
        let y = model.add_binary("y").unwrap();
        model.add_constraint(Constraint::le("cap", x - 2.0 * y, 0.0));
        model.flatten().unwrap()
    }

    #[test]
    fn test_engine_classes() {
        assert!(supports(EngineSelector::Milp, ProblemClass::MixedIntegerLinear));
        assert!(!supports(EngineSelector::Milp, ProblemClass::Nonlinear));
        assert!(supports(EngineSelector::Nlp, ProblemClass::Nonlinear));
        assert!(!supports(EngineSelector::Nlp, ProblemClass::MixedIntegerLinear));
        assert!(supports(EngineSelector::Minlp, ProblemClass::MixedIntegerNonlinear));
    }

    #[test]
    fn test_candidate_engine() {
        let problem = problem();
        let config = SolverConfig::default();

        let outcome = solve_flat(&CandidateEngine::new(vec![1.5, 1.0], 1e-9), &problem, &config).unwrap();
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert!(outcome.has_solution());

        let outcome = solve_flat(&CandidateEngine::new(vec![1.5, 0.0], 1e-9), &problem, &config).unwrap();
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(!outcome.has_solution());

        assert_eq!(
            solve_flat(&CandidateEngine::new(vec![1.0], 1e-9), &problem, &config),
            Err(SolverError::DimensionMismatch { expected: 2, got: 1 })
        );
    }

    #[test]
    fn test_unsupported_class_is_an_error() {
        let config = SolverConfig {
            engine: EngineSelector::Nlp,
            ..SolverConfig::default()
        };
        assert!(matches!(
            solve_flat(&CandidateEngine::new(vec![0.0, 0.0], 1e-9), &problem(), &config),
            Err(SolverError::UnsupportedClass { .. })
        ));
    }

    #[test]
    fn test_time_limit_keeps_incumbent() {
        struct Interrupted;
        impl SolverEngine for Interrupted {
            fn name(&self) -> &str {
                "interrupted"
            }
            fn solve(&self, problem: &FlatProblem, _: &SolverConfig) -> Result<SolveOutcome, SolverError> {
                Ok(SolveOutcome {
                    status: SolveStatus::TimeLimit,
                    values: vec![0.0; problem.num_variables()],
                    objective: Some(0.0),
                })
            }
        }
        let outcome = solve_flat(&Interrupted, &problem(), &SolverConfig::default()).unwrap();
        assert_eq!(outcome.status, SolveStatus::TimeLimit);
        assert!(outcome.has_solution());
    }
}
