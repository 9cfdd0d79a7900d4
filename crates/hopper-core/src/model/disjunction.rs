//! Disjuncts and disjunctions
//!
//! A disjunct is a constraint set gated by a binary indicator; a disjunction
//! groups disjuncts of which exactly one must hold. Exclusivity is not
//! enforced here: it is installed when the disjunction is lowered.

use super::constraint::Constraint;
use super::variable::VarId;

/// Arena index of a disjunct inside its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisjunctId(pub(crate) usize);

impl DisjunctId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Constraint set active when `indicator == 1`
#[derive(Debug, Clone)]
pub struct Disjunct {
    pub label: String,
    pub indicator: VarId,
    pub constraints: Vec<Constraint>,
}

/// Exactly-one group of disjuncts
#[derive(Debug, Clone)]
pub struct Disjunction {
    pub label: String,
    pub disjuncts: Vec<DisjunctId>,
}
