//! Satisfiability oracle interface.
//!
//! Components that need logical queries receive an oracle explicitly; there is
//! no process-wide solver. Every query returns `Result<_, SolverError>` so that
//! a solver failure can never be mistaken for "unsatisfiable".

use crate::error::SolverError;
use crate::formula::Formula;

pub trait SatOracle {
    fn is_satisfiable(&self, formula: &Formula) -> Result<bool, SolverError>;

    /// `f` holds under every assignment.
    fn is_tautology(&self, formula: &Formula) -> Result<bool, SolverError> {
        Ok(!self.is_satisfiable(&Formula::negate(formula.clone()))?)
    }

    /// `a ⇒ b` is a tautology.
    fn implies(&self, a: &Formula, b: &Formula) -> Result<bool, SolverError> {
        self.is_tautology(&Formula::implies(a.clone(), b.clone()))
    }

    /// `a ⇔ b` is a tautology.
    fn equivalent(&self, a: &Formula, b: &Formula) -> Result<bool, SolverError> {
        self.is_tautology(&Formula::equivalent(a.clone(), b.clone()))
    }
}

impl<T: SatOracle + ?Sized> SatOracle for &T {
    fn is_satisfiable(&self, formula: &Formula) -> Result<bool, SolverError> {
        (**self).is_satisfiable(formula)
    }
}

/// Resource limits of the BDD-backed oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleConfig {
    /// Maximum number of decision nodes the manager may allocate.
    pub node_limit: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            node_limit: 1 << 20,
        }
    }
}

impl OracleConfig {
    pub fn with_node_limit(mut self, node_limit: usize) -> Self {
        self.node_limit = node_limit;
        self
    }
}
