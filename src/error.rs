//! Error taxonomy shared by every layer of the crate.
//!
//! Errors fall into two groups:
//!
//! - **Recoverable** per file: [`Error::MissingArtefact`] and [`Error::Io`].
//!   A batch driver may skip or record them, depending on its
//!   [`VariantGenerationOptions`][crate::options::VariantGenerationOptions].
//! - **Hard** failures: everything else. Solver failures and broken tree
//!   invariants always propagate, since the caller cannot repair them locally.

use std::path::PathBuf;

use thiserror::Error;

use crate::formula::Feature;

/// Failure of the satisfiability oracle.
///
/// Never to be read as "unsatisfiable".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("solver node budget of {limit} nodes exceeded")]
    NodeLimitExceeded { limit: usize },

    #[error("unsupported query: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("artefact not found: {}", path.display())]
    MissingArtefact { path: PathBuf },

    #[error("solver failure: {0}")]
    Solver(#[from] SolverError),

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("feature `{0}` has no value in the configuration")]
    UnassignedFeature(Feature),

    #[error("line {line} of {} is outside [{from}, {to}]", path.display())]
    LineOutOfRange {
        path: PathBuf,
        line: usize,
        from: usize,
        to: usize,
    },

    #[error("cannot parse `{input}`: {message}")]
    Parse { input: String, message: String },

    #[error("repository failure: {0}")]
    Repository(String),

    /// An earlier pipeline step failed; its message is carried along.
    #[error("prerequisite `{step}` failed: {message}")]
    Prerequisite { step: &'static str, message: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Error::InvariantViolation(message.into())
    }

    /// Whether a batch driver may continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MissingArtefact { .. } | Error::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
