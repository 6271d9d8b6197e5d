//! # spl-sim: variant projection and provenance for software product lines
//!
//! **`spl-sim`** simulates the evolution of a preprocessor-based software product line (SPL).
//! For every SPL revision it generates concrete *variants*, fully resolved configurations of the
//! product line, together with a **ground truth** that links every generated annotation back to its
//! origin in the SPL.
//!
//! ## Model
//!
//! - An [`ArtefactTree`][crate::artefact::ArtefactTree] describes the annotated sources of one revision.
//!   Files own a tree of [`Annotation`][crate::artefact::Annotation]s: nested, non-overlapping
//!   line ranges guarded by presence conditions.
//! - Presence conditions are propositional [`Formula`][crate::formula::Formula]s over features.
//!   Satisfiability questions go through the [`SatOracle`][crate::sat::SatOracle] trait; the bundled
//!   [`BddOracle`][crate::bdd::BddOracle] answers them with reduced ordered BDDs.
//! - A [`Variant`][crate::config::Variant] is a named total [`Configuration`][crate::config::Configuration].
//!
//! ## Quick Start
//!
//! ```rust
//! use spl_sim::artefact::{Annotation, AnnotationId, AnnotationStyle, SourceCodeFile};
//! use spl_sim::config::Configuration;
//! use spl_sim::formula::Formula;
//! use spl_sim::projector::project_source;
//!
//! // `#ifdef F` block at lines 2..4 of a five-line file.
//! let block = Annotation::new(Formula::var("F"), 2, 4, AnnotationStyle::Internal).unwrap();
//! let root = Annotation::new(Formula::True, 1, 5, AnnotationStyle::External)
//!     .unwrap()
//!     .with_children([block])
//!     .unwrap();
//! let file = SourceCodeFile::new("main.c", Formula::True, root);
//! let source = "int a;\n#ifdef F\nint f;\n#endif\nint b;\n";
//!
//! let with_f: Configuration = "F=1".parse().unwrap();
//! let projection = project_source(&file, source, &with_f, false).unwrap();
//! assert_eq!(projection.text, "int a;\nint f;\nint b;\n");
//! assert!(projection.ground_truth.is_present_in_variant(AnnotationId(1)));
//!
//! let without_f: Configuration = "F=0".parse().unwrap();
//! let projection = project_source(&file, source, &without_f, false).unwrap();
//! assert_eq!(projection.text, "int a;\nint b;\n");
//! ```
//!
//! ## Core Components
//!
//! - **[`projector`]**: projection of one annotated file onto one variant, with its block matching.
//! - **[`batch`]**: whole variants and batches of variants on a worker pool.
//! - **[`queries`]** and **[`visitor`]**: presence-condition queries over artefact trees.
//! - **[`evolution`]**: per-commit orchestration against the [`collaborators`] traits.
//!
//! Logging goes through the [`log`] facade; enable it with any logger (the demos use `simplelog`).

pub mod artefact;
pub mod batch;
pub mod bdd;
pub mod chunk;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod evolution;
pub mod formula;
pub mod ground_truth;
pub mod lazy;
pub mod options;
pub mod parse;
pub mod pretty;
pub mod projector;
pub mod queries;
pub mod sat;
pub mod visitor;

pub use error::{Error, Result, SolverError};
