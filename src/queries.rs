//! Presence-condition queries built on the visitor protocol.

use std::ops::ControlFlow;
use std::path::PathBuf;

use crate::artefact::{ArtefactTree, SourceCodeFile};
use crate::error::{Error, Result};
use crate::formula::Formula;
use crate::visitor::{AggregateFocus, AnnotationFocus, ArtefactVisitor, FileFocus};

/// Finds the presence condition of the file at `path`.
///
/// Aggregates are searched depth-first and the first match wins.
#[derive(Debug)]
pub struct FilePcQuery {
    path: PathBuf,
    result: Option<Formula>,
}

impl FilePcQuery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            result: None,
        }
    }

    pub fn run(mut self, tree: &ArtefactTree) -> Result<Formula> {
        let _ = tree.accept(&mut self);
        self.result.ok_or(Error::MissingArtefact { path: self.path })
    }
}

impl ArtefactVisitor for FilePcQuery {
    fn visit_aggregate(&mut self, focus: AggregateFocus<'_>) -> ControlFlow<()> {
        focus.visit_children(self)
    }

    fn visit_file(&mut self, focus: FileFocus<'_>) -> ControlFlow<()> {
        if focus.file().path() == self.path {
            self.result = Some(focus.file().condition().clone());
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Finds the presence condition of one line of the file at `path`.
///
/// The answer is the condition of the innermost annotation containing the
/// line. Two siblings claiming the same line is reported as an invariant
/// violation rather than resolved arbitrarily.
#[derive(Debug)]
pub struct LinePcQuery {
    path: PathBuf,
    line: usize,
    result: Option<Result<Formula>>,
}

impl LinePcQuery {
    pub fn new(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
            result: None,
        }
    }

    pub fn run(mut self, tree: &ArtefactTree) -> Result<Formula> {
        let _ = tree.accept(&mut self);
        match self.result {
            Some(result) => result,
            None => Err(Error::MissingArtefact { path: self.path }),
        }
    }

    /// Runs the query against a single file, ignoring its path.
    pub fn run_on_file(mut self, file: &SourceCodeFile) -> Result<Formula> {
        self.path = file.path().to_path_buf();
        let _ = file.accept(&mut self);
        match self.result {
            Some(result) => result,
            None => Err(Error::MissingArtefact { path: self.path }),
        }
    }

    fn finish(&mut self, result: Result<Formula>) -> ControlFlow<()> {
        self.result = Some(result);
        ControlFlow::Break(())
    }
}

impl ArtefactVisitor for LinePcQuery {
    fn visit_aggregate(&mut self, focus: AggregateFocus<'_>) -> ControlFlow<()> {
        focus.visit_children(self)
    }

    fn visit_file(&mut self, focus: FileFocus<'_>) -> ControlFlow<()> {
        let file = focus.file();
        if file.path() != self.path {
            return ControlFlow::Continue(());
        }

        let range = file.root().range();
        if !range.contains(self.line) {
            return self.finish(Err(Error::LineOutOfRange {
                path: self.path.clone(),
                line: self.line,
                from: range.from,
                to: range.to,
            }));
        }

        focus.visit_root(self)?;
        // The root annotation always settles the query once entered.
        ControlFlow::Break(())
    }

    fn visit_annotation(&mut self, focus: AnnotationFocus<'_>) -> ControlFlow<()> {
        let annotation = focus.annotation();
        let line = self.line;
        let mut claiming = annotation
            .children()
            .iter()
            .enumerate()
            .filter(move |(_, child)| child.range().contains(line));

        match (claiming.next(), claiming.next()) {
            (None, _) => self.finish(Ok(annotation.condition().clone())),
            (Some((index, _)), None) => focus.visit_child(index, self),
            (Some((_, first)), Some((_, second))) => {
                let message = format!(
                    "{}: line {} is claimed by sibling annotations {} and {}",
                    self.path.display(),
                    self.line,
                    first.range(),
                    second.range()
                );
                self.finish(Err(Error::InvariantViolation(message)))
            }
        }
    }
}

/// Counts the nodes of each kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationCounter {
    pub aggregates: usize,
    pub files: usize,
    pub annotations: usize,
}

impl AnnotationCounter {
    pub fn count(tree: &ArtefactTree) -> Self {
        let mut counter = Self::default();
        let _ = tree.accept(&mut counter);
        counter
    }
}

impl ArtefactVisitor for AnnotationCounter {
    fn visit_aggregate(&mut self, focus: AggregateFocus<'_>) -> ControlFlow<()> {
        self.aggregates += 1;
        focus.visit_children(self)
    }

    fn visit_file(&mut self, focus: FileFocus<'_>) -> ControlFlow<()> {
        self.files += 1;
        focus.visit_root(self)
    }

    fn visit_annotation(&mut self, focus: AnnotationFocus<'_>) -> ControlFlow<()> {
        self.annotations += 1;
        focus.visit_children(self)
    }
}
