//! Artefact trees: directories, source files and nested conditional regions.
//!
//! An [`ArtefactTree`] is either an [`AggregateNode`] (e.g. a directory) or a
//! [`SourceCodeFile`]. Each file owns exactly one root [`Annotation`] spanning
//! its whole physical line range, and annotations nest further annotations.
//!
//! Structural invariants are checked once, when a node is built:
//!
//! - every line range is 1-based and inclusive, `[from, to]`;
//! - children lie within their parent (`child.from >= parent.from`,
//!   `child.to <= parent.to`), and never on the marker lines of an
//!   internal parent;
//! - siblings are sorted by `from` and pairwise disjoint.
//!
//! Lines of an annotation not covered by any child are *plain* lines, guarded
//! by that annotation alone.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::formula::Formula;
use crate::sat::SatOracle;

/// How a conditional region is marked in the source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AnnotationStyle {
    /// The guard occupies physical lines: `#if` on `from`, `#endif` on `to`.
    Internal,
    /// No marker lines; the region is known from external trace data.
    External,
}

impl AnnotationStyle {
    /// Number of marker lines at each end of the region.
    pub fn offset(self) -> usize {
        match self {
            AnnotationStyle::Internal => 1,
            AnnotationStyle::External => 0,
        }
    }
}

/// Inclusive range of 1-based line numbers.
///
/// A range with `from == to + 1` is empty.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineRange {
    pub from: usize,
    pub to: usize,
}

impl LineRange {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    /// The empty range positioned just before `at`.
    pub fn empty_at(at: usize) -> Self {
        Self { from: at, to: at - 1 }
    }

    pub fn len(&self) -> usize {
        (self.to + 1).saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, line: usize) -> bool {
        self.from <= line && line <= self.to
    }

    pub fn encloses(&self, other: &LineRange) -> bool {
        self.from <= other.from && other.to <= self.to
    }
}

impl Display for LineRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

/// Position of an annotation in the pre-order walk of its file's tree.
///
/// The root annotation has id `0`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(pub usize);

impl Display for AnnotationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    condition: Formula,
    range: LineRange,
    style: AnnotationStyle,
    children: Vec<Annotation>,
}

impl Annotation {
    /// Creates a childless annotation.
    pub fn new(condition: Formula, from: usize, to: usize, style: AnnotationStyle) -> Result<Self> {
        let annotation = Annotation {
            condition,
            range: LineRange::new(from, to),
            style,
            children: Vec::new(),
        };
        annotation.check_own_range()?;
        Ok(annotation)
    }

    /// Builds an annotation from parts without checking any invariant.
    ///
    /// Meant for trees decoded from external trace data; run
    /// [`validate`][Annotation::validate] before trusting the result.
    pub fn from_parts_unchecked(
        condition: Formula,
        range: LineRange,
        style: AnnotationStyle,
        children: Vec<Annotation>,
    ) -> Self {
        Annotation {
            condition,
            range,
            style,
            children,
        }
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Annotation>) -> Result<Self> {
        for child in children {
            self.add_child(child)?;
        }
        Ok(self)
    }

    /// Appends a child after the existing ones.
    pub fn add_child(&mut self, child: Annotation) -> Result<()> {
        self.check_child(self.children.last(), &child)?;
        self.children.push(child);
        Ok(())
    }

    /// Lines that children may occupy: the range minus the marker lines.
    pub fn body(&self) -> LineRange {
        let offset = self.style.offset();
        LineRange::new(self.range.from + offset, self.range.to.saturating_sub(offset))
    }

    fn check_child(&self, previous: Option<&Annotation>, child: &Annotation) -> Result<()> {
        if !self.body().encloses(&child.range) {
            return Err(Error::invariant(format!(
                "annotation {} escapes the body {} of its parent {}",
                child.range,
                self.body(),
                self.range
            )));
        }
        if let Some(last) = previous {
            if last.range.to >= child.range.from {
                return Err(Error::invariant(format!(
                    "sibling annotations {} and {} overlap or are out of order",
                    last.range, child.range
                )));
            }
        }
        Ok(())
    }

    fn check_own_range(&self) -> Result<()> {
        if self.range.from == 0 || self.range.from > self.range.to + 1 {
            return Err(Error::invariant(format!(
                "invalid line range {}",
                self.range
            )));
        }
        if self.style == AnnotationStyle::Internal && self.range.len() < 2 {
            return Err(Error::invariant(format!(
                "internal annotation {} has no room for its marker lines",
                self.range
            )));
        }
        Ok(())
    }

    /// Re-checks all structural invariants of the subtree.
    pub fn validate(&self) -> Result<()> {
        self.check_own_range()?;
        let mut previous = None;
        for child in &self.children {
            self.check_child(previous, child)?;
            child.validate()?;
            previous = Some(child);
        }
        Ok(())
    }

    pub fn condition(&self) -> &Formula {
        &self.condition
    }

    pub fn range(&self) -> LineRange {
        self.range
    }

    pub fn from(&self) -> usize {
        self.range.from
    }

    pub fn to(&self) -> usize {
        self.range.to
    }

    pub fn style(&self) -> AnnotationStyle {
        self.style
    }

    pub fn children(&self) -> &[Annotation] {
        &self.children
    }

    /// Number of annotations in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Annotation::subtree_len).sum::<usize>()
    }

    /// All annotations of the subtree with their pre-order ids.
    pub fn preorder(&self) -> Vec<(AnnotationId, &Annotation)> {
        let mut out = Vec::with_capacity(self.subtree_len());
        let mut stack = vec![self];
        while let Some(annotation) = stack.pop() {
            out.push((AnnotationId(out.len()), annotation));
            stack.extend(annotation.children.iter().rev());
        }
        out
    }

    /// Looks up an annotation of the subtree by its pre-order id.
    pub fn find(&self, id: AnnotationId) -> Option<&Annotation> {
        let mut current = self;
        let mut offset = 0;
        loop {
            if id.0 == offset {
                return Some(current);
            }
            offset += 1;
            let mut next = None;
            for child in &current.children {
                let len = child.subtree_len();
                if id.0 < offset + len {
                    next = Some(child);
                    break;
                }
                offset += len;
            }
            current = next?;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCodeFile {
    path: PathBuf,
    condition: Formula,
    root: Annotation,
}

impl SourceCodeFile {
    /// `path` is relative to the tree root and compared case-sensitively.
    pub fn new(path: impl Into<PathBuf>, condition: Formula, root: Annotation) -> Self {
        Self {
            path: path.into(),
            condition,
            root,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn condition(&self) -> &Formula {
        &self.condition
    }

    pub fn root(&self) -> &Annotation {
        &self.root
    }

    /// Checks that the declared file condition is equivalent to the condition
    /// of its root annotation.
    pub fn check_consistency(&self, oracle: &impl SatOracle) -> Result<()> {
        if oracle.equivalent(&self.condition, &self.root.condition)? {
            Ok(())
        } else {
            Err(Error::invariant(format!(
                "{}: file condition `{}` disagrees with its root annotation `{}`",
                self.path.display(),
                self.condition,
                self.root.condition
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateNode {
    condition: Formula,
    children: Vec<ArtefactTree>,
}

impl Default for AggregateNode {
    fn default() -> Self {
        Self {
            condition: Formula::True,
            children: Vec::new(),
        }
    }
}

impl AggregateNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(mut self, condition: Formula) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_child(mut self, child: impl Into<ArtefactTree>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn push(&mut self, child: impl Into<ArtefactTree>) {
        self.children.push(child.into());
    }

    pub fn condition(&self) -> &Formula {
        &self.condition
    }

    pub fn children(&self) -> &[ArtefactTree] {
        &self.children
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtefactTree {
    Aggregate(AggregateNode),
    File(SourceCodeFile),
}

impl From<AggregateNode> for ArtefactTree {
    fn from(node: AggregateNode) -> Self {
        ArtefactTree::Aggregate(node)
    }
}

impl From<SourceCodeFile> for ArtefactTree {
    fn from(file: SourceCodeFile) -> Self {
        ArtefactTree::File(file)
    }
}

impl ArtefactTree {
    pub fn condition(&self) -> &Formula {
        match self {
            ArtefactTree::Aggregate(node) => node.condition(),
            ArtefactTree::File(file) => file.condition(),
        }
    }

    /// All source files, depth-first in child order.
    pub fn files(&self) -> Vec<&SourceCodeFile> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            match tree {
                ArtefactTree::Aggregate(node) => stack.extend(node.children.iter().rev()),
                ArtefactTree::File(file) => out.push(file),
            }
        }
        out
    }

    /// Re-checks the annotation invariants of every file.
    pub fn validate(&self) -> Result<()> {
        for file in self.files() {
            file.root().validate().map_err(|err| match err {
                Error::InvariantViolation(message) => Error::InvariantViolation(format!(
                    "{}: {}",
                    file.path().display(),
                    message
                )),
                other => other,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::bdd::BddOracle;

    fn pc(text: &str) -> Formula {
        Formula::parse(text).unwrap()
    }

    fn internal(text: &str, from: usize, to: usize) -> Annotation {
        Annotation::new(pc(text), from, to, AnnotationStyle::Internal).unwrap()
    }

    fn sample_root() -> Annotation {
        let b = internal("F && G", 4, 6);
        let a = internal("F", 2, 9).with_children([b]).unwrap();
        let c = internal("H", 11, 13);
        Annotation::new(Formula::True, 1, 14, AnnotationStyle::External)
            .unwrap()
            .with_children([a, c])
            .unwrap()
    }

    #[test]
    fn test_line_range() {
        let r = LineRange::new(3, 5);
        assert_eq!(r.len(), 3);
        assert!(r.contains(3) && r.contains(5));
        assert!(!r.contains(6));
        assert!(LineRange::empty_at(4).is_empty());
        assert!(r.encloses(&LineRange::empty_at(6)));
    }

    #[test]
    fn test_child_escaping_parent_is_rejected() {
        let mut parent = internal("F", 2, 9);
        let err = parent.add_child(internal("G", 8, 10)).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_child_on_marker_line_is_rejected() {
        let external = |from, to| Annotation::new(pc("G"), from, to, AnnotationStyle::External).unwrap();
        let mut parent = internal("F", 2, 9);
        assert_eq!(parent.body(), LineRange::new(3, 8));
        assert!(parent.add_child(external(2, 4)).is_err());
        assert!(parent.add_child(external(7, 9)).is_err());
        assert!(parent.add_child(external(3, 8)).is_ok());

        let unchecked = Annotation::from_parts_unchecked(
            pc("F"),
            LineRange::new(2, 9),
            AnnotationStyle::Internal,
            vec![external(2, 4)],
        );
        assert!(matches!(unchecked.validate(), Err(Error::InvariantViolation(_))));

        // External parents have no marker lines to protect.
        let mut root = Annotation::new(Formula::True, 1, 3, AnnotationStyle::External).unwrap();
        assert!(root.add_child(external(1, 3)).is_ok());
    }

    #[test]
    fn test_overlapping_siblings_are_rejected() {
        let mut parent = Annotation::new(Formula::True, 1, 20, AnnotationStyle::External).unwrap();
        parent.add_child(internal("A", 2, 6)).unwrap();
        assert!(parent.add_child(internal("B", 6, 9)).is_err());
        assert!(parent.add_child(internal("B", 1, 2)).is_err());
        assert!(parent.add_child(internal("B", 7, 9)).is_ok());
    }

    #[test]
    fn test_invalid_own_range() {
        assert!(Annotation::new(Formula::True, 0, 3, AnnotationStyle::External).is_err());
        assert!(Annotation::new(Formula::True, 5, 3, AnnotationStyle::External).is_err());
        assert!(Annotation::new(pc("F"), 5, 5, AnnotationStyle::Internal).is_err());
        // An empty external region is fine.
        assert!(Annotation::new(Formula::True, 4, 3, AnnotationStyle::External).is_ok());
    }

    #[test]
    fn test_validate_unchecked_tree() {
        let overlapping = Annotation::from_parts_unchecked(
            Formula::True,
            LineRange::new(1, 10),
            AnnotationStyle::External,
            vec![internal("A", 2, 6), internal("B", 5, 8)],
        );
        assert!(overlapping.validate().is_err());
        assert!(sample_root().validate().is_ok());
    }

    #[test]
    fn test_preorder_and_find() {
        let root = sample_root();
        assert_eq!(root.subtree_len(), 4);

        let order: Vec<String> = root
            .preorder()
            .into_iter()
            .map(|(id, a)| format!("{}{}", id, a.range()))
            .collect();
        assert_eq!(order, vec!["#0[1, 14]", "#1[2, 9]", "#2[4, 6]", "#3[11, 13]"]);

        for (id, annotation) in root.preorder() {
            assert_eq!(root.find(id), Some(annotation));
        }
        assert_eq!(root.find(AnnotationId(4)), None);
    }

    #[test]
    fn test_files_depth_first() {
        let leaf = |path: &str| {
            SourceCodeFile::new(
                path,
                Formula::True,
                Annotation::new(Formula::True, 1, 1, AnnotationStyle::External).unwrap(),
            )
        };
        let tree: ArtefactTree = AggregateNode::new()
            .with_child(AggregateNode::new().with_child(leaf("a/x.c")).with_child(leaf("a/y.c")))
            .with_child(leaf("z.c"))
            .into();
        let paths: Vec<_> = tree.files().iter().map(|f| f.path().to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("a/x.c"), PathBuf::from("a/y.c"), PathBuf::from("z.c")]
        );
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_check_consistency() {
        let oracle = BddOracle::default();
        let root = Annotation::new(pc("A && B"), 1, 5, AnnotationStyle::External).unwrap();

        let ok = SourceCodeFile::new("f.c", pc("B && A"), root.clone());
        assert!(ok.check_consistency(&oracle).is_ok());

        let bad = SourceCodeFile::new("f.c", pc("A"), root);
        assert!(matches!(
            bad.check_consistency(&oracle),
            Err(Error::InvariantViolation(_))
        ));
    }
}
