//! Projection of one annotated SPL file onto one variant.
//!
//! An annotation is *included* iff the variant's configuration satisfies its
//! own presence condition. Ancestors are not conjoined: a nested condition is
//! assumed to imply its parent's, and once a parent is excluded its whole
//! subtree is dropped without looking at the children's conditions.
//!
//! For an included annotation the output receives, in ascending line order,
//! its plain lines interleaved with the projections of its included children.
//! Marker lines of internal annotations are dropped unless `with_macros` is set
//! in the [`VariantGenerationOptions`].
//!
//! The surviving lines form [`Chunk`]s that are renumbered densely from line 1;
//! each generated annotation spans the renumbered chunks of its subtree.

use std::fs;
use std::io::ErrorKind;
use std::ops::{ControlFlow, Range};
use std::path::Path;

use log::{debug, info, warn};

use crate::artefact::{Annotation, AnnotationId, AnnotationStyle, ArtefactTree, LineRange, SourceCodeFile};
use crate::chunk::{collapse_lines, renumber, Chunk};
use crate::config::{Configuration, Variant};
use crate::error::{Error, Result};
use crate::formula::Formula;
use crate::ground_truth::{AnnotationGroundTruth, BlockMatching, GroundTruth};
use crate::options::VariantGenerationOptions;
use crate::visitor::{AggregateFocus, ArtefactVisitor, FileFocus};

/// Result of projecting one file's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProjection {
    /// Generated file content.
    pub text: String,
    /// SPL line numbers copied into `text`, ascending.
    pub surviving_lines: Vec<usize>,
    /// Surviving chunks after renumbering, in output order.
    pub chunks: Vec<Chunk>,
    pub ground_truth: AnnotationGroundTruth,
}

struct Included<'a> {
    spl_id: AnnotationId,
    annotation: &'a Annotation,
    children: Vec<usize>,
    /// Indices of the chunks emitted while this subtree was walked.
    chunks: Range<usize>,
}

struct Projection<'a> {
    configuration: &'a Configuration,
    with_macros: bool,
    chunks: Vec<Chunk>,
    /// Included annotations in pre-order.
    included: Vec<Included<'a>>,
    excluded: usize,
}

impl<'a> Projection<'a> {
    fn walk(&mut self, annotation: &'a Annotation, id: AnnotationId) -> Result<Option<usize>> {
        if !self.configuration.satisfies(annotation.condition())? {
            debug!(
                "excluding {} {} `{}` with {} descendants",
                id,
                annotation.range(),
                annotation.condition(),
                annotation.subtree_len() - 1
            );
            self.excluded += annotation.subtree_len();
            return Ok(None);
        }

        debug!("including {} {} `{}`", id, annotation.range(), annotation.condition());
        let index = self.included.len();
        let start = self.chunks.len();
        self.included.push(Included {
            spl_id: id,
            annotation,
            children: Vec::new(),
            chunks: start..start,
        });

        let offset = if self.with_macros {
            0
        } else {
            annotation.style().offset()
        };
        // Plain lines lie in the half-open range [cursor, end).
        let mut cursor = annotation.from() + offset;
        let end = annotation.to() + 1 - offset;

        let mut child_id = id.0 + 1;
        for child in annotation.children() {
            self.push_run(cursor, child.from().min(end), annotation);
            if let Some(child_index) = self.walk(child, AnnotationId(child_id))? {
                self.included[index].children.push(child_index);
            }
            child_id += child.subtree_len();
            cursor = cursor.max(child.to() + 1);
        }
        self.push_run(cursor, end, annotation);

        self.included[index].chunks.end = self.chunks.len();
        Ok(Some(index))
    }

    fn push_run(&mut self, from: usize, end: usize, owner: &Annotation) {
        if from < end {
            self.chunks.push(Chunk::new(from, end - 1, owner.condition().clone()));
        }
    }

    /// Builds the generated mirror of `included[index]`, registering every pair.
    fn build(&self, index: usize, dense: &[Chunk], matching: &mut BlockMatching) -> Result<Annotation> {
        let node = &self.included[index];
        // `included` is in pre-order, so the index is the generated annotation's id.
        matching.register(node.spl_id, AnnotationId(index))?;

        let range = if node.chunks.is_empty() {
            let at = match dense.get(node.chunks.start) {
                Some(chunk) => chunk.from,
                None => dense.last().map_or(1, |chunk| chunk.to + 1),
            };
            LineRange::empty_at(at)
        } else {
            LineRange::new(dense[node.chunks.start].from, dense[node.chunks.end - 1].to)
        };
        let style = if self.with_macros {
            node.annotation.style()
        } else {
            AnnotationStyle::External
        };

        let mut children = Vec::with_capacity(node.children.len());
        for &child in &node.children {
            children.push(self.build(child, dense, matching)?);
        }

        Annotation::new(node.annotation.condition().clone(), range.from, range.to, style)?
            .with_children(children)
    }
}

/// Projects the text `source` of `file` onto `configuration`.
///
/// Touches no file system; [`project_file`] wraps it with I/O.
pub fn project_source(
    file: &SourceCodeFile,
    source: &str,
    configuration: &Configuration,
    with_macros: bool,
) -> Result<FileProjection> {
    let root = file.root();
    root.validate()?;
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    if root.to() != lines.len() {
        return Err(Error::invariant(format!(
            "{}: annotations span {} lines but the file has {}",
            file.path().display(),
            root.to(),
            lines.len()
        )));
    }

    let mut projection = Projection {
        configuration,
        with_macros,
        chunks: Vec::new(),
        included: Vec::new(),
        excluded: 0,
    };
    if projection.walk(root, AnnotationId(0))?.is_none() {
        return Err(Error::invariant(format!(
            "{}: root annotation `{}` is excluded although the file is not",
            file.path().display(),
            root.condition()
        )));
    }

    let surviving_lines: Vec<usize> = projection.chunks.iter().flat_map(Chunk::lines).collect();
    let text: String = surviving_lines.iter().map(|&line| lines[line - 1]).collect();
    debug!(
        "{}: surviving runs {:?}",
        file.path().display(),
        collapse_lines(&surviving_lines)
    );

    let dense = renumber(&projection.chunks, 1);
    let mut matching = BlockMatching::new();
    let variant_root = projection.build(0, &dense, &mut matching)?;
    matching.verify_round_trip()?;

    if matching.len() + projection.excluded != root.subtree_len() {
        return Err(Error::invariant(format!(
            "{}: {} included and {} excluded annotations, expected {} in total",
            file.path().display(),
            matching.len(),
            projection.excluded,
            root.subtree_len()
        )));
    }

    let variant_artefact = SourceCodeFile::new(file.path(), file.condition().clone(), variant_root);
    Ok(FileProjection {
        text,
        surviving_lines,
        chunks: dense,
        ground_truth: AnnotationGroundTruth {
            spl_artefact: file.clone(),
            variant_artefact,
            matching,
        },
    })
}

/// Projects `file` from `spl_root` into `target_root` for `variant`.
///
/// Returns `Ok(None)` when the file does not take part in this variant: it is
/// rejected by the artefact filter, its own condition is not satisfied, or it is
/// missing and missing files are ignored.
///
/// The target is written in place; a failure may leave a partial file behind.
pub fn project_file(
    file: &SourceCodeFile,
    variant: &Variant,
    spl_root: &Path,
    target_root: &Path,
    options: &VariantGenerationOptions,
) -> Result<Option<GroundTruth>> {
    let path = file.path();

    if !options.filter.accepts(file) {
        debug!("{}: rejected by artefact filter", path.display());
        return Ok(None);
    }
    if !variant.configuration.satisfies(file.condition())? {
        debug!("{}: excluded from variant {}", path.display(), variant.name);
        return Ok(None);
    }

    let source_path = spl_root.join(path);
    let source = match fs::read_to_string(&source_path) {
        Ok(source) => source,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            if options.ignore_non_existent_spl_files {
                warn!("{}: missing in SPL, skipped", source_path.display());
                return Ok(None);
            }
            return Err(Error::MissingArtefact { path: source_path });
        }
        Err(err) => return Err(Error::io(source_path, err)),
    };

    let projection = project_source(file, &source, &variant.configuration, options.with_macros)?;

    let target_path = target_root.join(path);
    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
    }
    fs::write(&target_path, &projection.text).map_err(|err| Error::io(&target_path, err))?;

    info!(
        "{}: {} of {} lines kept for variant {}",
        path.display(),
        projection.surviving_lines.len(),
        file.root().range().len(),
        variant.name
    );

    let variant_file = projection.ground_truth.variant_artefact.clone();
    Ok(Some(GroundTruth::for_source_code_file(
        variant_file,
        projection.ground_truth,
    )))
}

/// Collects the files of a tree whose aggregates are all included.
pub(crate) struct IncludedFiles<'a, 't> {
    configuration: &'a Configuration,
    files: Vec<&'t SourceCodeFile>,
    error: Option<Error>,
}

impl<'a, 't> IncludedFiles<'a, 't> {
    pub(crate) fn collect(tree: &'t ArtefactTree, configuration: &'a Configuration) -> Result<Vec<&'t SourceCodeFile>> {
        let mut collector = IncludedFiles {
            configuration,
            files: Vec::new(),
            error: None,
        };
        collector.walk(tree);
        match collector.error {
            Some(err) => Err(err),
            None => Ok(collector.files),
        }
    }

    // The visitor protocol hands out foci borrowing only for the callback, so the
    // descent is written out here to keep `'t` references to the files.
    fn walk(&mut self, tree: &'t ArtefactTree) {
        if self.error.is_some() {
            return;
        }
        match tree {
            ArtefactTree::Aggregate(node) => match self.configuration.satisfies(node.condition()) {
                Ok(true) => {
                    for child in node.children() {
                        self.walk(child);
                    }
                }
                Ok(false) => debug!("aggregate `{}` excluded", node.condition()),
                Err(err) => self.error = Some(err),
            },
            ArtefactTree::File(file) => self.files.push(file),
        }
    }
}

/// Counts files and aggregates that a configuration excludes wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExclusionReport {
    pub excluded_aggregates: usize,
    pub excluded_files: usize,
}

impl ExclusionReport {
    pub fn compute(tree: &ArtefactTree, configuration: &Configuration) -> Result<ExclusionReport> {
        let mut counter = ExclusionCounter {
            configuration,
            report: ExclusionReport::default(),
            error: None,
        };
        let _ = tree.accept(&mut counter);
        match counter.error {
            Some(err) => Err(err),
            None => Ok(counter.report),
        }
    }
}

struct ExclusionCounter<'a> {
    configuration: &'a Configuration,
    report: ExclusionReport,
    error: Option<Error>,
}

impl ExclusionCounter<'_> {
    fn check(&mut self, condition: &Formula) -> ControlFlow<(), bool> {
        match self.configuration.satisfies(condition) {
            Ok(included) => ControlFlow::Continue(included),
            Err(err) => {
                self.error = Some(err);
                ControlFlow::Break(())
            }
        }
    }
}

impl ArtefactVisitor for ExclusionCounter<'_> {
    fn visit_aggregate(&mut self, focus: AggregateFocus<'_>) -> ControlFlow<()> {
        if self.check(focus.node().condition())? {
            focus.visit_children(self)
        } else {
            self.report.excluded_aggregates += 1;
            ControlFlow::Continue(())
        }
    }

    fn visit_file(&mut self, focus: FileFocus<'_>) -> ControlFlow<()> {
        if !self.check(focus.file().condition())? {
            self.report.excluded_files += 1;
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::artefact::AggregateNode;

    fn pc(text: &str) -> Formula {
        Formula::parse(text).unwrap()
    }

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {}\n", i)).collect()
    }

    /// `Base` root over ten lines, `F` at [2, 9] and `F && G` at [4, 6].
    fn nested_file() -> SourceCodeFile {
        let b = Annotation::new(pc("F && G"), 4, 6, AnnotationStyle::Internal).unwrap();
        let a = Annotation::new(pc("F"), 2, 9, AnnotationStyle::Internal)
            .unwrap()
            .with_children([b])
            .unwrap();
        let root = Annotation::new(pc("Base"), 1, 10, AnnotationStyle::External)
            .unwrap()
            .with_children([a])
            .unwrap();
        SourceCodeFile::new("src/main.c", pc("Base"), root)
    }

    fn configuration(text: &str) -> Configuration {
        text.parse().unwrap()
    }

    #[test]
    fn test_inner_block_excluded() {
        let file = nested_file();
        let projection =
            project_source(&file, &numbered(10), &configuration("Base=1,F=1,G=0"), false).unwrap();

        assert_eq!(projection.surviving_lines, vec![1, 3, 7, 8, 10]);
        assert_eq!(projection.text, "line 1\nline 3\nline 7\nline 8\nline 10\n");

        let truth = &projection.ground_truth;
        assert_eq!(truth.matching.spl_to_variant(AnnotationId(0)), Some(AnnotationId(0)));
        assert_eq!(truth.matching.spl_to_variant(AnnotationId(1)), Some(AnnotationId(1)));
        assert!(!truth.is_present_in_variant(AnnotationId(2)));

        let a = truth.variant_annotation(AnnotationId(1)).unwrap();
        assert_eq!(a.range(), LineRange::new(2, 4));
        assert_eq!(a.style(), AnnotationStyle::External);
        assert_eq!(a.condition(), &pc("F"));
        assert!(a.children().is_empty());
        assert_eq!(truth.variant_artefact.root().range(), LineRange::new(1, 5));
    }

    #[test]
    fn test_everything_included() {
        let file = nested_file();
        let projection =
            project_source(&file, &numbered(10), &configuration("Base=1,F=1,G=1"), false).unwrap();

        assert_eq!(projection.surviving_lines, vec![1, 3, 5, 7, 8, 10]);
        let truth = &projection.ground_truth;
        assert_eq!(truth.matching.len(), 3);
        assert_eq!(
            truth.variant_annotation(AnnotationId(2)).unwrap().range(),
            LineRange::new(3, 3)
        );
        assert_eq!(
            truth.variant_annotation(AnnotationId(1)).unwrap().range(),
            LineRange::new(2, 5)
        );
        assert_eq!(
            truth.spl_annotation(AnnotationId(2)).unwrap().condition(),
            &pc("F && G")
        );
    }

    #[test]
    fn test_excluded_parent_hides_children() {
        // `G` is never consulted once `F` fails.
        let file = nested_file();
        let projection = project_source(&file, &numbered(10), &configuration("Base=1,F=0"), false).unwrap();

        assert_eq!(projection.surviving_lines, vec![1, 10]);
        assert_eq!(projection.ground_truth.matching.len(), 1);
        assert!(!projection.ground_truth.is_present_in_variant(AnnotationId(1)));
        assert!(!projection.ground_truth.is_present_in_variant(AnnotationId(2)));
    }

    #[test]
    fn test_with_macros_keeps_markers() {
        let file = nested_file();
        let projection =
            project_source(&file, &numbered(10), &configuration("Base=1,F=1,G=0"), true).unwrap();

        assert_eq!(projection.surviving_lines, vec![1, 2, 3, 7, 8, 9, 10]);
        let a = projection.ground_truth.variant_annotation(AnnotationId(1)).unwrap();
        assert_eq!(a.range(), LineRange::new(2, 6));
        assert_eq!(a.style(), AnnotationStyle::Internal);
    }

    #[test]
    fn test_hollow_annotation_gets_empty_range() {
        let b = Annotation::new(pc("F && G"), 3, 4, AnnotationStyle::Internal).unwrap();
        let a = Annotation::new(pc("F"), 2, 5, AnnotationStyle::Internal)
            .unwrap()
            .with_children([b])
            .unwrap();
        let root = Annotation::new(Formula::True, 1, 6, AnnotationStyle::External)
            .unwrap()
            .with_children([a])
            .unwrap();
        let file = SourceCodeFile::new("hollow.c", Formula::True, root);

        let projection = project_source(&file, &numbered(6), &configuration("F=1,G=0"), false).unwrap();
        assert_eq!(projection.surviving_lines, vec![1, 6]);

        let a = projection.ground_truth.variant_annotation(AnnotationId(1)).unwrap();
        assert!(a.range().is_empty());
        assert_eq!(a.range(), LineRange::empty_at(2));
    }

    #[test]
    fn test_dense_chunks() {
        let projection =
            project_source(&nested_file(), &numbered(10), &configuration("Base=1,F=1,G=0"), false).unwrap();
        let ranges: Vec<_> = projection.chunks.iter().map(|c| (c.from, c.to)).collect();
        assert_eq!(ranges, vec![(1, 1), (2, 2), (3, 4), (5, 5)]);
    }

    #[test]
    fn test_line_count_mismatch() {
        let err = project_source(&nested_file(), &numbered(9), &configuration("Base=1,F=1,G=1"), false)
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_unchecked_child_past_end_of_file() {
        let escaping = Annotation::new(pc("F"), 2, 5, AnnotationStyle::External).unwrap();
        let root = Annotation::from_parts_unchecked(
            Formula::True,
            LineRange::new(1, 3),
            AnnotationStyle::External,
            vec![escaping],
        );
        let file = SourceCodeFile::new("broken.c", Formula::True, root);
        let err = project_source(&file, &numbered(3), &configuration("F=1"), false).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_unassigned_feature() {
        let err = project_source(&nested_file(), &numbered(10), &configuration("Base=1"), false).unwrap_err();
        assert!(matches!(err, Error::UnassignedFeature(f) if f.name() == "F"));
    }

    #[test]
    fn test_missing_final_newline_is_preserved() {
        let root = Annotation::new(Formula::True, 1, 2, AnnotationStyle::External).unwrap();
        let file = SourceCodeFile::new("a.c", Formula::True, root);
        let projection = project_source(&file, "a\nb", &Configuration::new(), false).unwrap();
        assert_eq!(projection.text, "a\nb");
    }

    #[test]
    fn test_project_file_writes_target() {
        let spl = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        fs::create_dir_all(spl.path().join("src")).unwrap();
        fs::write(spl.path().join("src/main.c"), numbered(10)).unwrap();

        let variant = Variant::new("v1", configuration("Base=1,F=1,G=0"));
        let truth = project_file(
            &nested_file(),
            &variant,
            spl.path(),
            target.path(),
            &VariantGenerationOptions::default(),
        )
        .unwrap()
        .unwrap();

        let written = fs::read_to_string(target.path().join("src/main.c")).unwrap();
        assert_eq!(written, "line 1\nline 3\nline 7\nline 8\nline 10\n");
        assert_eq!(truth.get("src/main.c").unwrap().matching.len(), 2);
        assert_eq!(truth.artefact.files().len(), 1);
    }

    #[test]
    fn test_project_file_skips_excluded_file() {
        let spl = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();

        // The file is absent on disk, which must not matter once it is excluded.
        let variant = Variant::new("v0", configuration("Base=0"));
        let result = project_file(
            &nested_file(),
            &variant,
            spl.path(),
            target.path(),
            &VariantGenerationOptions::default(),
        )
        .unwrap();
        assert!(result.is_none());
        assert!(!target.path().join("src/main.c").exists());
    }

    #[test]
    fn test_project_file_missing_source() {
        let spl = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let variant = Variant::new("v1", configuration("Base=1,F=1,G=1"));

        let err = project_file(
            &nested_file(),
            &variant,
            spl.path(),
            target.path(),
            &VariantGenerationOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingArtefact { .. }));

        let lenient = VariantGenerationOptions::default().with_ignore_non_existent_spl_files(true);
        let result = project_file(&nested_file(), &variant, spl.path(), target.path(), &lenient).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_exclusion_report() {
        let tree: ArtefactTree = AggregateNode::new()
            .with_child(nested_file())
            .with_child(AggregateNode::new().with_condition(pc("X")).with_child(nested_file()))
            .into();

        let report = ExclusionReport::compute(&tree, &configuration("Base=0,X=0")).unwrap();
        assert_eq!(
            report,
            ExclusionReport {
                excluded_aggregates: 1,
                excluded_files: 1,
            }
        );

        assert!(ExclusionReport::compute(&tree, &configuration("Base=1")).is_err());

        let files = IncludedFiles::collect(&tree, &configuration("X=1")).unwrap();
        assert_eq!(files.len(), 2);
        let files = IncludedFiles::collect(&tree, &configuration("X=0")).unwrap();
        assert_eq!(files.len(), 1);
    }
}
