//! Provenance of generated variants.
//!
//! A [`BlockMatching`] links every annotation that survived projection to its
//! mirror in the generated file. It is filled only while a file is projected
//! and is read-only afterwards. An SPL annotation missing from the matching was
//! excluded by the variant's configuration; there is no third state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::artefact::{AggregateNode, Annotation, AnnotationId, ArtefactTree, SourceCodeFile};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockMatching {
    spl_to_variant: BTreeMap<AnnotationId, AnnotationId>,
    variant_to_spl: BTreeMap<AnnotationId, AnnotationId>,
}

impl BlockMatching {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, spl: AnnotationId, variant: AnnotationId) -> Result<()> {
        if self.spl_to_variant.contains_key(&spl) || self.variant_to_spl.contains_key(&variant) {
            return Err(Error::invariant(format!(
                "annotation pair ({}, {}) registered twice",
                spl, variant
            )));
        }
        self.spl_to_variant.insert(spl, variant);
        self.variant_to_spl.insert(variant, spl);
        Ok(())
    }

    pub fn spl_to_variant(&self, spl: AnnotationId) -> Option<AnnotationId> {
        self.spl_to_variant.get(&spl).copied()
    }

    pub fn variant_to_spl(&self, variant: AnnotationId) -> Option<AnnotationId> {
        self.variant_to_spl.get(&variant).copied()
    }

    pub fn is_present_in_variant(&self, spl: AnnotationId) -> bool {
        self.spl_to_variant.contains_key(&spl)
    }

    pub fn len(&self) -> usize {
        self.spl_to_variant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spl_to_variant.is_empty()
    }

    /// Pairs in ascending SPL order.
    pub fn pairs(&self) -> impl Iterator<Item = (AnnotationId, AnnotationId)> + '_ {
        self.spl_to_variant.iter().map(|(&s, &v)| (s, v))
    }

    /// Checks `variant_to_spl(spl_to_variant(s)) == s` for every key.
    pub fn verify_round_trip(&self) -> Result<()> {
        if self.spl_to_variant.len() != self.variant_to_spl.len() {
            return Err(Error::invariant("block matching tables differ in size"));
        }
        for (&spl, &variant) in &self.spl_to_variant {
            if self.variant_to_spl.get(&variant) != Some(&spl) {
                return Err(Error::invariant(format!(
                    "block matching does not round-trip for {}",
                    spl
                )));
            }
        }
        Ok(())
    }
}

/// Matching of one source file between the SPL and one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationGroundTruth {
    pub spl_artefact: SourceCodeFile,
    pub variant_artefact: SourceCodeFile,
    pub matching: BlockMatching,
}

impl AnnotationGroundTruth {
    pub fn is_present_in_variant(&self, spl: AnnotationId) -> bool {
        self.matching.is_present_in_variant(spl)
    }

    /// The generated mirror of an SPL annotation, if it survived.
    pub fn variant_annotation(&self, spl: AnnotationId) -> Option<&Annotation> {
        let id = self.matching.spl_to_variant(spl)?;
        self.variant_artefact.root().find(id)
    }

    /// The SPL origin of a generated annotation.
    pub fn spl_annotation(&self, variant: AnnotationId) -> Option<&Annotation> {
        let id = self.matching.variant_to_spl(variant)?;
        self.spl_artefact.root().find(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruth {
    pub artefact: ArtefactTree,
    pub file_matches: BTreeMap<PathBuf, AnnotationGroundTruth>,
}

impl GroundTruth {
    pub fn empty() -> Self {
        Self {
            artefact: AggregateNode::new().into(),
            file_matches: BTreeMap::new(),
        }
    }

    pub fn for_source_code_file(file: SourceCodeFile, matches: AnnotationGroundTruth) -> Self {
        let path = file.path().to_path_buf();
        Self {
            artefact: file.into(),
            file_matches: BTreeMap::from([(path, matches)]),
        }
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&AnnotationGroundTruth> {
        self.file_matches.get(path.as_ref())
    }

    /// Combines the results of several files of one variant.
    ///
    /// Matchings stay per file; a path present on both sides is an error.
    /// The variant-side artefacts are laid out flat: files end up as direct
    /// children of one unconditioned aggregate, and the SPL's aggregate
    /// hierarchy and conditions are not reproduced. Look files up by path
    /// through [`get`][GroundTruth::get] instead of walking the tree.
    pub fn merge(self, other: GroundTruth) -> Result<GroundTruth> {
        let mut file_matches = self.file_matches;
        for (path, matches) in other.file_matches {
            if file_matches.contains_key(&path) {
                return Err(Error::invariant(format!(
                    "ground truth for {} produced twice",
                    path.display()
                )));
            }
            file_matches.insert(path, matches);
        }

        let mut artefact = match self.artefact {
            ArtefactTree::Aggregate(node) if node.condition().is_true() => node,
            other => AggregateNode::new().with_child(other),
        };
        match other.artefact {
            ArtefactTree::Aggregate(node) if node.condition().is_true() => {
                for child in node.children() {
                    artefact.push(child.clone());
                }
            }
            other => artefact.push(other),
        }

        Ok(GroundTruth {
            artefact: artefact.into(),
            file_matches,
        })
    }
}
