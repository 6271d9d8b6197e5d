//! Interfaces of the collaborators around the projection engine.
//!
//! Version control, trace extraction and sampling live outside this crate;
//! [`simulate_commit`][crate::evolution::simulate_commit] drives them through
//! these traits.

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::Path;

use log::debug;

use crate::artefact::ArtefactTree;
use crate::config::{FeatureModel, Variant};
use crate::error::{Error, Result};

/// Top-level entries of a working tree that belong to version control.
const VCS_METADATA: &[&str] = &[".git"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(pub String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        CommitId(id.into())
    }
}

impl Display for CommitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A version-controlled working tree.
pub trait Repository {
    /// Root of the working tree.
    fn root(&self) -> &Path;

    fn checkout_commit(&mut self, commit: &CommitId) -> Result<()>;

    /// Switches to `name`, creating the branch if needed.
    fn checkout_branch(&mut self, name: &str) -> Result<()>;

    /// Records the working tree. `None` if nothing changed.
    fn commit(&mut self, message: &str) -> Result<Option<CommitId>>;

    fn current_commit(&self) -> Result<CommitId>;

    /// Moves uncommitted changes aside. `None` if the tree was clean.
    fn stash_create(&mut self) -> Result<Option<CommitId>>;

    fn drop_stash(&mut self) -> Result<()>;

    /// Deletes every file of the working tree except version control metadata.
    fn clear_working_tree(&mut self) -> Result<()> {
        let root = self.root();
        for entry in fs::read_dir(root).map_err(|e| Error::io(root, e))? {
            let path = entry.map_err(|e| Error::io(root, e))?.path();
            if path
                .file_name()
                .is_some_and(|name| VCS_METADATA.iter().any(|vcs| name == *vcs))
            {
                continue;
            }
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|e| Error::io(&path, e))?;
        }
        Ok(())
    }
}

/// Supplies what is known about one SPL revision once it is checked out.
pub trait TraceExtractor {
    fn extract(&self, commit: &CommitId, spl_root: &Path) -> Result<ArtefactTree>;

    fn feature_model(&self, commit: &CommitId, spl_root: &Path) -> Result<FeatureModel>;
}

pub trait SamplingStrategy {
    fn sample(&mut self, model: &FeatureModel) -> Result<Vec<Variant>>;
}

/// Always returns the same variants.
#[derive(Debug, Clone, Default)]
pub struct FixedSample {
    variants: Vec<Variant>,
}

impl FixedSample {
    pub fn new(variants: impl IntoIterator<Item = Variant>) -> Self {
        Self {
            variants: variants.into_iter().collect(),
        }
    }
}

impl SamplingStrategy for FixedSample {
    fn sample(&mut self, _model: &FeatureModel) -> Result<Vec<Variant>> {
        Ok(self.variants.clone())
    }
}

/// Keeps the previous sample as long as it still fits the feature model.
///
/// A sample is reused when the model's feature set is unchanged and every
/// configuration still satisfies the model's constraint; otherwise the inner
/// strategy samples afresh.
#[derive(Debug, Clone)]
pub struct ReusingSampler<S> {
    inner: S,
    previous: Option<(FeatureModel, Vec<Variant>)>,
    reused: usize,
}

impl<S> ReusingSampler<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            previous: None,
            reused: 0,
        }
    }

    /// How often a previous sample was handed out again.
    pub fn reused(&self) -> usize {
        self.reused
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: SamplingStrategy> SamplingStrategy for ReusingSampler<S> {
    fn sample(&mut self, model: &FeatureModel) -> Result<Vec<Variant>> {
        if let Some((previous_model, variants)) = &self.previous {
            let mut reusable = previous_model.features == model.features;
            for variant in variants {
                if !reusable {
                    break;
                }
                reusable = model.is_valid(&variant.configuration)?;
            }
            if reusable {
                debug!("reusing sample of {} variants", variants.len());
                self.reused += 1;
                let variants = variants.clone();
                self.previous = Some((model.clone(), variants.clone()));
                return Ok(variants);
            }
            debug!("feature model changed, resampling");
        }

        let variants = self.inner.sample(model)?;
        self.previous = Some((model.clone(), variants.clone()));
        Ok(variants)
    }
}
