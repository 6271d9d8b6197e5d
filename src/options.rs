//! Policy knobs of variant generation.

use std::fmt::{self, Debug, Formatter};
use std::path::Path;
use std::sync::Arc;

use crate::artefact::SourceCodeFile;

/// Predicate deciding which SPL files take part in generation at all,
/// independently of their presence conditions.
#[derive(Clone)]
pub struct ArtefactFilter(Arc<dyn Fn(&SourceCodeFile) -> bool + Send + Sync>);

impl ArtefactFilter {
    pub fn new(predicate: impl Fn(&SourceCodeFile) -> bool + Send + Sync + 'static) -> Self {
        ArtefactFilter(Arc::new(predicate))
    }

    pub fn accept_all() -> Self {
        ArtefactFilter::new(|_| true)
    }

    /// Rejects the files whose paths are listed.
    pub fn exclude_paths<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        let excluded: Vec<_> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        ArtefactFilter::new(move |file| !excluded.iter().any(|p| p == file.path()))
    }

    pub fn accepts(&self, file: &SourceCodeFile) -> bool {
        (self.0)(file)
    }
}

impl Default for ArtefactFilter {
    fn default() -> Self {
        ArtefactFilter::accept_all()
    }
}

impl Debug for ArtefactFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("ArtefactFilter(..)")
    }
}

#[derive(Debug, Clone)]
pub struct VariantGenerationOptions {
    /// Abort the batch on the first per-file failure instead of recording it.
    pub exit_on_error: bool,
    /// Skip SPL files missing on disk instead of failing.
    pub ignore_non_existent_spl_files: bool,
    /// Keep the marker lines of internal annotations in the output.
    pub with_macros: bool,
    pub filter: ArtefactFilter,
    /// Number of worker threads for batch generation.
    pub workers: usize,
}

impl Default for VariantGenerationOptions {
    fn default() -> Self {
        Self {
            exit_on_error: true,
            ignore_non_existent_spl_files: false,
            with_macros: false,
            filter: ArtefactFilter::default(),
            workers: 1,
        }
    }
}

impl VariantGenerationOptions {
    pub fn with_exit_on_error(mut self, exit_on_error: bool) -> Self {
        self.exit_on_error = exit_on_error;
        self
    }

    pub fn with_ignore_non_existent_spl_files(mut self, ignore: bool) -> Self {
        self.ignore_non_existent_spl_files = ignore;
        self
    }

    pub fn with_macros(mut self, with_macros: bool) -> Self {
        self.with_macros = with_macros;
        self
    }

    pub fn with_filter(mut self, filter: ArtefactFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub(crate) fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}
