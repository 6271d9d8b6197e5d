//! Generation of whole variants.
//!
//! Every `(variant, file)` pair is an independent job: the SPL tree is shared
//! read-only and each job writes its own target file. Jobs run on a bounded
//! pool of scoped threads fed through a channel; results are reassembled in
//! job order so the outcome does not depend on scheduling.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use log::{debug, info, warn};

use crate::artefact::{ArtefactTree, SourceCodeFile};
use crate::config::Variant;
use crate::error::{Error, Result};
use crate::ground_truth::GroundTruth;
use crate::options::VariantGenerationOptions;
use crate::projector::{project_file, IncludedFiles};

/// Outcome of generating one variant.
#[derive(Debug)]
pub struct VariantResult {
    pub variant: String,
    pub ground_truth: GroundTruth,
    /// Files that failed recoverably while `exit_on_error` was off.
    pub failures: Vec<(PathBuf, Error)>,
}

impl VariantResult {
    fn new(variant: &Variant) -> Self {
        Self {
            variant: variant.name.clone(),
            ground_truth: GroundTruth::empty(),
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Job<'t> {
    seq: usize,
    variant: usize,
    file: &'t SourceCodeFile,
}

struct Outcome {
    seq: usize,
    variant: usize,
    path: PathBuf,
    result: Result<Option<GroundTruth>>,
}

/// Generates one variant of `tree` into `target_root`.
pub fn generate_variant(
    tree: &ArtefactTree,
    variant: &Variant,
    spl_root: &Path,
    target_root: &Path,
    options: &VariantGenerationOptions,
) -> Result<VariantResult> {
    let mut results = run(tree, &[(variant, target_root.to_path_buf())], spl_root, options)?;
    results
        .pop()
        .ok_or_else(|| Error::invariant("variant generation produced no result"))
}

/// Generates every variant of `tree`, each into `target_root/<variant name>`.
///
/// Results come back in the order of `variants`.
pub fn generate_variants(
    tree: &ArtefactTree,
    variants: &[Variant],
    spl_root: &Path,
    target_root: &Path,
    options: &VariantGenerationOptions,
) -> Result<Vec<VariantResult>> {
    let targets: Vec<(&Variant, PathBuf)> = variants
        .iter()
        .map(|variant| (variant, target_root.join(&variant.name)))
        .collect();
    run(tree, &targets, spl_root, options)
}

fn run(
    tree: &ArtefactTree,
    targets: &[(&Variant, PathBuf)],
    spl_root: &Path,
    options: &VariantGenerationOptions,
) -> Result<Vec<VariantResult>> {
    let mut jobs = Vec::new();
    for (index, (variant, _)) in targets.iter().enumerate() {
        for file in IncludedFiles::collect(tree, &variant.configuration)? {
            jobs.push(Job {
                seq: jobs.len(),
                variant: index,
                file,
            });
        }
    }

    let workers = options.effective_workers().min(jobs.len().max(1));
    info!(
        "generating {} variants: {} jobs on {} workers",
        targets.len(),
        jobs.len(),
        workers
    );

    let abort = AtomicBool::new(false);
    let mut outcomes: Vec<Outcome> = thread::scope(|scope| {
        let (work_tx, work_rx) = mpsc::sync_channel::<Job<'_>>(workers);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, result_rx) = mpsc::channel::<Outcome>();

        for _ in 0..workers {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let abort = &abort;

            scope.spawn(move || loop {
                let work = match work_rx.lock() {
                    Ok(rx) => rx.recv(),
                    Err(_) => break,
                };
                let Ok(job) = work else { break };
                if abort.load(Ordering::Relaxed) {
                    continue;
                }

                let (variant, target_root) = &targets[job.variant];
                let result = project_file(job.file, variant, spl_root, target_root, options);
                if let Err(err) = &result {
                    if options.exit_on_error || !err.is_recoverable() {
                        abort.store(true, Ordering::Relaxed);
                    }
                }
                let outcome = Outcome {
                    seq: job.seq,
                    variant: job.variant,
                    path: job.file.path().to_path_buf(),
                    result,
                };
                if result_tx.send(outcome).is_err() {
                    break;
                }
            });
        }
        drop(result_tx);

        for job in jobs {
            if abort.load(Ordering::Relaxed) {
                debug!("batch aborted, no further jobs dispatched");
                break;
            }
            if work_tx.send(job).is_err() {
                break;
            }
        }
        drop(work_tx);

        result_rx.into_iter().collect()
    });
    outcomes.sort_by_key(|outcome| outcome.seq);

    let mut results: Vec<VariantResult> = targets.iter().map(|(variant, _)| VariantResult::new(variant)).collect();
    for outcome in outcomes {
        let result = &mut results[outcome.variant];
        match outcome.result {
            Ok(Some(truth)) => {
                result.ground_truth = mem::replace(&mut result.ground_truth, GroundTruth::empty()).merge(truth)?;
            }
            Ok(None) => {}
            Err(err) if err.is_recoverable() && !options.exit_on_error => {
                warn!("variant {}: {}", result.variant, err);
                result.failures.push((outcome.path, err));
            }
            Err(err) => return Err(err),
        }
    }

    for result in &results {
        debug!(
            "variant {}: {} files, {} failures",
            result.variant,
            result.ground_truth.file_matches.len(),
            result.failures.len()
        );
    }
    Ok(results)
}
