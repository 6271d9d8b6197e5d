//! Per-commit orchestration of variant generation.
//!
//! [`simulate_commit`] only wires up the pipeline:
//!
//! ```text
//! checkout SPL commit ──┬─> feature model ──> sample ──┐
//!                       └─> artefact tree ─────────────┴─> generate + commit variants
//! ```
//!
//! Each step is a [`Lazy`] holding its prerequisites, so no repository is
//! touched until [`CommitSimulation::report`] is called.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use log::{info, warn};

use crate::artefact::ArtefactTree;
use crate::batch::{generate_variant, VariantResult};
use crate::collaborators::{CommitId, Repository, SamplingStrategy, TraceExtractor};
use crate::config::{FeatureModel, Variant};
use crate::error::{Error, Result};
use crate::lazy::Lazy;
use crate::options::VariantGenerationOptions;

#[derive(Debug)]
pub struct VariantCommit {
    pub result: VariantResult,
    /// `None` when the variant did not change.
    pub commit: Option<CommitId>,
}

#[derive(Debug)]
pub struct CommitReport {
    pub spl_commit: CommitId,
    pub variants: Vec<VariantCommit>,
}

impl CommitReport {
    pub fn changed_variants(&self) -> impl Iterator<Item = &VariantCommit> {
        self.variants.iter().filter(|v| v.commit.is_some())
    }
}

type Step<T> = Rc<Lazy<Result<T>>>;

/// Pending simulation of one SPL commit.
pub struct CommitSimulation {
    report: Lazy<Result<CommitReport>>,
}

impl CommitSimulation {
    /// Runs the pipeline on first call.
    pub fn report(&self) -> std::result::Result<&CommitReport, &Error> {
        self.report.get().as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.report.is_evaluated()
    }
}

fn force<'a, T>(step: &'static str, lazy: &'a Lazy<Result<T>>) -> Result<&'a T> {
    lazy.get().as_ref().map_err(|err| Error::Prerequisite {
        step,
        message: err.to_string(),
    })
}

/// Prepares the generation of all sampled variants for `commit`.
///
/// Every variant lives on its own branch of `variants`, named after the
/// variant, and receives one commit per simulated SPL commit.
pub fn simulate_commit<R, W, E, S>(
    spl: Rc<RefCell<R>>,
    variants: Rc<RefCell<W>>,
    extractor: Rc<E>,
    sampler: Rc<RefCell<S>>,
    commit: CommitId,
    options: VariantGenerationOptions,
) -> CommitSimulation
where
    R: Repository + 'static,
    W: Repository + 'static,
    E: TraceExtractor + 'static,
    S: SamplingStrategy + 'static,
{
    let checkout: Step<PathBuf> = {
        let spl = Rc::clone(&spl);
        let commit = commit.clone();
        Rc::new(Lazy::new(move || {
            let mut spl = spl.borrow_mut();
            if spl.stash_create()?.is_some() {
                warn!("discarding uncommitted changes in SPL working tree");
                spl.drop_stash()?;
            }
            spl.checkout_commit(&commit)?;
            info!("checked out SPL commit {}", commit);
            Ok(spl.root().to_path_buf())
        }))
    };

    let feature_model: Step<FeatureModel> = {
        let checkout = Rc::clone(&checkout);
        let extractor = Rc::clone(&extractor);
        let commit = commit.clone();
        Rc::new(Lazy::new(move || {
            let root = force("checkout", &checkout)?;
            extractor.feature_model(&commit, root)
        }))
    };

    let tree: Step<ArtefactTree> = {
        let checkout = Rc::clone(&checkout);
        let extractor = Rc::clone(&extractor);
        let commit = commit.clone();
        Rc::new(Lazy::new(move || {
            let root = force("checkout", &checkout)?;
            let tree = extractor.extract(&commit, root)?;
            tree.validate()?;
            Ok(tree)
        }))
    };

    let sample: Step<Vec<Variant>> = {
        let feature_model = Rc::clone(&feature_model);
        Rc::new(Lazy::new(move || {
            let model = force("feature model", &feature_model)?;
            sampler.borrow_mut().sample(model)
        }))
    };

    let report = Lazy::new(move || {
        let spl_root = force("checkout", &checkout)?;
        let tree = force("trace extraction", &tree)?;
        let sample = force("sampling", &sample)?;

        let mut report = CommitReport {
            spl_commit: commit.clone(),
            variants: Vec::with_capacity(sample.len()),
        };
        for variant in sample {
            let mut repo = variants.borrow_mut();
            repo.checkout_branch(&variant.name)?;
            if repo.stash_create()?.is_some() {
                repo.drop_stash()?;
            }
            // Files the SPL no longer produces must not survive from the last generation.
            repo.clear_working_tree()?;

            let result = generate_variant(tree, variant, spl_root, repo.root(), &options)?;
            let variant_commit = repo.commit(&format!("variant {} at {}", variant.name, commit))?;
            match &variant_commit {
                Some(id) => info!("variant {} committed as {}", variant.name, id),
                None => info!("variant {} unchanged", variant.name),
            }
            report.variants.push(VariantCommit {
                result,
                commit: variant_commit,
            });
        }
        Ok(report)
    });

    CommitSimulation { report }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;

    use test_log::test;

    use crate::artefact::{AggregateNode, Annotation, AnnotationStyle, SourceCodeFile};
    use crate::collaborators::FixedSample;
    use crate::formula::{Feature, Formula};

    /// Working tree on disk with an in-memory event log instead of history.
    struct FakeRepo {
        dir: tempfile::TempDir,
        events: Rc<RefCell<Vec<String>>>,
        commits: usize,
        snapshots: BTreeMap<String, String>,
        branch: String,
    }

    impl FakeRepo {
        fn new(events: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                events: Rc::clone(events),
                commits: 0,
                snapshots: BTreeMap::new(),
                branch: "main".into(),
            }
        }

        fn snapshot(&self) -> String {
            let mut out = String::new();
            for entry in walk(self.dir.path()) {
                out.push_str(&fs::read_to_string(entry).unwrap());
            }
            out
        }
    }

    fn walk(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                files.extend(walk(&path));
            } else {
                files.push(path);
            }
        }
        files.sort();
        files
    }

    impl Repository for FakeRepo {
        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn checkout_commit(&mut self, commit: &CommitId) -> Result<()> {
            self.events.borrow_mut().push(format!("checkout {}", commit));
            fs::write(self.dir.path().join("main.c"), "a\nb\nc\n").map_err(|e| Error::io("main.c", e))
        }

        fn checkout_branch(&mut self, name: &str) -> Result<()> {
            self.events.borrow_mut().push(format!("branch {}", name));
            self.branch = name.to_string();
            Ok(())
        }

        fn commit(&mut self, _message: &str) -> Result<Option<CommitId>> {
            let snapshot = self.snapshot();
            if self.snapshots.get(&self.branch) == Some(&snapshot) {
                return Ok(None);
            }
            self.snapshots.insert(self.branch.clone(), snapshot);
            self.commits += 1;
            Ok(Some(CommitId::new(format!("c{}", self.commits))))
        }

        fn current_commit(&self) -> Result<CommitId> {
            Ok(CommitId::new(format!("c{}", self.commits)))
        }

        fn stash_create(&mut self) -> Result<Option<CommitId>> {
            Ok(None)
        }

        fn drop_stash(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct Extractor {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl TraceExtractor for Extractor {
        fn extract(&self, commit: &CommitId, _spl_root: &Path) -> Result<ArtefactTree> {
            self.events.borrow_mut().push(format!("extract {}", commit));
            let inner = Annotation::new(Formula::var("F"), 2, 2, AnnotationStyle::External)?;
            let root = Annotation::new(Formula::True, 1, 3, AnnotationStyle::External)?.with_children([inner])?;
            Ok(SourceCodeFile::new("main.c", Formula::True, root).into())
        }

        fn feature_model(&self, _commit: &CommitId, _spl_root: &Path) -> Result<FeatureModel> {
            Ok(FeatureModel::new([Feature::new("F")], Formula::True))
        }
    }

    struct Setup {
        events: Rc<RefCell<Vec<String>>>,
        spl: Rc<RefCell<FakeRepo>>,
        variants: Rc<RefCell<FakeRepo>>,
        extractor: Rc<Extractor>,
        sampler: Rc<RefCell<FixedSample>>,
    }

    fn setup() -> Setup {
        let events = Rc::new(RefCell::new(Vec::new()));
        Setup {
            spl: Rc::new(RefCell::new(FakeRepo::new(&events))),
            variants: Rc::new(RefCell::new(FakeRepo::new(&events))),
            extractor: Rc::new(Extractor {
                events: Rc::clone(&events),
            }),
            sampler: Rc::new(RefCell::new(FixedSample::new([
                Variant::new("with_f", "F=1".parse().unwrap()),
                Variant::new("without_f", "F=0".parse().unwrap()),
            ]))),
            events,
        }
    }

    fn simulate(setup: &Setup, commit: &str) -> CommitSimulation {
        simulate_commit(
            Rc::clone(&setup.spl),
            Rc::clone(&setup.variants),
            Rc::clone(&setup.extractor),
            Rc::clone(&setup.sampler),
            CommitId::new(commit),
            VariantGenerationOptions::default(),
        )
    }

    #[test]
    fn test_nothing_happens_before_report() {
        let setup = setup();
        let simulation = simulate(&setup, "r1");
        assert!(!simulation.is_started());
        assert!(setup.events.borrow().is_empty());

        let report = simulation.report().unwrap();
        assert_eq!(report.spl_commit, CommitId::new("r1"));
        assert_eq!(
            *setup.events.borrow(),
            vec!["checkout r1", "extract r1", "branch with_f", "branch without_f"]
        );
    }

    #[test]
    fn test_variants_generated_and_committed() {
        let setup = setup();
        let simulation = simulate(&setup, "r1");
        let report = simulation.report().unwrap();

        assert_eq!(report.variants.len(), 2);
        assert_eq!(report.changed_variants().count(), 2);
        let with_f = &report.variants[0].result;
        assert_eq!(with_f.variant, "with_f");
        assert_eq!(with_f.ground_truth.get("main.c").unwrap().matching.len(), 2);
        let without_f = &report.variants[1].result;
        assert_eq!(without_f.ground_truth.get("main.c").unwrap().matching.len(), 1);

        // The same revision again changes nothing.
        let again = simulate(&setup, "r1");
        assert_eq!(again.report().unwrap().changed_variants().count(), 0);
    }

    #[test]
    fn test_removed_file_leaves_variant() {
        struct Shrinking;
        impl TraceExtractor for Shrinking {
            fn extract(&self, commit: &CommitId, _spl_root: &Path) -> Result<ArtefactTree> {
                let file = |path: &str| -> Result<ArtefactTree> {
                    let root = Annotation::new(Formula::True, 1, 1, AnnotationStyle::External)?;
                    Ok(SourceCodeFile::new(path, Formula::True, root).into())
                };
                let mut node = AggregateNode::new().with_child(file("a.c")?);
                if commit.0 == "r1" {
                    node = node.with_child(file("b.c")?);
                }
                Ok(node.into())
            }
            fn feature_model(&self, _: &CommitId, _: &Path) -> Result<FeatureModel> {
                Ok(FeatureModel::new([Feature::new("F")], Formula::True))
            }
        }

        let setup = setup();
        for name in ["a.c", "b.c"] {
            fs::write(setup.spl.borrow().root().join(name), format!("{}\n", name)).unwrap();
        }
        let git = setup.variants.borrow().root().join(".git");
        fs::create_dir(&git).unwrap();
        fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();

        let run = |commit: &str| {
            simulate_commit(
                Rc::clone(&setup.spl),
                Rc::clone(&setup.variants),
                Rc::new(Shrinking),
                Rc::clone(&setup.sampler),
                CommitId::new(commit),
                VariantGenerationOptions::default(),
            )
        };

        let r1 = run("r1");
        assert!(r1.report().unwrap().variants[0].result.ground_truth.get("b.c").is_some());
        assert!(setup.variants.borrow().root().join("b.c").exists());

        let r2 = run("r2");
        let report = r2.report().unwrap();
        assert!(report.variants[0].result.ground_truth.get("b.c").is_none());
        assert_eq!(report.changed_variants().count(), 2);

        let variants = setup.variants.borrow();
        assert!(variants.root().join("a.c").exists());
        assert!(!variants.root().join("b.c").exists());
        assert!(git.join("HEAD").exists());
    }

    #[test]
    fn test_failed_prerequisite_is_reported() {
        struct Broken;
        impl TraceExtractor for Broken {
            fn extract(&self, _: &CommitId, _: &Path) -> Result<ArtefactTree> {
                Err(Error::Repository("no traces".into()))
            }
            fn feature_model(&self, _: &CommitId, _: &Path) -> Result<FeatureModel> {
                Ok(FeatureModel::new(Vec::<Feature>::new(), Formula::True))
            }
        }

        let setup = setup();
        let simulation = simulate_commit(
            Rc::clone(&setup.spl),
            Rc::clone(&setup.variants),
            Rc::new(Broken),
            Rc::clone(&setup.sampler),
            CommitId::new("r1"),
            VariantGenerationOptions::default(),
        );
        let err = simulation.report().unwrap_err();
        assert!(matches!(err, Error::Prerequisite { step: "trace extraction", .. }));
    }
}
