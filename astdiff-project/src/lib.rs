//! Project-wide AST diffs.
//!
//! A [`ProjectDiff`] aggregates the per-file [`Diff`]s of one change set:
//! regular diffs between two versions of a file, and move diffs that follow
//! code from one file into another. File diffs are independent of each
//! other, so [`ProjectDiffBuilder::build`] computes them on a rayon pool.
//!
//! Refactoring detection is not done here. The builder carries an opaque
//! list of refactorings produced elsewhere so that consumers get everything
//! about a change set from one value.

use std::collections::BTreeMap;
use std::sync::Arc;

use astdiff::{Diff, DiffConfig, DiffInput, TreeContext};
use facet::Facet;
use rayon::prelude::*;

#[cfg(feature = "tracing")]
use tracing::{debug, info};

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($tt:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($tt:tt)*) => {};
}

/// Configuration for building a [`ProjectDiff`].
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    /// Worker threads for per-file diffs. `None` uses rayon's global pool.
    /// Default: None
    pub threads: Option<usize>,

    /// Configuration for every regular file diff. Move diffs use the same
    /// settings with roots anchored.
    pub diff: DiffConfig,
}

/// Errors that can occur while assembling a project diff.
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum ProjectDiffError {
    /// failed to build a pool of {threads} worker threads: {message}
    ThreadPool { threads: usize, message: String },

    /// {path} was registered with a different tree context
    ContextMismatch { path: String },
}

type FileKey = (String, String);

/// Collects file diffs to compute.
///
/// Inputs naming a `(src_path, dst_path)` pair that was already added are
/// merged into the first one: mappings and cross-file moves are combined.
#[derive(Debug)]
pub struct ProjectDiffBuilder<R> {
    files: Vec<DiffInput>,
    file_index: BTreeMap<FileKey, usize>,
    moves: Vec<DiffInput>,
    move_index: BTreeMap<FileKey, usize>,
    contents_before: BTreeMap<String, String>,
    contents_after: BTreeMap<String, String>,
    src_contexts: BTreeMap<String, Arc<TreeContext>>,
    dst_contexts: BTreeMap<String, Arc<TreeContext>>,
    refactorings: Vec<R>,
}

impl<R> ProjectDiffBuilder<R> {
    /// Start a project diff from the file contents of both versions,
    /// keyed by path.
    pub fn new(
        contents_before: BTreeMap<String, String>,
        contents_after: BTreeMap<String, String>,
    ) -> Self {
        Self {
            files: Vec::new(),
            file_index: BTreeMap::new(),
            moves: Vec::new(),
            move_index: BTreeMap::new(),
            contents_before,
            contents_after,
            src_contexts: BTreeMap::new(),
            dst_contexts: BTreeMap::new(),
            refactorings: Vec::new(),
        }
    }

    /// Attach refactorings detected by another component.
    pub fn with_refactorings(mut self, refactorings: Vec<R>) -> Self {
        self.refactorings = refactorings;
        self
    }

    /// Add a diff between two versions of a file.
    pub fn add_file_diff(&mut self, input: DiffInput) -> Result<(), ProjectDiffError> {
        self.register_contexts(&input)?;
        add_or_merge(&mut self.files, &mut self.file_index, input);
        Ok(())
    }

    /// Add a diff following code that moved from `src_path` into
    /// `dst_path`, a different file.
    pub fn add_move_diff(&mut self, input: DiffInput) -> Result<(), ProjectDiffError> {
        self.register_contexts(&input)?;
        add_or_merge(&mut self.moves, &mut self.move_index, input);
        Ok(())
    }

    /// Number of distinct file diffs and move diffs added so far.
    pub fn len(&self) -> usize {
        self.files.len() + self.moves.len()
    }

    /// Whether nothing was added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register_contexts(&mut self, input: &DiffInput) -> Result<(), ProjectDiffError> {
        check_context(&self.src_contexts, &input.src_path, &input.src)?;
        check_context(&self.dst_contexts, &input.dst_path, &input.dst)?;
        self.src_contexts
            .entry(input.src_path.clone())
            .or_insert_with(|| Arc::clone(&input.src));
        self.dst_contexts
            .entry(input.dst_path.clone())
            .or_insert_with(|| Arc::clone(&input.dst));
        Ok(())
    }

    /// Compute every file diff.
    ///
    /// Diffs are returned in the order their inputs were first added,
    /// whatever order the workers finish in. Panics if a mapping names a
    /// node that is not in its tree.
    pub fn build(self, config: &ProjectConfig) -> Result<ProjectDiff<R>, ProjectDiffError> {
        #[cfg(feature = "tracing")]
        let start = std::time::Instant::now();
        let file_config = config.diff.clone();
        let move_config = DiffConfig {
            anchor_roots: true,
            ..config.diff.clone()
        };
        let files = self.files;
        let moves = self.moves;

        let run = move || {
            rayon::join(
                || compute_all(files, &file_config),
                || compute_all(moves, &move_config),
            )
        };
        let (diffs, move_diffs) = match config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| ProjectDiffError::ThreadPool {
                        threads,
                        message: e.to_string(),
                    })?;
                pool.install(run)
            }
            None => run(),
        };

        info!(
            diffs = diffs.len(),
            move_diffs = move_diffs.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "project diff built"
        );

        Ok(ProjectDiff {
            diffs,
            move_diffs,
            contents_before: self.contents_before,
            contents_after: self.contents_after,
            src_contexts: self.src_contexts,
            dst_contexts: self.dst_contexts,
            refactorings: self.refactorings,
        })
    }
}

fn check_context(
    contexts: &BTreeMap<String, Arc<TreeContext>>,
    path: &str,
    tree: &Arc<TreeContext>,
) -> Result<(), ProjectDiffError> {
    match contexts.get(path) {
        Some(known) if !Arc::ptr_eq(known, tree) => Err(ProjectDiffError::ContextMismatch {
            path: path.to_owned(),
        }),
        _ => Ok(()),
    }
}

fn add_or_merge(
    inputs: &mut Vec<DiffInput>,
    index: &mut BTreeMap<FileKey, usize>,
    input: DiffInput,
) {
    let key = (input.src_path.clone(), input.dst_path.clone());
    match index.get(&key) {
        Some(&i) => {
            debug!(src = %key.0, dst = %key.1, "merging into existing file diff");
            let existing = &mut inputs[i];
            existing.mappings.merge_mappings(&input.mappings);
            existing.moves.merge(&input.moves);
        }
        None => {
            index.insert(key, inputs.len());
            inputs.push(input);
        }
    }
}

fn compute_all(inputs: Vec<DiffInput>, config: &DiffConfig) -> Vec<Diff> {
    inputs
        .into_par_iter()
        .map(|input| Diff::compute(input, config))
        .collect()
}

/// Every diff of one change set.
#[derive(Debug)]
pub struct ProjectDiff<R> {
    diffs: Vec<Diff>,
    move_diffs: Vec<Diff>,
    contents_before: BTreeMap<String, String>,
    contents_after: BTreeMap<String, String>,
    src_contexts: BTreeMap<String, Arc<TreeContext>>,
    dst_contexts: BTreeMap<String, Arc<TreeContext>>,
    refactorings: Vec<R>,
}

impl<R> ProjectDiff<R> {
    /// Diffs between two versions of the same file, in insertion order.
    pub fn diffs(&self) -> &[Diff] {
        &self.diffs
    }

    /// Diffs following code across files, in insertion order.
    pub fn move_diffs(&self) -> &[Diff] {
        &self.move_diffs
    }

    /// Regular diffs followed by move diffs.
    pub fn all_diffs(&self) -> impl Iterator<Item = &Diff> + '_ {
        self.diffs.iter().chain(&self.move_diffs)
    }

    /// The diff between `src_path` and `dst_path`, regular diffs first.
    pub fn find_diff(&self, src_path: &str, dst_path: &str) -> Option<&Diff> {
        self.all_diffs()
            .find(|d| d.src_path() == src_path && d.dst_path() == dst_path)
    }

    /// File contents of the old version, keyed by path.
    pub fn file_contents_before(&self) -> &BTreeMap<String, String> {
        &self.contents_before
    }

    /// File contents of the new version, keyed by path.
    pub fn file_contents_after(&self) -> &BTreeMap<String, String> {
        &self.contents_after
    }

    /// Tree of the old version of `path`.
    pub fn src_context(&self, path: &str) -> Option<&Arc<TreeContext>> {
        self.src_contexts.get(path)
    }

    /// Tree of the new version of `path`.
    pub fn dst_context(&self, path: &str) -> Option<&Arc<TreeContext>> {
        self.dst_contexts.get(path)
    }

    /// Trees of the old version, keyed by path.
    pub fn src_contexts(&self) -> &BTreeMap<String, Arc<TreeContext>> {
        &self.src_contexts
    }

    /// Trees of the new version, keyed by path.
    pub fn dst_contexts(&self) -> &BTreeMap<String, Arc<TreeContext>> {
        &self.dst_contexts
    }

    /// Refactorings attached by the caller.
    pub fn refactorings(&self) -> &[R] {
        &self.refactorings
    }

    /// Replace the attached refactorings, typically once detection has run
    /// over this diff.
    pub fn set_refactorings(&mut self, refactorings: Vec<R>) {
        self.refactorings = refactorings;
    }
}
