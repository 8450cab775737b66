//! Per-file diff orchestration.

use std::sync::{Arc, OnceLock};

use crate::action::{EditScript, EditScriptBuilder};
use crate::apply::{ReplayError, replay};
use crate::chawathe::generate_edit_script;
use crate::classifier::TreeClassifier;
use crate::mapping::MultiMappingStore;
use crate::multi_move::generate_multi_move_actions;
use crate::simplify::{CrossFileMoves, apply_cross_file_moves, simplify_edit_script};
use crate::tree::TreeContext;
use crate::{debug, trace};

/// Configuration for edit script computation.
#[derive(Debug, Clone)]
pub struct DiffConfig {
    /// Collapse whole-subtree insertions and deletions into
    /// `TreeInsert`/`TreeDelete`.
    /// Default: true
    pub simplify: bool,

    /// Append a `MultiMove` for every many-to-many group of the mappings.
    /// Default: true
    pub multi_moves: bool,

    /// Pair the two roots for script generation when neither is mapped.
    /// The stored mappings are left untouched. Used for diffs of code that
    /// moved between files, whose roots are unrelated.
    /// Default: false
    pub anchor_roots: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            simplify: true,
            multi_moves: true,
            anchor_roots: false,
        }
    }
}

/// Everything a [`Diff`] is computed from.
#[derive(Debug, Clone)]
pub struct DiffInput {
    /// Path label of the src file
    pub src_path: String,
    /// Path label of the dst file
    pub dst_path: String,
    /// The src tree
    pub src: Arc<TreeContext>,
    /// The dst tree
    pub dst: Arc<TreeContext>,
    /// Node correspondence produced by a matcher
    pub mappings: MultiMappingStore,
    /// Subtrees known to have moved to or from other files
    pub moves: CrossFileMoves,
}

impl DiffInput {
    /// Input without cross-file moves.
    pub fn new(
        src_path: impl Into<String>,
        dst_path: impl Into<String>,
        src: Arc<TreeContext>,
        dst: Arc<TreeContext>,
        mappings: MultiMappingStore,
    ) -> Self {
        Self {
            src_path: src_path.into(),
            dst_path: dst_path.into(),
            src,
            dst,
            mappings,
            moves: CrossFileMoves::default(),
        }
    }

    /// Attach cross-file move hints.
    pub fn with_moves(mut self, moves: CrossFileMoves) -> Self {
        self.moves = moves;
        self
    }
}

/// The edit script and classification for one pair of file versions.
#[derive(Debug)]
pub struct Diff {
    src_path: String,
    dst_path: String,
    src: Arc<TreeContext>,
    dst: Arc<TreeContext>,
    mappings: MultiMappingStore,
    script: EditScript,
    classifier: OnceLock<TreeClassifier>,
}

impl Diff {
    /// Compute the edit script for `input`.
    ///
    /// Panics if a mapping names a node that is not in its tree.
    pub fn compute(input: DiffInput, config: &DiffConfig) -> Self {
        input.mappings.validate(&input.src, &input.dst);
        let script = compute_edit_script(
            &input.src,
            &input.dst,
            &input.mappings,
            &input.moves,
            config,
        );
        Self::assemble(input, script)
    }

    /// Wrap a script that was already finalized elsewhere.
    ///
    /// Panics if a mapping or an action names a node that is not in its
    /// tree.
    pub fn from_edit_script(input: DiffInput, script: EditScript) -> Self {
        input.mappings.validate(&input.src, &input.dst);
        script.validate(&input.src, &input.dst);
        Self::assemble(input, script)
    }

    fn assemble(input: DiffInput, script: EditScript) -> Self {
        Self {
            src_path: input.src_path,
            dst_path: input.dst_path,
            src: input.src,
            dst: input.dst,
            mappings: input.mappings,
            script,
            classifier: OnceLock::new(),
        }
    }

    /// Path label of the src file.
    pub fn src_path(&self) -> &str {
        &self.src_path
    }

    /// Path label of the dst file.
    pub fn dst_path(&self) -> &str {
        &self.dst_path
    }

    /// The src tree.
    pub fn src_tree(&self) -> &Arc<TreeContext> {
        &self.src
    }

    /// The dst tree.
    pub fn dst_tree(&self) -> &Arc<TreeContext> {
        &self.dst
    }

    /// The full many-to-many mapping.
    pub fn mappings(&self) -> &MultiMappingStore {
        &self.mappings
    }

    /// The finalized edit script.
    pub fn edit_script(&self) -> &EditScript {
        &self.script
    }

    /// Root-only classification of the edit script, computed on first use.
    pub fn classifier(&self) -> &TreeClassifier {
        self.classifier.get_or_init(|| {
            TreeClassifier::classify(&self.script, &self.mappings, &self.src, &self.dst)
        })
    }

    /// Replay the edit script against a copy of the src tree.
    pub fn replay(&self) -> Result<TreeContext, ReplayError> {
        replay(&self.src, &self.dst, &self.script)
    }
}

/// Run the whole pipeline: derive the 1:1 mapping, generate the Chawathe
/// script, simplify it, apply cross-file moves, append multi-moves and
/// finalize.
pub fn compute_edit_script(
    src: &TreeContext,
    dst: &TreeContext,
    mappings: &MultiMappingStore,
    moves: &CrossFileMoves,
    config: &DiffConfig,
) -> EditScript {
    #[cfg(feature = "tracing")]
    let start = std::time::Instant::now();
    let mut mono = mappings.mono_mapping_store();
    if config.anchor_roots && !mono.contains_src(src.root()) && !mono.contains_dst(dst.root()) {
        trace!("anchoring roots for script generation");
        mono.add(src.root(), dst.root());
    }

    let mut actions = generate_edit_script(src, dst, &mono);
    if config.simplify {
        actions = simplify_edit_script(actions, src, dst);
    }
    actions = apply_cross_file_moves(actions, moves, src, dst);

    let mut builder = EditScriptBuilder::from_actions(actions);
    if config.multi_moves {
        for action in generate_multi_move_actions(mappings) {
            builder.push(action);
        }
    }
    let script = builder.finalize();
    debug!(
        actions = script.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "compute_edit_script done"
    );
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::tree::AstNode;
    use facet_testhelpers::test;

    #[test]
    fn test_anchor_roots_keeps_the_root() {
        let mut src = TreeContext::new(AstNode::unlabeled("CompilationUnit"));
        let moved = src.add_child(src.root(), AstNode::new("Method", "run"));
        let mut dst = TreeContext::new(AstNode::unlabeled("CompilationUnit"));
        let moved_b = dst.add_child(dst.root(), AstNode::new("Method", "run"));

        let mut m = MultiMappingStore::new();
        m.add_mapping(moved, moved_b);
        let input = DiffInput::new("A.java", "B.java", Arc::new(src), Arc::new(dst), m);

        let plain = Diff::compute(input.clone(), &DiffConfig::default());
        assert!(
            plain
                .edit_script()
                .iter()
                .any(|a| matches!(a, Action::Delete { .. })),
            "unanchored roots are replaced: {:?}",
            plain.edit_script()
        );

        let anchored = Diff::compute(
            input,
            &DiffConfig {
                anchor_roots: true,
                ..Default::default()
            },
        );
        assert!(anchored.edit_script().is_empty(), "{:?}", anchored.edit_script());
        assert!(!anchored.mappings().is_src_mapped(anchored.src_tree().root()));
        assert!(anchored.replay().unwrap().structurally_eq(anchored.dst_tree()));
    }

    #[test]
    fn test_classifier_is_cached() {
        let src = Arc::new(TreeContext::new(AstNode::unlabeled("Block")));
        let dst = Arc::new(TreeContext::new(AstNode::unlabeled("Block")));
        let mut m = MultiMappingStore::new();
        m.add_mapping(src.root(), dst.root());
        let diff = Diff::compute(DiffInput::new("a", "b", src, dst, m), &DiffConfig::default());
        let first: *const TreeClassifier = diff.classifier();
        let second: *const TreeClassifier = diff.classifier();
        assert_eq!(first, second);
    }
}
