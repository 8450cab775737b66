//! Edit script simplification.
//!
//! Consolidates redundant actions to produce cleaner scripts:
//! - When a whole subtree is inserted, report one `TreeInsert` for its root
//! - When a whole subtree is deleted, report one `TreeDelete` for its root
//! - Subtrees that moved to or from another file become `MoveOut`/`MoveIn`

use crate::action::Action;
use crate::tree::TreeContext;
use crate::{debug, trace};
use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

/// Simplify an edit script by consolidating subtree operations.
///
/// A node whose parent is inserted together with all of that parent's
/// descendants is covered by the parent and dropped. An inner node inserted
/// together with all of its descendants becomes a `TreeInsert`. Deletions
/// are handled the same way over the src tree. Leaves keep their
/// `Insert`/`Delete`.
pub fn simplify_edit_script(
    actions: Vec<Action>,
    src: &TreeContext,
    dst: &TreeContext,
) -> Vec<Action> {
    debug!(actions = actions.len(), "simplify_edit_script start");

    let mut inserted: HashSet<NodeId> = HashSet::default();
    let mut deleted: HashSet<NodeId> = HashSet::default();
    for action in &actions {
        match action {
            Action::Insert { node_b, .. } => {
                inserted.insert(*node_b);
            }
            Action::Delete { node_a } => {
                deleted.insert(*node_a);
            }
            _ => {}
        }
    }

    let whole_inserted = whole_subtrees(dst, &inserted);
    let whole_deleted = whole_subtrees(src, &deleted);

    debug!(
        inserted = inserted.len(),
        deleted = deleted.len(),
        whole_inserted = whole_inserted.len(),
        whole_deleted = whole_deleted.len(),
        "collected nodes"
    );

    let result: Vec<Action> = actions
        .into_iter()
        .filter_map(|action| match action {
            Action::Insert {
                node_b,
                parent,
                position,
            } => {
                if parent_covers(dst, node_b, &whole_inserted) {
                    trace!(node = usize::from(node_b), "simplify: insert covered by parent");
                    None
                } else if !dst.is_leaf(node_b) && whole_inserted.contains(&node_b) {
                    Some(Action::TreeInsert {
                        node_b,
                        parent,
                        position,
                    })
                } else {
                    Some(Action::Insert {
                        node_b,
                        parent,
                        position,
                    })
                }
            }
            Action::Delete { node_a } => {
                if parent_covers(src, node_a, &whole_deleted) {
                    trace!(node = usize::from(node_a), "simplify: delete covered by parent");
                    None
                } else if !src.is_leaf(node_a) && whole_deleted.contains(&node_a) {
                    Some(Action::TreeDelete { node_a })
                } else {
                    Some(Action::Delete { node_a })
                }
            }
            other => Some(other),
        })
        .collect();

    debug!(after = result.len(), "simplify_edit_script done");
    result
}

/// Nodes of `touched` whose every descendant is also in `touched`.
pub(crate) fn whole_subtrees(tree: &TreeContext, touched: &HashSet<NodeId>) -> HashSet<NodeId> {
    let mut whole = HashSet::default();
    if touched.is_empty() {
        return whole;
    }
    for n in tree.post_order() {
        if touched.contains(&n) && tree.children(n).all(|c| whole.contains(&c)) {
            whole.insert(n);
        }
    }
    whole
}

/// Whether the parent of `n` is touched along with its whole subtree.
pub(crate) fn parent_covers(tree: &TreeContext, n: NodeId, whole: &HashSet<NodeId>) -> bool {
    tree.parent(n).is_some_and(|p| whole.contains(&p))
}

/// Subtrees known to have moved between files.
///
/// Src nodes marked here left the src file; dst nodes marked here arrived
/// from another file. Only whole-subtree insertions and deletions of marked
/// nodes are rewritten.
#[derive(Debug, Clone, Default)]
pub struct CrossFileMoves {
    moved_out: HashSet<NodeId>,
    moved_in: HashSet<NodeId>,
}

impl CrossFileMoves {
    /// No cross-file moves.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the src subtree rooted at `src` as moved to another file.
    pub fn mark_moved_out(&mut self, src: NodeId) {
        self.moved_out.insert(src);
    }

    /// Mark the dst subtree rooted at `dst` as moved in from another file.
    pub fn mark_moved_in(&mut self, dst: NodeId) {
        self.moved_in.insert(dst);
    }

    /// Whether `src` was marked as moved out.
    pub fn is_moved_out(&self, src: NodeId) -> bool {
        self.moved_out.contains(&src)
    }

    /// Whether `dst` was marked as moved in.
    pub fn is_moved_in(&self, dst: NodeId) -> bool {
        self.moved_in.contains(&dst)
    }

    /// Whether nothing is marked.
    pub fn is_empty(&self) -> bool {
        self.moved_out.is_empty() && self.moved_in.is_empty()
    }

    /// Add every mark of `other`.
    pub fn merge(&mut self, other: &CrossFileMoves) {
        self.moved_out.extend(other.moved_out.iter().copied());
        self.moved_in.extend(other.moved_in.iter().copied());
    }
}

/// Rewrite whole-subtree insertions and deletions of nodes marked in `moves`
/// into `MoveIn`/`MoveOut`.
pub fn apply_cross_file_moves(
    actions: Vec<Action>,
    moves: &CrossFileMoves,
    src: &TreeContext,
    dst: &TreeContext,
) -> Vec<Action> {
    if moves.is_empty() {
        return actions;
    }
    let result: Vec<Action> = actions
        .into_iter()
        .map(|action| match action {
            Action::TreeInsert {
                node_b,
                parent,
                position,
            } if moves.is_moved_in(node_b) => {
                Action::MoveIn {
                    node_b,
                    parent,
                    position,
                }
            }
            Action::Insert {
                node_b,
                parent,
                position,
            } if moves.is_moved_in(node_b) && dst.is_leaf(node_b) => {
                Action::MoveIn {
                    node_b,
                    parent,
                    position,
                }
            }
            Action::TreeDelete { node_a } if moves.is_moved_out(node_a) => {
                Action::MoveOut { node_a }
            }
            Action::Delete { node_a } if moves.is_moved_out(node_a) && src.is_leaf(node_a) => {
                Action::MoveOut { node_a }
            }
            other => other,
        })
        .collect();
    debug!(
        rewritten = result
            .iter()
            .filter(|a| matches!(a, Action::MoveIn { .. } | Action::MoveOut { .. }))
            .count(),
        "apply_cross_file_moves done"
    );
    result
}
