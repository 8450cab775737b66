//! Root-only change classification.
//!
//! Buckets the nodes touched by a finalized edit script into change
//! categories, reporting a changed region only at its topmost node.

use crate::action::{Action, ActionId, EditScript};
use crate::debug;
use crate::mapping::MultiMappingStore;
use crate::simplify::whole_subtrees;
use crate::tree::TreeContext;
use indextree::NodeId;
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};
use smallvec::SmallVec;

/// Node → actions that mention it, in script order.
pub type ActionIndex = HashMap<NodeId, SmallVec<[ActionId; 1]>>;

/// Classification of one edit script.
///
/// Built once by [`TreeClassifier::classify`] and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeClassifier {
    deleted_srcs: HashSet<NodeId>,
    inserted_dsts: HashSet<NodeId>,
    updated_srcs: HashSet<NodeId>,
    updated_dsts: HashSet<NodeId>,
    moved_srcs: HashSet<NodeId>,
    moved_dsts: HashSet<NodeId>,
    multi_map_src: ActionIndex,
    multi_map_dst: ActionIndex,
    dst_move_in_map: ActionIndex,
    src_move_out_map: ActionIndex,
}

impl TreeClassifier {
    /// Classify `script` in a single forward pass.
    ///
    /// A plain `Delete` is reported unless its parent and all of its
    /// descendants are deleted too, in which case an ancestor already
    /// stands for the region. `TreeDelete` is always reported. Insertions
    /// mirror this over the dst tree. Updates and moves are reported on the
    /// src node and on every dst node it maps to.
    pub fn classify(
        script: &EditScript,
        mappings: &MultiMappingStore,
        src: &TreeContext,
        dst: &TreeContext,
    ) -> Self {
        let mut deleted: HashSet<NodeId> = HashSet::default();
        let mut inserted: HashSet<NodeId> = HashSet::default();
        for action in script {
            match action {
                Action::Delete { node_a } => {
                    deleted.insert(*node_a);
                }
                Action::TreeDelete { node_a } => deleted.extend(src.subtree(*node_a)),
                Action::Insert { node_b, .. } => {
                    inserted.insert(*node_b);
                }
                Action::TreeInsert { node_b, .. } => inserted.extend(dst.subtree(*node_b)),
                _ => {}
            }
        }
        let whole_deleted = whole_subtrees(src, &deleted);
        let whole_inserted = whole_subtrees(dst, &inserted);

        let mut c = Self::default();
        for (id, action) in script.enumerate() {
            match action {
                Action::TreeDelete { node_a } => {
                    c.deleted_srcs.insert(*node_a);
                }
                Action::Delete { node_a } => {
                    let covered = whole_deleted.contains(node_a)
                        && src.parent(*node_a).is_some_and(|p| deleted.contains(&p));
                    if !covered {
                        c.deleted_srcs.insert(*node_a);
                    }
                }
                Action::TreeInsert { node_b, .. } => {
                    c.inserted_dsts.insert(*node_b);
                }
                Action::Insert { node_b, .. } => {
                    let covered = whole_inserted.contains(node_b)
                        && dst.parent(*node_b).is_some_and(|p| inserted.contains(&p));
                    if !covered {
                        c.inserted_dsts.insert(*node_b);
                    }
                }
                Action::Update { node_a, .. } => {
                    c.updated_srcs.insert(*node_a);
                    c.updated_dsts.extend(mappings.dsts_of(*node_a).iter().copied());
                }
                Action::Move { node_a, .. } => {
                    c.moved_srcs.insert(*node_a);
                    c.moved_dsts.extend(mappings.dsts_of(*node_a).iter().copied());
                }
                Action::MultiMove { srcs, dsts } => {
                    for s in srcs {
                        c.multi_map_src.entry(*s).or_default().push(id);
                    }
                    for d in dsts {
                        c.multi_map_dst.entry(*d).or_default().push(id);
                    }
                }
                Action::MoveIn { node_b, .. } => {
                    let key = dst.parent(*node_b).unwrap_or(*node_b);
                    c.dst_move_in_map.entry(key).or_default().push(id);
                }
                Action::MoveOut { node_a } => {
                    c.src_move_out_map.entry(*node_a).or_default().push(id);
                }
            }
        }

        debug!(
            deleted = c.deleted_srcs.len(),
            inserted = c.inserted_dsts.len(),
            updated = c.updated_srcs.len(),
            moved = c.moved_srcs.len(),
            multi_src = c.multi_map_src.len(),
            multi_dst = c.multi_map_dst.len(),
            "classify done"
        );
        c
    }

    /// Topmost deleted src nodes.
    pub fn deleted_srcs(&self) -> &HashSet<NodeId> {
        &self.deleted_srcs
    }

    /// Topmost inserted dst nodes.
    pub fn inserted_dsts(&self) -> &HashSet<NodeId> {
        &self.inserted_dsts
    }

    /// Src nodes whose kind or label changed.
    pub fn updated_srcs(&self) -> &HashSet<NodeId> {
        &self.updated_srcs
    }

    /// Dst counterparts of updated src nodes.
    pub fn updated_dsts(&self) -> &HashSet<NodeId> {
        &self.updated_dsts
    }

    /// Src nodes that were moved.
    pub fn moved_srcs(&self) -> &HashSet<NodeId> {
        &self.moved_srcs
    }

    /// Dst counterparts of moved src nodes.
    pub fn moved_dsts(&self) -> &HashSet<NodeId> {
        &self.moved_dsts
    }

    /// Src nodes taking part in a many-to-many group, with their `MultiMove`s.
    pub fn multi_map_src(&self) -> &ActionIndex {
        &self.multi_map_src
    }

    /// Dst nodes taking part in a many-to-many group, with their `MultiMove`s.
    pub fn multi_map_dst(&self) -> &ActionIndex {
        &self.multi_map_dst
    }

    /// `MoveIn`s keyed by the dst node they arrived under.
    pub fn dst_move_in_map(&self) -> &ActionIndex {
        &self.dst_move_in_map
    }

    /// `MoveOut`s keyed by the src node that left.
    pub fn src_move_out_map(&self) -> &ActionIndex {
        &self.src_move_out_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{EditScriptBuilder, ParentRef};
    use crate::tree::AstNode;
    use facet_testhelpers::test;

    fn script(actions: Vec<Action>) -> EditScript {
        let mut b = EditScriptBuilder::new();
        for a in actions {
            b.push(a);
        }
        b.finalize()
    }

    #[test]
    fn test_raw_deletes_report_only_the_top() {
        let mut src = TreeContext::new(AstNode::unlabeled("root"));
        let parent = src.add_child(src.root(), AstNode::unlabeled("If"));
        let c1 = src.add_child(parent, AstNode::new("Name", "a"));
        let c2 = src.add_child(parent, AstNode::new("Name", "b"));
        let dst = TreeContext::new(AstNode::unlabeled("root"));

        let s = script(vec![
            Action::Delete { node_a: c1 },
            Action::Delete { node_a: c2 },
            Action::Delete { node_a: parent },
        ]);
        let c = TreeClassifier::classify(&s, &MultiMappingStore::new(), &src, &dst);
        assert_eq!(c.deleted_srcs().len(), 1);
        assert!(c.deleted_srcs().contains(&parent));
    }

    #[test]
    fn test_tree_delete_is_unconditional() {
        let mut src = TreeContext::new(AstNode::unlabeled("root"));
        let outer = src.add_child(src.root(), AstNode::unlabeled("Block"));
        let inner = src.add_child(outer, AstNode::unlabeled("If"));
        src.add_child(inner, AstNode::new("Name", "a"));
        let dst = TreeContext::new(AstNode::unlabeled("root"));

        let s = script(vec![
            Action::TreeDelete { node_a: inner },
            Action::Delete { node_a: outer },
        ]);
        let c = TreeClassifier::classify(&s, &MultiMappingStore::new(), &src, &dst);
        assert!(c.deleted_srcs().contains(&inner));
        assert!(c.deleted_srcs().contains(&outer));
    }

    #[test]
    fn test_update_and_move_use_every_partner() {
        let mut src = TreeContext::new(AstNode::unlabeled("root"));
        let x = src.add_child(src.root(), AstNode::new("Name", "x"));
        let mut dst = TreeContext::new(AstNode::unlabeled("root"));
        let y1 = dst.add_child(dst.root(), AstNode::new("Name", "y"));
        let y2 = dst.add_child(dst.root(), AstNode::new("Name", "y"));

        let mut m = MultiMappingStore::new();
        m.add_mapping(x, y1);
        m.add_mapping(x, y2);
        let s = script(vec![
            Action::Update {
                node_a: x,
                node_b: y1,
            },
            Action::Move {
                node_a: x,
                node_b: y1,
                parent: ParentRef::Src(src.root()),
                position: 0,
            },
        ]);
        let c = TreeClassifier::classify(&s, &m, &src, &dst);
        assert!(c.updated_srcs().contains(&x));
        assert!(c.updated_dsts().contains(&y1) && c.updated_dsts().contains(&y2));
        assert!(c.moved_srcs().contains(&x));
        assert_eq!(c.moved_dsts().len(), 2);
    }

    #[test]
    fn test_move_in_is_keyed_by_dst_parent() {
        let src = TreeContext::new(AstNode::unlabeled("root"));
        let mut dst = TreeContext::new(AstNode::unlabeled("root"));
        let class = dst.add_child(dst.root(), AstNode::unlabeled("Class"));
        let method = dst.add_child(class, AstNode::unlabeled("Method"));

        let s = script(vec![Action::MoveIn {
            node_b: method,
            parent: ParentRef::Src(src.root()),
            position: 0,
        }]);
        let c = TreeClassifier::classify(&s, &MultiMappingStore::new(), &src, &dst);
        assert_eq!(
            c.dst_move_in_map().get(&class).map(|v| v.as_slice()),
            Some(&[ActionId(0)][..])
        );
        assert!(c.inserted_dsts().is_empty());
    }

    #[test]
    fn test_classify_is_idempotent() {
        let mut src = TreeContext::new(AstNode::unlabeled("root"));
        let a = src.add_child(src.root(), AstNode::new("Name", "a"));
        let dst = TreeContext::new(AstNode::unlabeled("root"));

        let s = script(vec![
            Action::Delete { node_a: a },
            Action::MoveOut { node_a: a },
        ]);
        let m = MultiMappingStore::new();
        let first = TreeClassifier::classify(&s, &m, &src, &dst);
        let second = TreeClassifier::classify(&s, &m, &src, &dst);
        assert_eq!(first, second);
        assert_eq!(first.src_move_out_map().len(), 1);
    }
}
