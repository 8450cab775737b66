//! Replay edit scripts against a copy of the src tree.
//!
//! For property testing: replay(src, script(src, dst)) is isomorphic to dst.

use crate::action::{Action, EditScript, ParentRef};
use crate::trace;
use crate::tree::{AstNode, TreeContext, insert_child_at};
use facet::Facet;
use indextree::{Arena, NodeId};
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};

/// Errors that can occur while replaying an edit script.
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum ReplayError {
    /// src node {node} is not in the tree being edited
    UnknownSrcNode { node: usize },

    /// dst node {node} is not in the dst tree
    UnknownDstNode { node: usize },

    /// dst node {node} is used as a parent before being inserted
    UnknownDstParent { node: usize },

    /// position {position} is past the {len} children of the parent
    PositionOutOfBounds { position: usize, len: usize },

    /// src node {node} still has children when deleted
    DeleteNonLeaf { node: usize },

    /// node {node} cannot be attached inside its own subtree
    Cycle { node: usize },

    /// replay left {count} roots instead of one
    RootCount { count: usize },
}

struct Replayer<'a> {
    src: &'a TreeContext,
    dst: &'a TreeContext,
    arena: Arena<AstNode>,
    top: NodeId,
    inserted: HashMap<NodeId, NodeId>,
    deleted: HashSet<NodeId>,
}

/// Apply `script` to a copy of `src`, resolving inserted content from `dst`.
///
/// `MultiMove` leaves the tree unchanged, `MoveIn` behaves like
/// `TreeInsert` and `MoveOut` like `TreeDelete`.
pub fn replay(
    src: &TreeContext,
    dst: &TreeContext,
    script: &EditScript,
) -> Result<TreeContext, ReplayError> {
    let mut arena = src.arena().clone();
    let top = arena.new_node(AstNode::unlabeled(""));
    top.append(src.root(), &mut arena);
    let mut r = Replayer {
        src,
        dst,
        arena,
        top,
        inserted: HashMap::default(),
        deleted: HashSet::default(),
    };

    for action in script {
        trace!(%action, "replay");
        r.apply(action)?;
    }
    r.finish()
}

impl Replayer<'_> {
    fn apply(&mut self, action: &Action) -> Result<(), ReplayError> {
        match action {
            Action::Insert {
                node_b,
                parent,
                position,
            } => {
                let data = self.dst_data(*node_b)?;
                let p = self.resolve(*parent)?;
                let n = self.arena.new_node(data);
                self.inserted.insert(*node_b, n);
                self.attach(p, n, *position)
            }
            Action::TreeInsert {
                node_b,
                parent,
                position,
            }
            | Action::MoveIn {
                node_b,
                parent,
                position,
            } => {
                self.dst_data(*node_b)?;
                let p = self.resolve(*parent)?;
                let n = self.copy_dst_subtree(*node_b);
                self.attach(p, n, *position)
            }
            Action::Delete { node_a } => {
                let n = self.live_src(*node_a)?;
                if self.arena[n].first_child().is_some() {
                    return Err(ReplayError::DeleteNonLeaf {
                        node: usize::from(n),
                    });
                }
                n.detach(&mut self.arena);
                self.deleted.insert(n);
                Ok(())
            }
            Action::TreeDelete { node_a } | Action::MoveOut { node_a } => {
                let n = self.live_src(*node_a)?;
                n.detach(&mut self.arena);
                self.deleted.extend(n.descendants(&self.arena));
                Ok(())
            }
            Action::Update { node_a, node_b } => {
                let n = self.live_src(*node_a)?;
                let data = self.dst_data(*node_b)?;
                *self.arena[n].get_mut() = data;
                Ok(())
            }
            Action::Move {
                node_a,
                parent,
                position,
                ..
            } => {
                let n = self.live_src(*node_a)?;
                let p = self.resolve(*parent)?;
                n.detach(&mut self.arena);
                self.attach(p, n, *position)
            }
            Action::MultiMove { .. } => Ok(()),
        }
    }

    fn live_src(&self, id: NodeId) -> Result<NodeId, ReplayError> {
        if self.src.contains(id) && !self.deleted.contains(&id) {
            Ok(id)
        } else {
            Err(ReplayError::UnknownSrcNode {
                node: usize::from(id),
            })
        }
    }

    fn dst_data(&self, id: NodeId) -> Result<AstNode, ReplayError> {
        if !self.dst.contains(id) {
            return Err(ReplayError::UnknownDstNode {
                node: usize::from(id),
            });
        }
        Ok(self.dst.get(id).clone())
    }

    fn resolve(&self, parent: ParentRef) -> Result<NodeId, ReplayError> {
        match parent {
            ParentRef::Root => Ok(self.top),
            ParentRef::Src(id) => self.live_src(id),
            ParentRef::Dst(id) => self
                .inserted
                .get(&id)
                .copied()
                .filter(|n| !self.deleted.contains(n))
                .ok_or(ReplayError::UnknownDstParent {
                    node: usize::from(id),
                }),
        }
    }

    fn attach(
        &mut self,
        parent: NodeId,
        child: NodeId,
        position: usize,
    ) -> Result<(), ReplayError> {
        let len = parent.children(&self.arena).count();
        if position > len {
            return Err(ReplayError::PositionOutOfBounds { position, len });
        }
        insert_child_at(&mut self.arena, parent, child, position).map_err(|_| {
            ReplayError::Cycle {
                node: usize::from(child),
            }
        })
    }

    /// Copy the dst subtree at `root` into the arena, detached.
    fn copy_dst_subtree(&mut self, root: NodeId) -> NodeId {
        let top = self.arena.new_node(self.dst.get(root).clone());
        self.inserted.insert(root, top);
        let mut stack: Vec<(NodeId, NodeId)> = self.dst.children(root).map(|c| (c, top)).collect();
        stack.reverse();
        while let Some((b, parent)) = stack.pop() {
            let n = self.arena.new_node(self.dst.get(b).clone());
            self.inserted.insert(b, n);
            parent.append(n, &mut self.arena);
            let children: Vec<NodeId> = self.dst.children(b).collect();
            stack.extend(children.into_iter().rev().map(|c| (c, n)));
        }
        top
    }

    /// Copy the single tree left under the virtual root into a fresh
    /// context, leaving detached leftovers behind.
    fn finish(self) -> Result<TreeContext, ReplayError> {
        let roots: Vec<NodeId> = self.top.children(&self.arena).collect();
        let &[root] = roots.as_slice() else {
            return Err(ReplayError::RootCount { count: roots.len() });
        };
        let mut out = TreeContext::new(self.arena[root].get().clone());
        let mut stack = vec![(root, out.root())];
        while let Some((n, m)) = stack.pop() {
            for c in n.children(&self.arena) {
                let copied = out.add_child(m, self.arena[c].get().clone());
                stack.push((c, copied));
            }
        }
        Ok(out)
    }
}
