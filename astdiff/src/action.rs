//! Tree-edit actions and the edit script that sequences them.

use core::fmt;
use core::ops::Index;

use crate::debug;
use crate::tree::TreeContext;
use indextree::NodeId;

/// Where an inserted or moved node is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentRef {
    /// An existing node of the src tree.
    Src(NodeId),
    /// A dst node added earlier in the same script by `Insert`,
    /// `TreeInsert` or `MoveIn`.
    Dst(NodeId),
    /// Above the root. Used when a node becomes the new root.
    Root,
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Src(id) => write!(f, "a:{}", usize::from(*id)),
            ParentRef::Dst(id) => write!(f, "b:{}", usize::from(*id)),
            ParentRef::Root => write!(f, "root"),
        }
    }
}

/// One tree-edit action.
///
/// Actions only reference nodes: `node_a` is a node of the src tree,
/// `node_b` a node of the dst tree.
#[derive(Clone, PartialEq, Eq)]
pub enum Action {
    /// Add one dst node.
    Insert {
        /// The new node in the dst tree
        node_b: NodeId,
        /// Where it goes
        parent: ParentRef,
        /// Index among the parent's current children
        position: usize,
    },

    /// Add a whole dst subtree at once.
    TreeInsert {
        /// Root of the inserted subtree in the dst tree
        node_b: NodeId,
        /// Where it goes
        parent: ParentRef,
        /// Index among the parent's current children
        position: usize,
    },

    /// Remove one src node that has no remaining children.
    Delete {
        /// The node in the src tree
        node_a: NodeId,
    },

    /// Remove a whole src subtree at once.
    TreeDelete {
        /// Root of the deleted subtree in the src tree
        node_a: NodeId,
    },

    /// Replace kind and label of a mapped node with its partner's.
    Update {
        /// The node in the src tree
        node_a: NodeId,
        /// Its partner in the dst tree
        node_b: NodeId,
    },

    /// Detach a mapped node and re-attach it.
    Move {
        /// The node in the src tree
        node_a: NodeId,
        /// Its partner in the dst tree
        node_b: NodeId,
        /// New parent
        parent: ParentRef,
        /// Index among the new parent's children once the node is detached
        position: usize,
    },

    /// A group of src nodes that correspond to a group of dst nodes
    /// without a 1:1 pairing.
    MultiMove {
        /// Src side of the group, sorted
        srcs: Vec<NodeId>,
        /// Dst side of the group, sorted
        dsts: Vec<NodeId>,
    },

    /// A dst subtree that arrived from another file.
    MoveIn {
        /// Root of the subtree in the dst tree
        node_b: NodeId,
        /// Where it goes
        parent: ParentRef,
        /// Index among the parent's current children
        position: usize,
    },

    /// A src subtree that left for another file.
    MoveOut {
        /// Root of the subtree in the src tree
        node_a: NodeId,
    },
}

impl Action {
    /// Short name of the action kind.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Insert { .. } => "insert-node",
            Action::TreeInsert { .. } => "insert-tree",
            Action::Delete { .. } => "delete-node",
            Action::TreeDelete { .. } => "delete-tree",
            Action::Update { .. } => "update-node",
            Action::Move { .. } => "move-tree",
            Action::MultiMove { .. } => "multi-move-tree",
            Action::MoveIn { .. } => "move-in",
            Action::MoveOut { .. } => "move-out",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Insert {
                node_b,
                parent,
                position,
            } => write!(
                f,
                "Insert(b:{} @{} under {})",
                usize::from(*node_b),
                position,
                parent
            ),
            Action::TreeInsert {
                node_b,
                parent,
                position,
            } => write!(
                f,
                "TreeInsert(b:{} @{} under {})",
                usize::from(*node_b),
                position,
                parent
            ),
            Action::Delete { node_a } => write!(f, "Delete(a:{})", usize::from(*node_a)),
            Action::TreeDelete { node_a } => {
                write!(f, "TreeDelete(a:{})", usize::from(*node_a))
            }
            Action::Update { node_a, node_b } => write!(
                f,
                "Update(a:{} → b:{})",
                usize::from(*node_a),
                usize::from(*node_b)
            ),
            Action::Move {
                node_a,
                node_b,
                parent,
                position,
            } => write!(
                f,
                "Move(a:{} → b:{} @{} under {})",
                usize::from(*node_a),
                usize::from(*node_b),
                position,
                parent
            ),
            Action::MultiMove { srcs, dsts } => {
                write!(f, "MultiMove(")?;
                for (i, s) in srcs.iter().enumerate() {
                    let sep = if i == 0 { "" } else { "," };
                    write!(f, "{sep}a:{}", usize::from(*s))?;
                }
                write!(f, " → ")?;
                for (i, d) in dsts.iter().enumerate() {
                    let sep = if i == 0 { "" } else { "," };
                    write!(f, "{sep}b:{}", usize::from(*d))?;
                }
                write!(f, ")")
            }
            Action::MoveIn {
                node_b,
                parent,
                position,
            } => write!(
                f,
                "MoveIn(b:{} @{} under {})",
                usize::from(*node_b),
                position,
                parent
            ),
            Action::MoveOut { node_a } => write!(f, "MoveOut(a:{})", usize::from(*node_a)),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Index of an action inside its [`EditScript`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub usize);

/// Append-only collector for actions, with tracing on every push.
#[derive(Debug, Default)]
pub struct EditScriptBuilder {
    actions: Vec<Action>,
}

impl EditScriptBuilder {
    /// Start an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_actions(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    /// Append `action`.
    pub fn push(&mut self, action: Action) {
        debug!(%action, "emit");
        self.actions.push(action);
    }

    /// Actions pushed so far.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Number of actions pushed so far.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether nothing was pushed.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub(crate) fn into_actions(self) -> Vec<Action> {
        self.actions
    }

    /// Seal the script. The builder is consumed, so a script is finalized
    /// exactly once and cannot be appended to afterwards.
    pub fn finalize(self) -> EditScript {
        debug!(actions = self.actions.len(), "edit script finalized");
        EditScript {
            actions: self.actions,
        }
    }
}

/// An immutable, ordered list of actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    actions: Vec<Action>,
}

impl EditScript {
    /// All actions in application order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Iterate over actions in application order.
    pub fn iter(&self) -> core::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    /// Actions paired with their ids.
    pub fn enumerate(&self) -> impl Iterator<Item = (ActionId, &Action)> + '_ {
        self.actions
            .iter()
            .enumerate()
            .map(|(i, a)| (ActionId(i), a))
    }

    /// The action at `id`, if any.
    pub fn get(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(id.0)
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the script is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Check that every node an action names is a live node of its tree:
    /// `node_a`, `ParentRef::Src` and `MultiMove` srcs in `src`, `node_b`,
    /// `ParentRef::Dst` and `MultiMove` dsts in `dst`.
    ///
    /// Like [`MultiMappingStore::validate`](crate::MultiMappingStore::validate),
    /// this panics on a foreign node.
    pub fn validate(&self, src: &TreeContext, dst: &TreeContext) {
        let check_src = |id: NodeId, action: &Action| {
            assert!(
                src.contains(id),
                "action `{action}` names src node {} which is not in the src tree",
                usize::from(id)
            );
        };
        let check_dst = |id: NodeId, action: &Action| {
            assert!(
                dst.contains(id),
                "action `{action}` names dst node {} which is not in the dst tree",
                usize::from(id)
            );
        };
        let check_parent = |parent: ParentRef, action: &Action| match parent {
            ParentRef::Src(id) => check_src(id, action),
            ParentRef::Dst(id) => check_dst(id, action),
            ParentRef::Root => {}
        };

        for action in &self.actions {
            match action {
                Action::Insert { node_b, parent, .. }
                | Action::TreeInsert { node_b, parent, .. }
                | Action::MoveIn { node_b, parent, .. } => {
                    check_dst(*node_b, action);
                    check_parent(*parent, action);
                }
                Action::Delete { node_a }
                | Action::TreeDelete { node_a }
                | Action::MoveOut { node_a } => check_src(*node_a, action),
                Action::Update { node_a, node_b } => {
                    check_src(*node_a, action);
                    check_dst(*node_b, action);
                }
                Action::Move {
                    node_a,
                    node_b,
                    parent,
                    ..
                } => {
                    check_src(*node_a, action);
                    check_dst(*node_b, action);
                    check_parent(*parent, action);
                }
                Action::MultiMove { srcs, dsts } => {
                    for &id in srcs {
                        check_src(id, action);
                    }
                    for &id in dsts {
                        check_dst(id, action);
                    }
                }
            }
        }
    }
}

impl Index<ActionId> for EditScript {
    type Output = Action;

    fn index(&self, id: ActionId) -> &Action {
        &self.actions[id.0]
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a Action;
    type IntoIter = core::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

impl fmt::Display for EditScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in &self.actions {
            writeln!(f, "{action}")?;
        }
        Ok(())
    }
}
