//! Arena-backed AST model.
//!
//! A [`TreeContext`] owns every node of one parsed file version. Nodes are
//! addressed by [`NodeId`], which is stable for the lifetime of the context
//! and is the only notion of node identity used by the rest of the crate:
//! two structurally identical nodes are still different nodes.

use core::fmt;
use std::collections::VecDeque;

use indextree::{Arena, NodeEdge, NodeId};

/// Syntactic data carried by a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AstNode {
    /// Syntactic category, e.g. `MethodInvocation`.
    pub kind: String,
    /// Token text. Empty for nodes that carry none.
    pub label: String,
}

impl AstNode {
    /// A node with both a kind and a label.
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
        }
    }

    /// A node without a label, typically an inner node.
    pub fn unlabeled(kind: impl Into<String>) -> Self {
        Self::new(kind, String::new())
    }
}

/// One version of a parsed file: an arena of [`AstNode`]s and its root.
#[derive(Debug, Clone)]
pub struct TreeContext {
    arena: Arena<AstNode>,
    root: NodeId,
}

impl TreeContext {
    /// Create a context containing only `root`.
    pub fn new(root: AstNode) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(root);
        Self { arena, root }
    }

    pub(crate) fn arena(&self) -> &Arena<AstNode> {
        &self.arena
    }

    /// The root node.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Append `data` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, data: AstNode) -> NodeId {
        let id = self.arena.new_node(data);
        parent.append(id, &mut self.arena);
        id
    }

    /// Whether `id` names a live node of this context.
    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.get(id).is_some_and(|n| !n.is_removed())
    }

    /// Node data. Panics if `id` does not belong to this context.
    #[inline]
    pub fn get(&self, id: NodeId) -> &AstNode {
        self.arena[id].get()
    }

    /// Syntactic kind of `id`.
    #[inline]
    pub fn kind(&self, id: NodeId) -> &str {
        &self.get(id).kind
    }

    /// Label of `id`.
    #[inline]
    pub fn label(&self, id: NodeId) -> &str {
        &self.get(id).label
    }

    /// Parent of `id`, `None` for the root.
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Children of `id` in order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Number of children of `id`.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    /// Whether `id` has no children.
    #[inline]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.arena[id].first_child().is_none()
    }

    /// Index of `id` among its siblings.
    pub fn position(&self, id: NodeId) -> usize {
        position_in(&self.arena, id)
    }

    /// Every node of the tree in pre-order.
    pub fn pre_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root.descendants(&self.arena)
    }

    /// `id` and everything below it, in pre-order.
    pub fn subtree(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }

    /// Everything strictly below `id`, in pre-order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena).skip(1)
    }

    /// Every node of the tree in post-order.
    pub fn post_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.subtree_post_order(self.root)
    }

    /// `id` and everything below it, children before parents.
    pub fn subtree_post_order(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.traverse(&self.arena).filter_map(|edge| match edge {
            NodeEdge::End(id) => Some(id),
            NodeEdge::Start(_) => None,
        })
    }

    /// Every node of the tree, level by level.
    pub fn breadth_first(&self) -> BreadthFirst<'_> {
        BreadthFirst {
            tree: self,
            queue: VecDeque::from([self.root]),
        }
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.pre_order().count()
    }

    /// A tree always holds at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Height of the subtree rooted at `id`; a leaf has height 1.
    pub fn height(&self, id: NodeId) -> usize {
        let mut heights = rapidhash::RapidHashMap::default();
        for n in self.subtree_post_order(id) {
            let h = 1 + self
                .children(n)
                .map(|c| heights.get(&c).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            heights.insert(n, h);
        }
        heights.get(&id).copied().unwrap_or(1)
    }

    /// Whether the subtree at `a` in `self` has the same shape, kinds and
    /// labels as the subtree at `b` in `other`.
    pub fn is_isomorphic(&self, a: NodeId, other: &TreeContext, b: NodeId) -> bool {
        let mut stack = vec![(a, b)];
        while let Some((x, y)) = stack.pop() {
            if self.get(x) != other.get(y) {
                return false;
            }
            let xs: Vec<_> = self.children(x).collect();
            let ys: Vec<_> = other.children(y).collect();
            if xs.len() != ys.len() {
                return false;
            }
            stack.extend(xs.into_iter().zip(ys));
        }
        true
    }

    /// Whether the whole tree is isomorphic to `other`.
    pub fn structurally_eq(&self, other: &TreeContext) -> bool {
        self.is_isomorphic(self.root, other, other.root)
    }

    /// S-expression rendering of the subtree at `id`.
    pub fn dump(&self, id: NodeId) -> Dump<'_> {
        Dump { tree: self, id }
    }
}

/// Attach `child` under `parent` so that it ends up at index `k` among
/// `parent`'s children. `k` past the end appends.
pub(crate) fn insert_child_at<T>(
    arena: &mut Arena<T>,
    parent: NodeId,
    child: NodeId,
    k: usize,
) -> Result<(), indextree::NodeError> {
    match parent.children(arena).nth(k) {
        Some(sibling) => sibling.checked_insert_before(child, arena),
        None => parent.checked_append(child, arena),
    }
}

/// Index of `id` among its siblings in a raw arena.
pub(crate) fn position_in<T>(arena: &Arena<T>, id: NodeId) -> usize {
    id.preceding_siblings(arena).count() - 1
}

impl fmt::Display for TreeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.dump(self.root), f)
    }
}

/// Breadth-first iterator over a [`TreeContext`].
pub struct BreadthFirst<'a> {
    tree: &'a TreeContext,
    queue: VecDeque<NodeId>,
}

impl Iterator for BreadthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.queue.pop_front()?;
        self.queue.extend(self.tree.children(id));
        Some(id)
    }
}

/// Display adapter returned by [`TreeContext::dump`].
pub struct Dump<'a> {
    tree: &'a TreeContext,
    id: NodeId,
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.tree.get(self.id);
        write!(f, "({}", node.kind)?;
        if !node.label.is_empty() {
            write!(f, " {:?}", node.label)?;
        }
        for child in self.tree.children(self.id) {
            write!(f, " {}", self.tree.dump(child))?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn sample() -> (TreeContext, NodeId, NodeId, NodeId) {
        let mut t = TreeContext::new(AstNode::unlabeled("Block"));
        let a = t.add_child(t.root(), AstNode::unlabeled("Call"));
        let b = t.add_child(a, AstNode::new("Name", "foo"));
        let c = t.add_child(t.root(), AstNode::new("Name", "bar"));
        (t, a, b, c)
    }

    #[test]
    fn test_traversals() {
        let (t, a, b, c) = sample();
        let root = t.root();
        assert_eq!(t.pre_order().collect::<Vec<_>>(), vec![root, a, b, c]);
        assert_eq!(t.post_order().collect::<Vec<_>>(), vec![b, a, c, root]);
        assert_eq!(t.breadth_first().collect::<Vec<_>>(), vec![root, a, c, b]);
        assert_eq!(t.descendants(a).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn test_position_and_height() {
        let (t, a, b, c) = sample();
        assert_eq!(t.position(a), 0);
        assert_eq!(t.position(c), 1);
        assert_eq!(t.height(b), 1);
        assert_eq!(t.height(t.root()), 3);
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_isomorphism_is_structural_identity_is_not() {
        let (t1, a1, ..) = sample();
        let (t2, a2, ..) = sample();
        assert!(t1.structurally_eq(&t2));
        assert!(t1.is_isomorphic(a1, &t2, a2));
        assert!(!t1.is_isomorphic(t1.root(), &t2, a2));
    }

    #[test]
    fn test_dump() {
        let (t, ..) = sample();
        assert_eq!(
            t.to_string(),
            r#"(Block (Call (Name "foo")) (Name "bar"))"#
        );
    }
}
