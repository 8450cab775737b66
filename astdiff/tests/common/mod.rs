#![allow(dead_code)]

use astdiff::indextree::NodeId;
use astdiff::{AstNode, MultiMappingStore, TreeContext};

/// Shape of a test tree: kind, label, children.
pub struct Shape(pub &'static str, pub &'static str, pub Vec<Shape>);

/// Build a tree from `shape`.
pub fn build(shape: &Shape) -> TreeContext {
    let mut tree = TreeContext::new(AstNode::new(shape.0, shape.1));
    let root = tree.root();
    add_children(&mut tree, root, &shape.2);
    tree
}

fn add_children(tree: &mut TreeContext, parent: NodeId, shapes: &[Shape]) {
    for s in shapes {
        let id = tree.add_child(parent, AstNode::new(s.0, s.1));
        add_children(tree, id, &s.2);
    }
}

/// First node in pre-order with this kind and label.
pub fn find(tree: &TreeContext, kind: &str, label: &str) -> NodeId {
    tree.pre_order()
        .find(|&n| tree.kind(n) == kind && tree.label(n) == label)
        .unwrap_or_else(|| panic!("no ({kind} {label:?}) in {tree}"))
}

/// Map every pair of nodes that share kind and label, pairing the k-th
/// occurrence in `src` with the k-th occurrence in `dst`.
pub fn identity_mappings(src: &TreeContext, dst: &TreeContext) -> MultiMappingStore {
    let mut m = MultiMappingStore::new();
    let mut used = std::collections::HashSet::new();
    for a in src.pre_order() {
        if let Some(b) = dst
            .pre_order()
            .find(|&b| !used.contains(&b) && dst.get(b) == src.get(a))
        {
            used.insert(b);
            m.add_mapping(a, b);
        }
    }
    m
}

/// Small deterministic generator (xorshift64*), so failures reproduce from
/// the seed alone.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    pub fn chance(&mut self, percent: u64) -> bool {
        self.next_u64() % 100 < percent
    }
}

const KINDS: &[&str] = &["Block", "If", "Call", "Name", "Literal"];
const LABELS: &[&str] = &["", "a", "b", "foo", "bar", "1"];

/// A random tree with `size` nodes.
pub fn random_tree(rng: &mut Rng, size: usize) -> TreeContext {
    let mut tree = TreeContext::new(AstNode::unlabeled("Root"));
    let mut nodes = vec![tree.root()];
    for _ in 1..size {
        let parent = nodes[rng.below(nodes.len())];
        let data = AstNode::new(KINDS[rng.below(KINDS.len())], LABELS[rng.below(LABELS.len())]);
        nodes.push(tree.add_child(parent, data));
    }
    tree
}

/// Random, possibly many-to-many, mappings between any nodes of two trees.
pub fn random_mappings(
    rng: &mut Rng,
    src: &TreeContext,
    dst: &TreeContext,
    percent: u64,
) -> MultiMappingStore {
    let srcs: Vec<_> = src.pre_order().collect();
    let dsts: Vec<_> = dst.pre_order().collect();
    let mut m = MultiMappingStore::new();
    for &a in &srcs {
        if rng.chance(percent) {
            m.add_mapping(a, dsts[rng.below(dsts.len())]);
        }
    }
    m
}
