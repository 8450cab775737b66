//! Chawathe edit script generation.
//!
//! Generates an edit script (INSERT, DELETE, UPDATE, MOVE) from a 1:1 node
//! mapping. Based on "Change Detection in Hierarchically Structured
//! Information" (Chawathe et al., 1996), in the form popularised by GumTree.
//!
//! The algorithm edits a working copy of the src tree, hung under a virtual
//! root, until it has the shape of the dst tree:
//! 1. Breadth-first over dst: UPDATE mapped nodes whose data differ, MOVE
//!    mapped nodes whose parent differs, INSERT unmapped nodes.
//! 2. After placing a node, align its children: mapped children that are out
//!    of order (outside the longest common subsequence) are MOVEd.
//! 3. DELETE every unmapped src node, children before parents.
//!
//! Positions are computed against the working copy, so replaying the script
//! in order reproduces the dst tree.

use crate::action::{Action, EditScriptBuilder, ParentRef};
use crate::mapping::MonoMappingStore;
use crate::tree::{TreeContext, insert_child_at, position_in};
use crate::{debug, trace};
use indextree::{Arena, NodeEdge, NodeId};
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};

/// What a node of the working copy stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkNode {
    VirtualRoot,
    Src(NodeId),
    Inserted(NodeId),
}

struct Generator<'a> {
    src: &'a TreeContext,
    dst: &'a TreeContext,
    work: Arena<WorkNode>,
    work_root: NodeId,
    dst_to_work: HashMap<NodeId, NodeId>,
    work_to_dst: HashMap<NodeId, NodeId>,
    dst_in_order: HashSet<NodeId>,
    script: EditScriptBuilder,
}

/// Generate the raw edit script turning `src` into `dst` under `mappings`.
///
/// The result contains only `Insert`, `Delete`, `Update` and `Move`; see
/// [`crate::simplify_edit_script`] for subtree consolidation.
pub fn generate_edit_script(
    src: &TreeContext,
    dst: &TreeContext,
    mappings: &MonoMappingStore,
) -> Vec<Action> {
    trace!(mapped_pairs = mappings.len(), "generate_edit_script start");
    let mut generator = Generator::new(src, dst, mappings);
    generator.place_dst_nodes();
    generator.delete_unmapped();
    debug!(
        total_actions = generator.script.len(),
        "generate_edit_script done"
    );
    generator.script.into_actions()
}

impl<'a> Generator<'a> {
    fn new(src: &'a TreeContext, dst: &'a TreeContext, mappings: &MonoMappingStore) -> Self {
        let mut work = Arena::with_capacity(src.len() + dst.len() + 1);
        let work_root = work.new_node(WorkNode::VirtualRoot);
        let mut src_to_work = HashMap::default();
        for a in src.pre_order() {
            let w = work.new_node(WorkNode::Src(a));
            let parent = match src.parent(a) {
                Some(p) => src_to_work[&p],
                None => work_root,
            };
            parent.append(w, &mut work);
            src_to_work.insert(a, w);
        }

        let mut dst_to_work = HashMap::default();
        let mut work_to_dst = HashMap::default();
        for (a, b) in mappings.pairs() {
            let w = src_to_work[&a];
            dst_to_work.insert(b, w);
            work_to_dst.insert(w, b);
        }

        Self {
            src,
            dst,
            work,
            work_root,
            dst_to_work,
            work_to_dst,
            dst_in_order: HashSet::default(),
            script: EditScriptBuilder::new(),
        }
    }

    fn parent_ref(&self, w: NodeId) -> ParentRef {
        match *self.work[w].get() {
            WorkNode::VirtualRoot => ParentRef::Root,
            WorkNode::Src(a) => ParentRef::Src(a),
            WorkNode::Inserted(b) => ParentRef::Dst(b),
        }
    }

    fn src_of(&self, w: NodeId) -> Option<NodeId> {
        match *self.work[w].get() {
            WorkNode::Src(a) => Some(a),
            _ => None,
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, k: usize) {
        // `child` is detached and never an ancestor of `parent`: every
        // ancestor of `parent` is the partner of an already placed dst node.
        insert_child_at(&mut self.work, parent, child, k)
            .expect("working copy stays a tree while placing dst nodes");
    }

    fn place_dst_nodes(&mut self) {
        let order: Vec<NodeId> = self.dst.breadth_first().collect();
        for x in order {
            let z = match self.dst.parent(x) {
                Some(y) => self.dst_to_work[&y],
                None => self.work_root,
            };

            let w = match self.dst_to_work.get(&x).copied() {
                None => {
                    let k = self.find_pos(x);
                    let w = self.work.new_node(WorkNode::Inserted(x));
                    self.attach(z, w, k);
                    self.dst_to_work.insert(x, w);
                    self.work_to_dst.insert(w, x);
                    self.script.push(Action::Insert {
                        node_b: x,
                        parent: self.parent_ref(z),
                        position: k,
                    });
                    w
                }
                Some(w) => {
                    if let Some(a) = self.src_of(w) {
                        if self.src.get(a) != self.dst.get(x) {
                            self.script.push(Action::Update {
                                node_a: a,
                                node_b: x,
                            });
                        }
                        if self.work[w].parent() != Some(z) {
                            w.detach(&mut self.work);
                            let k = self.find_pos(x);
                            self.attach(z, w, k);
                            self.script.push(Action::Move {
                                node_a: a,
                                node_b: x,
                                parent: self.parent_ref(z),
                                position: k,
                            });
                        }
                    }
                    w
                }
            };

            self.dst_in_order.insert(x);
            self.align_children(w, x);
        }
    }

    /// Reorder the mapped children of `w` so they follow the order of their
    /// partners among the children of `x`.
    fn align_children(&mut self, w: NodeId, x: NodeId) {
        for c in self.dst.children(x) {
            self.dst_in_order.remove(&c);
        }

        let s1: Vec<NodeId> = w
            .children(&self.work)
            .filter(|c| {
                self.work_to_dst
                    .get(c)
                    .is_some_and(|&b| self.dst.parent(b) == Some(x))
            })
            .collect();
        let s2: Vec<NodeId> = self
            .dst
            .children(x)
            .filter(|b| {
                self.dst_to_work
                    .get(b)
                    .is_some_and(|&c| self.work[c].parent() == Some(w))
            })
            .collect();
        if s1.is_empty() {
            return;
        }

        let in_lcs: HashSet<NodeId> = lcs(&s1, &s2, |a, b| self.work_to_dst.get(&a) == Some(&b))
            .into_iter()
            .map(|(_, b)| b)
            .collect();
        for &b in &in_lcs {
            self.dst_in_order.insert(b);
        }
        trace!(
            candidates = s2.len(),
            in_order = in_lcs.len(),
            "align_children"
        );

        for b in s2 {
            if in_lcs.contains(&b) {
                continue;
            }
            let c = self.dst_to_work[&b];
            c.detach(&mut self.work);
            let k = self.find_pos(b);
            self.attach(w, c, k);
            if let Some(a) = self.src_of(c) {
                self.script.push(Action::Move {
                    node_a: a,
                    node_b: b,
                    parent: self.parent_ref(w),
                    position: k,
                });
            }
            self.dst_in_order.insert(b);
        }
    }

    /// Index at which the partner of `x` goes: right after the partner of
    /// the nearest in-order sibling on its left, or first if there is none.
    fn find_pos(&self, x: NodeId) -> usize {
        let Some(y) = self.dst.parent(x) else {
            return 0;
        };

        let mut left = None;
        for c in self.dst.children(y) {
            if c == x {
                break;
            }
            if self.dst_in_order.contains(&c) {
                left = Some(c);
            }
        }
        let Some(v) = left else {
            return 0;
        };
        position_in(&self.work, self.dst_to_work[&v]) + 1
    }

    fn delete_unmapped(&mut self) {
        let order: Vec<NodeId> = self
            .work_root
            .traverse(&self.work)
            .filter_map(|edge| match edge {
                NodeEdge::End(id) => Some(id),
                NodeEdge::Start(_) => None,
            })
            .collect();
        for w in order {
            let Some(a) = self.src_of(w) else {
                continue;
            };
            if !self.work_to_dst.contains_key(&w) {
                self.script.push(Action::Delete { node_a: a });
            }
        }
    }
}

/// Longest common subsequence of `s1` and `s2` under `eq`, as matched pairs
/// in order.
fn lcs(
    s1: &[NodeId],
    s2: &[NodeId],
    eq: impl Fn(NodeId, NodeId) -> bool,
) -> Vec<(NodeId, NodeId)> {
    let n = s1.len();
    let m = s2.len();
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            dp[i][j] = if eq(s1[i - 1], s2[j - 1]) {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(dp[n][m] as usize);
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if eq(s1[i - 1], s2[j - 1]) {
            pairs.push((s1[i - 1], s2[j - 1]));
            i -= 1;
            j -= 1;
        } else if dp[i - 1][j] >= dp[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}
