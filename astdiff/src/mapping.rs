//! Node correspondence between a src and a dst tree.
//!
//! [`MultiMappingStore`] is the many-to-many relation produced by an external
//! matcher. [`MonoMappingStore`] is the 1:1 view of it the edit script
//! generator consumes.

use crate::tree::TreeContext;
use crate::{debug, trace};
use indextree::NodeId;
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};
use smallvec::SmallVec;

/// Partners of one node. Most nodes have exactly one.
pub type Partners = SmallVec<[NodeId; 2]>;

/// Many-to-many mapping between src and dst nodes.
///
/// Both directions are indexed and kept consistent:
/// `dst ∈ dsts_of(src)` if and only if `src ∈ srcs_of(dst)`.
/// Pairs remember their insertion order, which drives every deterministic
/// choice made downstream.
#[derive(Debug, Clone, Default)]
pub struct MultiMappingStore {
    src_to_dsts: HashMap<NodeId, Partners>,
    dst_to_srcs: HashMap<NodeId, Partners>,
    pairs: Vec<(NodeId, NodeId)>,
}

impl MultiMappingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `src ↔ dst`. Adding an existing pair is a no-op.
    pub fn add_mapping(&mut self, src: NodeId, dst: NodeId) {
        let dsts = self.src_to_dsts.entry(src).or_default();
        if dsts.contains(&dst) {
            return;
        }
        dsts.push(dst);
        self.dst_to_srcs.entry(dst).or_default().push(src);
        self.pairs.push((src, dst));
    }

    /// Forget `src ↔ dst`. Returns whether the pair was present.
    pub fn remove_mapping(&mut self, src: NodeId, dst: NodeId) -> bool {
        let Some(dsts) = self.src_to_dsts.get_mut(&src) else {
            return false;
        };
        let Some(i) = dsts.iter().position(|&d| d == dst) else {
            return false;
        };
        dsts.remove(i);
        if dsts.is_empty() {
            self.src_to_dsts.remove(&src);
        }
        if let Some(srcs) = self.dst_to_srcs.get_mut(&dst) {
            srcs.retain(|s| *s != src);
            if srcs.is_empty() {
                self.dst_to_srcs.remove(&dst);
            }
        }
        self.pairs.retain(|&p| p != (src, dst));
        true
    }

    /// Fold every pair of `other` into this store, keeping `other`'s order
    /// after the pairs already present.
    pub fn merge_mappings(&mut self, other: &MultiMappingStore) {
        #[cfg(feature = "tracing")]
        let before = self.len();
        for (src, dst) in other.pairs() {
            self.add_mapping(src, dst);
        }
        debug!(added = self.len() - before, total = self.len(), "merge_mappings");
    }

    /// Pair two isomorphic subtrees node by node in pre-order.
    ///
    /// Panics if the subtrees do not have the same number of nodes.
    pub fn add_mapping_recursively(
        &mut self,
        src_tree: &TreeContext,
        src: NodeId,
        dst_tree: &TreeContext,
        dst: NodeId,
    ) {
        let srcs: Vec<_> = src_tree.subtree(src).collect();
        let dsts: Vec<_> = dst_tree.subtree(dst).collect();
        assert_eq!(
            srcs.len(),
            dsts.len(),
            "add_mapping_recursively needs subtrees of equal size"
        );
        for (s, d) in srcs.into_iter().zip(dsts) {
            self.add_mapping(s, d);
        }
    }

    /// Every dst mapped to `src`, in insertion order. Empty if unmapped.
    pub fn dsts_of(&self, src: NodeId) -> &[NodeId] {
        self.src_to_dsts.get(&src).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Every src mapped to `dst`, in insertion order. Empty if unmapped.
    pub fn srcs_of(&self, dst: NodeId) -> &[NodeId] {
        self.dst_to_srcs.get(&dst).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Whether `src ↔ dst` is recorded.
    pub fn has(&self, src: NodeId, dst: NodeId) -> bool {
        self.dsts_of(src).contains(&dst)
    }

    /// Whether `src` has at least one partner.
    pub fn is_src_mapped(&self, src: NodeId) -> bool {
        self.src_to_dsts.contains_key(&src)
    }

    /// Whether `dst` has at least one partner.
    pub fn is_dst_mapped(&self, dst: NodeId) -> bool {
        self.dst_to_srcs.contains_key(&dst)
    }

    /// All pairs in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the store holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Dst nodes with more than one src (merges), in order of first appearance.
    pub fn dst_to_src_multis(&self) -> impl Iterator<Item = (NodeId, &[NodeId])> + '_ {
        let mut seen = HashSet::default();
        self.pairs.iter().filter_map(move |&(_, dst)| {
            let srcs = self.srcs_of(dst);
            (srcs.len() > 1 && seen.insert(dst)).then_some((dst, srcs))
        })
    }

    /// Src nodes with more than one dst (splits), in order of first appearance.
    pub fn src_to_dst_multis(&self) -> impl Iterator<Item = (NodeId, &[NodeId])> + '_ {
        let mut seen = HashSet::default();
        self.pairs.iter().filter_map(move |&(src, _)| {
            let dsts = self.dsts_of(src);
            (dsts.len() > 1 && seen.insert(src)).then_some((src, dsts))
        })
    }

    /// Derive the 1:1 sub-relation: pairs are visited in insertion order and
    /// a pair is kept when neither of its nodes has been taken yet.
    pub fn mono_mapping_store(&self) -> MonoMappingStore {
        let mut mono = MonoMappingStore::new();
        for (src, dst) in self.pairs() {
            if mono.contains_src(src) || mono.contains_dst(dst) {
                trace!(
                    src = usize::from(src),
                    dst = usize::from(dst),
                    "mono: pair shadowed by an earlier one"
                );
                continue;
            }
            mono.add(src, dst);
        }
        debug!(multi = self.len(), mono = mono.len(), "mono_mapping_store");
        mono
    }

    /// Check that every mapped node is a live node of its tree.
    ///
    /// A mapping that names a node outside its context is a caller bug, so
    /// this panics instead of returning an error.
    pub fn validate(&self, src: &TreeContext, dst: &TreeContext) {
        for (s, d) in self.pairs() {
            assert!(
                src.contains(s),
                "mapping names src node {} which is not in the src tree",
                usize::from(s)
            );
            assert!(
                dst.contains(d),
                "mapping names dst node {} which is not in the dst tree",
                usize::from(d)
            );
        }
    }
}

/// A 1:1 mapping between src and dst nodes.
/// Uses Vec for O(1) lookups indexed by NodeId.
#[derive(Debug, Clone, Default)]
pub struct MonoMappingStore {
    src_to_dst: Vec<Option<NodeId>>,
    dst_to_src: Vec<Option<NodeId>>,
    pairs: Vec<(NodeId, NodeId)>,
}

impl MonoMappingStore {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `src ↔ dst`. Callers keep the relation 1:1.
    #[inline]
    pub fn add(&mut self, src: NodeId, dst: NodeId) {
        let s = usize::from(src);
        let d = usize::from(dst);
        if s >= self.src_to_dst.len() {
            self.src_to_dst.resize(s + 1, None);
        }
        if d >= self.dst_to_src.len() {
            self.dst_to_src.resize(d + 1, None);
        }
        self.src_to_dst[s] = Some(dst);
        self.dst_to_src[d] = Some(src);
        self.pairs.push((src, dst));
    }

    /// Whether `src` is mapped.
    #[inline(always)]
    pub fn contains_src(&self, src: NodeId) -> bool {
        self.get_dst(src).is_some()
    }

    /// Whether `dst` is mapped.
    #[inline(always)]
    pub fn contains_dst(&self, dst: NodeId) -> bool {
        self.get_src(dst).is_some()
    }

    /// Partner of `src`.
    #[inline(always)]
    pub fn get_dst(&self, src: NodeId) -> Option<NodeId> {
        self.src_to_dst.get(usize::from(src)).copied().flatten()
    }

    /// Partner of `dst`.
    #[inline(always)]
    pub fn get_src(&self, dst: NodeId) -> Option<NodeId> {
        self.dst_to_src.get(usize::from(dst)).copied().flatten()
    }

    /// All pairs in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
