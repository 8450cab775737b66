//! Multi-move grouping.
//!
//! A 1:1 edit script cannot describe code that was duplicated or merged.
//! Every node that takes part in a many-to-many correspondence is reported
//! once more, inside a `MultiMove` that names its whole group.

use crate::action::Action;
use crate::mapping::MultiMappingStore;
use crate::{debug, trace};
use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

/// Build one `MultiMove` per distinct many-to-many group of `mappings`.
///
/// For a dst node with several srcs the group is those srcs plus every dst
/// any of them maps to. For a src node with several dsts the group is those
/// dsts plus every src any of them maps from. Identical groups are emitted
/// once, in order of first appearance.
pub fn generate_multi_move_actions(mappings: &MultiMappingStore) -> Vec<Action> {
    let mut seen: HashSet<(Vec<NodeId>, Vec<NodeId>)> = HashSet::default();
    let mut actions = Vec::new();

    let mut emit = |srcs: Vec<NodeId>, dsts: Vec<NodeId>| {
        if seen.insert((srcs.clone(), dsts.clone())) {
            actions.push(Action::MultiMove { srcs, dsts });
        } else {
            trace!(srcs = srcs.len(), dsts = dsts.len(), "multi-move: duplicate group");
        }
    };

    for (_, srcs) in mappings.dst_to_src_multis() {
        let dsts = sorted_union(srcs.iter().map(|&s| mappings.dsts_of(s)));
        emit(sorted(srcs), dsts);
    }
    for (_, dsts) in mappings.src_to_dst_multis() {
        let srcs = sorted_union(dsts.iter().map(|&d| mappings.srcs_of(d)));
        emit(srcs, sorted(dsts));
    }

    debug!(groups = actions.len(), "generate_multi_move_actions done");
    actions
}

fn sorted(nodes: &[NodeId]) -> Vec<NodeId> {
    let mut v = nodes.to_vec();
    v.sort_unstable_by_key(|&n| usize::from(n));
    v.dedup();
    v
}

fn sorted_union<'a>(groups: impl Iterator<Item = &'a [NodeId]>) -> Vec<NodeId> {
    let mut v: Vec<NodeId> = groups.flatten().copied().collect();
    v.sort_unstable_by_key(|&n| usize::from(n));
    v.dedup();
    v
}
