pub mod calls;
pub mod java;
pub mod overrides;
pub mod python;

use std::collections::HashSet;

use petgraph::stable_graph::NodeIndex;

use crate::graph::CodeGraph;
use crate::graph::edge::EdgeKind;

pub use calls::{CallResolution, CallResolver, Receiver};
pub use overrides::derive_overrides;

/// Supertypes reachable from `start` over `inherits`/`implements` edges, grouped
/// by distance: index 0 holds the direct supertypes. Each type appears once, at
/// its shortest distance; the start nodes themselves never appear. Cycles in
/// malformed hierarchies terminate.
pub fn ancestor_levels(graph: &CodeGraph, start: &[NodeIndex]) -> Vec<Vec<NodeIndex>> {
    let mut seen: HashSet<NodeIndex> = start.iter().copied().collect();
    let mut levels = Vec::new();
    let mut frontier = start.to_vec();
    loop {
        let mut next = Vec::new();
        for &ty in &frontier {
            for kind in [EdgeKind::Inherits, EdgeKind::Implements] {
                for sup in graph.outgoing(ty, kind) {
                    if seen.insert(sup) {
                        next.push(sup);
                    }
                }
            }
        }
        if next.is_empty() {
            break;
        }
        levels.push(next.clone());
        frontier = next;
    }
    levels
}

/// Methods declared directly on `owner`, constructors excluded.
pub(crate) fn declared_methods(graph: &CodeGraph, owner: NodeIndex) -> Vec<NodeIndex> {
    graph
        .outgoing(owner, EdgeKind::Contains)
        .into_iter()
        .filter(|&m| {
            let node = graph.node_at(m);
            node.kind.is_callable()
                && !node
                    .extras
                    .signature
                    .as_ref()
                    .is_some_and(|s| s.constructor)
        })
        .collect()
}
