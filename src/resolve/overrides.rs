use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::NodeIndex;
use tracing::debug;

use super::{ancestor_levels, declared_methods};
use crate::graph::CodeGraph;
use crate::graph::edge::{Edge, EdgeKind};

/// Derive `overrides` edges from the inheritance structure of `graph`.
///
/// A method declared on a type overrides every method with the same name and
/// arity declared on any transitive supertype. Constructors never override.
/// When several ancestors declare a matching method, one edge is produced per
/// ancestor method. Edges already present in the graph are not returned again,
/// so applying the result and calling this a second time yields nothing.
pub fn derive_overrides(graph: &CodeGraph) -> Vec<Edge> {
    let mut edges = Vec::new();
    let mut emitted: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();

    for ty in graph.node_indices() {
        if !graph.node_at(ty).kind.is_type() {
            continue;
        }
        let own = declared_methods(graph, ty);
        if own.is_empty() {
            continue;
        }
        let ancestors: Vec<NodeIndex> = ancestor_levels(graph, &[ty]).into_iter().flatten().collect();
        if ancestors.is_empty() {
            continue;
        }

        let mut by_signature: HashMap<(&str, usize), Vec<NodeIndex>> = HashMap::new();
        for ancestor in ancestors {
            for m in declared_methods(graph, ancestor) {
                let node = graph.node_at(m);
                by_signature
                    .entry((node.name.as_str(), node.arity()))
                    .or_default()
                    .push(m);
            }
        }

        for m in own {
            let node = graph.node_at(m);
            let Some(targets) = by_signature.get(&(node.name.as_str(), node.arity())) else {
                continue;
            };
            for &target in targets {
                if graph.has_edge(m, target, EdgeKind::Overrides) || !emitted.insert((m, target)) {
                    continue;
                }
                edges.push(Edge::new(
                    EdgeKind::Overrides,
                    &node.id,
                    &graph.node_at(target).id,
                ));
            }
        }
    }

    debug!(count = edges.len(), "derived override edges");
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::testing::*;

    #[test]
    fn test_direct_override_same_arity() {
        let mut graph = CodeGraph::new();
        let sub = add_type(&mut graph, "p.Sub", "Sub.java");
        let sup = add_type(&mut graph, "p.Super", "Super.java");
        link(&mut graph, EdgeKind::Inherits, &sub, &sup);
        let f_sub = add_method(&mut graph, &sub, "f", 1);
        let f_sup = add_method(&mut graph, &sup, "f", 1);

        let edges = derive_overrides(&graph);
        assert_eq!(edges, vec![Edge::new(EdgeKind::Overrides, f_sub, f_sup)]);
    }

    #[test]
    fn test_arity_mismatch_yields_nothing() {
        let mut graph = CodeGraph::new();
        let sub = add_type(&mut graph, "p.Sub", "Sub.java");
        let sup = add_type(&mut graph, "p.Super", "Super.java");
        link(&mut graph, EdgeKind::Inherits, &sub, &sup);
        add_method(&mut graph, &sub, "f", 1);
        add_method(&mut graph, &sup, "f", 2);
        assert!(derive_overrides(&graph).is_empty());
    }

    #[test]
    fn test_no_inheritance_no_overrides() {
        let mut graph = CodeGraph::new();
        let a = add_type(&mut graph, "p.A", "A.java");
        let b = add_type(&mut graph, "p.B", "B.java");
        add_method(&mut graph, &a, "f", 0);
        add_method(&mut graph, &b, "f", 0);
        assert!(derive_overrides(&graph).is_empty());
    }

    #[test]
    fn test_transitive_chain() {
        let mut graph = CodeGraph::new();
        let a = add_type(&mut graph, "p.A", "A.java");
        let b = add_type(&mut graph, "p.B", "B.java");
        let c = add_type(&mut graph, "p.C", "C.java");
        link(&mut graph, EdgeKind::Inherits, &a, &b);
        link(&mut graph, EdgeKind::Inherits, &b, &c);
        let f_a = add_method(&mut graph, &a, "f", 0);
        let f_c = add_method(&mut graph, &c, "f", 0);

        let edges = derive_overrides(&graph);
        assert_eq!(edges, vec![Edge::new(EdgeKind::Overrides, f_a, f_c)]);
    }

    #[test]
    fn test_interface_methods_are_overridden() {
        let mut graph = CodeGraph::new();
        let class = add_type(&mut graph, "p.Impl", "Impl.java");
        let iface = add_type(&mut graph, "p.Api", "Api.java");
        link(&mut graph, EdgeKind::Implements, &class, &iface);
        let run_impl = add_method(&mut graph, &class, "run", 0);
        let run_api = add_method(&mut graph, &iface, "run", 0);
        assert_eq!(
            derive_overrides(&graph),
            vec![Edge::new(EdgeKind::Overrides, run_impl, run_api)]
        );
    }

    #[test]
    fn test_ambiguous_ancestors_get_one_edge_each() {
        let mut graph = CodeGraph::new();
        let sub = add_type(&mut graph, "p.Sub", "Sub.java");
        let left = add_type(&mut graph, "p.Left", "Left.java");
        let right = add_type(&mut graph, "p.Right", "Right.java");
        link(&mut graph, EdgeKind::Implements, &sub, &left);
        link(&mut graph, EdgeKind::Implements, &sub, &right);
        add_method(&mut graph, &sub, "f", 0);
        add_method(&mut graph, &left, "f", 0);
        add_method(&mut graph, &right, "f", 0);
        assert_eq!(derive_overrides(&graph).len(), 2);
    }

    #[test]
    fn test_idempotent_once_applied() {
        let mut graph = CodeGraph::new();
        let sub = add_type(&mut graph, "p.Sub", "Sub.java");
        let sup = add_type(&mut graph, "p.Super", "Super.java");
        link(&mut graph, EdgeKind::Inherits, &sub, &sup);
        add_method(&mut graph, &sub, "f", 0);
        add_method(&mut graph, &sup, "f", 0);

        let first = derive_overrides(&graph);
        assert_eq!(first.len(), 1);
        graph.add_edges(first).unwrap();
        assert!(derive_overrides(&graph).is_empty());
        assert_eq!(graph.edges_by_kind().get(&EdgeKind::Overrides), Some(&1));
    }
}
