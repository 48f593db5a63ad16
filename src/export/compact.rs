use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use crate::graph::edge::EdgeKind;
use crate::graph::node::{Extras, Node, NodeKind};
use crate::query::QueryResult;

fn priority(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Class | NodeKind::Interface => 3,
        NodeKind::Enum | NodeKind::Method | NodeKind::Function => 2,
        NodeKind::Module => 1,
        NodeKind::Field => 0,
    }
}

/// Shrink a result to at most `max_nodes` nodes for prompt-sized payloads.
///
/// Types rank above callables, callables above modules and fields; ties go
/// to the node with more edges inside the result, then to result order.
/// Kept nodes stay in result order and lose everything in their extras but
/// routes, annotations and supertypes. `imports` edges are dropped.
pub fn compact(result: &QueryResult, max_nodes: usize) -> QueryResult {
    let mut degree: HashMap<&str, usize> = HashMap::new();
    for edge in &result.edges {
        *degree.entry(edge.source.as_str()).or_default() += 1;
        *degree.entry(edge.target.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(usize, &Node)> = result.nodes.iter().enumerate().collect();
    ranked.sort_by_key(|(pos, node)| {
        (
            Reverse(priority(node.kind)),
            Reverse(degree.get(node.id.as_str()).copied().unwrap_or(0)),
            *pos,
        )
    });
    ranked.truncate(max_nodes);
    ranked.sort_by_key(|(pos, _)| *pos);

    let kept: HashSet<&str> = ranked.iter().map(|(_, n)| n.id.as_str()).collect();
    let nodes = ranked
        .into_iter()
        .map(|(_, node)| {
            let mut node = node.clone();
            node.extras = Extras {
                http: node.extras.http.take(),
                annotations: std::mem::take(&mut node.extras.annotations),
                supertypes: std::mem::take(&mut node.extras.supertypes),
                ..Default::default()
            };
            node
        })
        .collect();
    let edges = result
        .edges
        .iter()
        .filter(|e| e.kind != EdgeKind::Imports)
        .filter(|e| kept.contains(e.source.as_str()) && kept.contains(e.target.as_str()))
        .cloned()
        .collect();
    let matched = result
        .matched
        .iter()
        .filter(|id| kept.contains(id.as_str()))
        .cloned()
        .collect();

    QueryResult {
        nodes,
        edges,
        matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::Edge;
    use crate::graph::node::{HttpMetadata, Signature, Span};
    use crate::language::LanguageKind;

    fn node(kind: NodeKind, qn: &str) -> Node {
        let name = qn.rsplit('.').next().unwrap();
        Node::new(LanguageKind::Java, kind, name, qn, "p/A.java", Span::new(1, 1))
    }

    #[test]
    fn test_compact_keeps_types_then_connected_callables() {
        let module = node(NodeKind::Module, "p/A.java");
        let class = node(NodeKind::Class, "p.A");
        let lonely = node(NodeKind::Method, "p.A.lonely()");
        let busy = node(NodeKind::Method, "p.A.busy()").with_extras(Extras {
            http: Some(HttpMetadata {
                method: "GET".into(),
                path: "/a".into(),
                ..Default::default()
            }),
            signature: Some(Signature::default()),
            annotations: vec!["@GetMapping".into()],
            ..Default::default()
        });
        let field = node(NodeKind::Field, "p.A.count");
        let result = QueryResult {
            edges: vec![
                Edge::new(EdgeKind::Contains, &module.id, &class.id),
                Edge::new(EdgeKind::Contains, &class.id, &lonely.id),
                Edge::new(EdgeKind::Contains, &class.id, &busy.id),
                Edge::new(EdgeKind::Calls, &busy.id, &lonely.id),
                Edge::new(EdgeKind::Calls, &lonely.id, &busy.id),
                Edge::new(EdgeKind::Imports, &module.id, &busy.id),
            ],
            matched: vec![field.id.clone(), busy.id.clone()],
            nodes: vec![module, class, lonely, busy, field],
        };

        let small = compact(&result, 2);
        let names: Vec<&str> = small.nodes.iter().map(|n| n.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["p.A", "p.A.busy()"]);
        assert_eq!(small.edges.len(), 1);
        assert_eq!(small.matched.len(), 1);
        let busy = &small.nodes[1];
        assert!(busy.extras.http.is_some());
        assert_eq!(busy.extras.annotations, vec!["@GetMapping"]);
        assert!(busy.extras.signature.is_none());

        let all = compact(&result, 100);
        assert_eq!(all.nodes.len(), 5);
        assert!(all.edges.iter().all(|e| e.kind != EdgeKind::Imports));
        assert_eq!(all.edges.len(), 5);
    }
}
