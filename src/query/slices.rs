//! Canned subgraphs: the web layer and the messaging layer of a repository.

use petgraph::stable_graph::NodeIndex;

use super::{QueryResult, expanded_result};
use crate::graph::CodeGraph;
use crate::graph::node::Node;

const CONTROLLER_ANNOTATIONS: &[&str] = &["@Controller", "@RestController"];

const LISTENER_ANNOTATIONS: &[&str] = &[
    "@EventListener",
    "@KafkaListener",
    "@RabbitListener",
    "@JmsListener",
];

/// Matched by suffix, so `OrderMessageListener` counts too.
const LISTENER_INTERFACES: &[&str] = &["ApplicationListener", "MessageListener"];

/// Controller types and request handlers, expanded by `neighbors` hops.
///
/// Seeds are types annotated `@Controller`/`@RestController` and every node
/// carrying route metadata, so Flask and FastAPI handlers are included.
pub fn slice_controllers(graph: &CodeGraph, neighbors: usize) -> QueryResult {
    let seeds = seeds(graph, |node| {
        node.extras.http.is_some()
            || (node.kind.is_type() && annotated(node, CONTROLLER_ANNOTATIONS))
    });
    expanded_result(graph, &seeds, neighbors)
}

/// Message and event listeners, expanded by `neighbors` hops.
///
/// Seeds are nodes annotated with a listener annotation and types whose
/// written supertypes name a listener interface.
pub fn slice_listeners(graph: &CodeGraph, neighbors: usize) -> QueryResult {
    let seeds = seeds(graph, |node| {
        annotated(node, LISTENER_ANNOTATIONS)
            || (node.kind.is_type()
                && node.extras.supertypes.iter().any(|s| {
                    let simple = s.rsplit('.').next().unwrap_or(s);
                    LISTENER_INTERFACES.iter().any(|i| simple.ends_with(i))
                }))
    });
    expanded_result(graph, &seeds, neighbors)
}

fn seeds(graph: &CodeGraph, keep: impl Fn(&Node) -> bool) -> Vec<NodeIndex> {
    graph
        .node_indices()
        .filter(|&idx| keep(graph.node_at(idx)))
        .collect()
}

fn annotated(node: &Node, names: &[&str]) -> bool {
    node.extras
        .annotations
        .iter()
        .any(|a| names.contains(&a.as_str()))
}
