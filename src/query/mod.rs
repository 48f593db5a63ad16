pub mod endpoints;
pub mod filter;
pub mod slices;

use std::collections::{HashSet, VecDeque};

use petgraph::stable_graph::NodeIndex;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::ConfigError;
use crate::graph::CodeGraph;
use crate::graph::edge::Edge;
use crate::graph::node::Node;

pub use filter::{CompiledFilter, FilterSpec};

/// Nodes selected by a filter plus their neighbor expansion, with the edges among them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    /// Matched and expanded nodes, in graph insertion order.
    pub nodes: Vec<Node>,
    /// Every edge whose endpoints are both in `nodes`, in insertion order.
    pub edges: Vec<Edge>,
    /// Ids of the nodes the predicates matched (the rest came from expansion).
    #[serde(skip)]
    pub matched: Vec<String>,
}

impl QueryResult {
    /// Plain structured form: `{"nodes": [...], "edges": [...]}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "nodes": self.nodes,
            "edges": self.edges,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` was matched directly rather than pulled in by `neighbors`.
    pub fn is_match(&self, id: &str) -> bool {
        self.matched.iter().any(|m| m == id)
    }
}

/// Evaluate `spec` against `graph`.
pub fn dynamic_query(graph: &CodeGraph, spec: &FilterSpec) -> Result<QueryResult, ConfigError> {
    let filter = spec.compile()?;
    Ok(run_filter(graph, &filter))
}

/// Evaluate a filter given as a JSON object.
pub fn dynamic_query_json(
    graph: &CodeGraph,
    spec: &serde_json::Value,
) -> Result<QueryResult, ConfigError> {
    dynamic_query(graph, &FilterSpec::from_json(spec)?)
}

/// Evaluate an already compiled filter. Predicates run in parallel; output
/// order is graph insertion order regardless.
pub fn run_filter(graph: &CodeGraph, filter: &CompiledFilter) -> QueryResult {
    let indices: Vec<NodeIndex> = graph.node_indices().collect();
    let matched: Vec<NodeIndex> = indices
        .par_iter()
        .copied()
        .filter(|&idx| filter.matches(graph, idx))
        .collect();

    expanded_result(graph, &matched, filter.neighbors())
}

/// `seeds` plus everything within `depth` hops, with the edges among them.
pub(crate) fn expanded_result(graph: &CodeGraph, seeds: &[NodeIndex], depth: usize) -> QueryResult {
    let members = expand(graph, seeds, depth);
    let mut ordered: Vec<NodeIndex> = members.iter().copied().collect();
    // Nodes are never removed, so index order is insertion order.
    ordered.sort();

    QueryResult {
        nodes: ordered.iter().map(|&idx| graph.node_at(idx).clone()).collect(),
        edges: graph.edges_among(&members),
        matched: seeds
            .iter()
            .map(|&idx| graph.node_at(idx).id.clone())
            .collect(),
    }
}

/// Breadth-first expansion of `start` by `depth` hops over edges in both directions.
fn expand(graph: &CodeGraph, start: &[NodeIndex], depth: usize) -> HashSet<NodeIndex> {
    let mut seen: HashSet<NodeIndex> = start.iter().copied().collect();
    if depth == 0 {
        return seen;
    }
    let mut queue: VecDeque<(NodeIndex, usize)> = start.iter().map(|&idx| (idx, 0)).collect();
    while let Some((idx, dist)) = queue.pop_front() {
        if dist == depth {
            continue;
        }
        for next in graph.adjacent(idx) {
            if seen.insert(next) {
                queue.push_back((next, dist + 1));
            }
        }
    }
    seen
}
