pub mod edge;
pub mod node;

use std::collections::{HashMap, HashSet};

use petgraph::Directed;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;

use crate::error::BuildError;
use crate::frontend::CallSite;
use crate::language::LanguageKind;

use edge::{Edge, EdgeData, EdgeKind};
use node::{Node, NodeKind};

/// The in-memory code-property graph: a directed petgraph StableGraph with O(1) lookup indexes.
///
/// Nodes are never removed, so `node_indices()` yields them in insertion order;
/// every listing this type hands out relies on that for deterministic output.
pub struct CodeGraph {
    graph: StableGraph<Node, EdgeData, Directed>,
    /// Node id -> index. Ids are unique.
    id_index: HashMap<String, NodeIndex>,
    /// Qualified name -> all nodes bearing it (overloads, same module in two roots).
    qualified_index: HashMap<String, Vec<NodeIndex>>,
    /// Simple name -> all nodes bearing it.
    name_index: HashMap<String, Vec<NodeIndex>>,
    /// Edge kind -> edges of that kind, in insertion order.
    kind_index: HashMap<EdgeKind, Vec<EdgeIndex>>,
    /// (source, target, kind) of every edge, for duplicate suppression.
    edge_keys: HashSet<(NodeIndex, NodeIndex, EdgeKind)>,
    /// Unresolved call-site hints left by the front ends for the call resolvers.
    call_sites: Vec<CallSite>,
}

impl CodeGraph {
    /// Create an empty code graph.
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            id_index: HashMap::new(),
            qualified_index: HashMap::new(),
            name_index: HashMap::new(),
            kind_index: HashMap::new(),
            edge_keys: HashSet::new(),
            call_sites: Vec::new(),
        }
    }

    /// Add a node. Fails if a node with the same id is already present.
    pub fn add_node(&mut self, node: Node) -> Result<NodeIndex, BuildError> {
        if let Some(&existing) = self.id_index.get(&node.id) {
            return Err(BuildError::DuplicateNodeId {
                id: node.id,
                first_file: self.graph[existing].file.clone(),
                second_file: node.file,
            });
        }
        let id = node.id.clone();
        let qualified_name = node.qualified_name.clone();
        let name = node.name.clone();
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        self.qualified_index.entry(qualified_name).or_default().push(idx);
        self.name_index.entry(name).or_default().push(idx);
        Ok(idx)
    }

    /// Add an edge between two existing node ids.
    ///
    /// Returns `Ok(false)` when an edge with the same source, target and kind
    /// already exists (the graph keeps the first one), and
    /// `Err(BuildError::DanglingEdge)` if either endpoint is unknown.
    pub fn add_edge(&mut self, edge: Edge) -> Result<bool, BuildError> {
        let source = self.require(&edge, &edge.source)?;
        let target = self.require(&edge, &edge.target)?;
        Ok(self.add_edge_between(source, target, edge.kind, edge.metadata))
    }

    /// Add a batch of edges, returning how many were new.
    pub fn add_edges(&mut self, edges: impl IntoIterator<Item = Edge>) -> Result<usize, BuildError> {
        let mut added = 0;
        for edge in edges {
            if self.add_edge(edge)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub(crate) fn add_edge_between(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        kind: EdgeKind,
        metadata: edge::EdgeMetadata,
    ) -> bool {
        if !self.edge_keys.insert((source, target, kind)) {
            return false;
        }
        let e = self.graph.add_edge(source, target, EdgeData { kind, metadata });
        self.kind_index.entry(kind).or_default().push(e);
        true
    }

    fn require(&self, edge: &Edge, id: &str) -> Result<NodeIndex, BuildError> {
        self.id_index
            .get(id)
            .copied()
            .ok_or_else(|| BuildError::DanglingEdge {
                kind: edge.kind.as_str(),
                source_id: edge.source.clone(),
                target_id: edge.target.clone(),
                missing: id.to_owned(),
            })
    }

    pub(crate) fn push_call_sites(&mut self, sites: impl IntoIterator<Item = CallSite>) {
        self.call_sites.extend(sites);
    }

    /// Call-site hints recorded by the front ends, in file order.
    pub fn call_sites(&self) -> &[CallSite] {
        &self.call_sites
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.id_index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn node_at(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    /// Node indices in insertion order.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// All nodes with the given qualified name.
    pub fn by_qualified_name(&self, qualified_name: &str) -> &[NodeIndex] {
        self.qualified_index
            .get(qualified_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All nodes with the given simple name.
    pub fn by_name(&self, name: &str) -> &[NodeIndex] {
        self.name_index.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every edge, in insertion order.
    pub fn edges(&self) -> Vec<Edge> {
        self.graph
            .edge_indices()
            .filter_map(|e| self.edge_at(e))
            .collect()
    }

    pub(crate) fn edge_at(&self, e: EdgeIndex) -> Option<Edge> {
        let (source, target) = self.graph.edge_endpoints(e)?;
        let data = self.graph.edge_weight(e)?;
        Some(Edge {
            kind: data.kind,
            source: self.graph[source].id.clone(),
            target: self.graph[target].id.clone(),
            metadata: data.metadata,
        })
    }

    /// Edges whose endpoints are both in `members`, in insertion order.
    pub fn edges_among(&self, members: &HashSet<NodeIndex>) -> Vec<Edge> {
        self.graph
            .edge_indices()
            .filter(|&e| {
                self.graph
                    .edge_endpoints(e)
                    .is_some_and(|(s, t)| members.contains(&s) && members.contains(&t))
            })
            .filter_map(|e| self.edge_at(e))
            .collect()
    }

    /// Whether an edge of `kind` runs from `source` to `target`.
    pub fn has_edge(&self, source: NodeIndex, target: NodeIndex, kind: EdgeKind) -> bool {
        self.edge_keys.contains(&(source, target, kind))
    }

    /// Targets of outgoing edges of `kind`, in insertion order.
    pub fn outgoing(&self, idx: NodeIndex, kind: EdgeKind) -> Vec<NodeIndex> {
        self.neighbors_by_kind(idx, kind, Direction::Outgoing)
    }

    /// Sources of incoming edges of `kind`, in insertion order.
    pub fn incoming(&self, idx: NodeIndex, kind: EdgeKind) -> Vec<NodeIndex> {
        self.neighbors_by_kind(idx, kind, Direction::Incoming)
    }

    fn neighbors_by_kind(&self, idx: NodeIndex, kind: EdgeKind, dir: Direction) -> Vec<NodeIndex> {
        // petgraph yields adjacency newest-first; sort by edge index to restore insertion order.
        let mut hits: Vec<(EdgeIndex, NodeIndex)> = self
            .graph
            .edges_directed(idx, dir)
            .filter(|e| e.weight().kind == kind)
            .map(|e| {
                let other = match dir {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id(), other)
            })
            .collect();
        hits.sort();
        hits.into_iter().map(|(_, n)| n).collect()
    }

    /// Every node adjacent to `idx` over edges of any kind in either direction.
    pub fn adjacent(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.target())
            .chain(
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .map(|e| e.source()),
            )
    }

    /// The node that declares `idx` (source of its incoming `Contains` edge).
    pub fn owner_of(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.incoming(idx, EdgeKind::Contains).into_iter().next()
    }

    /// Languages with at least one node in the graph, in a fixed order.
    pub fn languages(&self) -> Vec<LanguageKind> {
        let mut langs: Vec<LanguageKind> = self
            .graph
            .node_weights()
            .map(|n| n.language)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        langs.sort();
        langs
    }

    // -----------------------------------------------------------------------
    // Counts
    // -----------------------------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Return a count of nodes broken down by kind.
    pub fn nodes_by_kind(&self) -> HashMap<NodeKind, usize> {
        let mut map: HashMap<NodeKind, usize> = HashMap::new();
        for node in self.graph.node_weights() {
            *map.entry(node.kind).or_insert(0) += 1;
        }
        map
    }

    /// Return a count of edges broken down by kind.
    pub fn edges_by_kind(&self) -> HashMap<EdgeKind, usize> {
        self.kind_index
            .iter()
            .map(|(kind, edges)| (*kind, edges.len()))
            .collect()
    }
}

impl Default for CodeGraph {
    fn default() -> Self {
        Self::new()
    }
}
