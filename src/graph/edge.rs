use serde::{Deserialize, Serialize};

/// The kind of directed edge between two nodes in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Module -> type, type -> member.
    Contains,
    /// Subtype -> supertype: class extends class, interface extends interface,
    /// Python base classes.
    Inherits,
    /// Class -> interface it implements.
    Implements,
    /// Subtype method -> supertype method with the same name and arity.
    Overrides,
    /// Caller -> resolved callee.
    Calls,
    /// Module -> imported type, when that type is part of the graph.
    Imports,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Inherits => "inherits",
            EdgeKind::Implements => "implements",
            EdgeKind::Overrides => "overrides",
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
        }
    }

    /// Edges followed when walking a type's ancestor chain.
    pub fn is_inheritance(&self) -> bool {
        matches!(self, EdgeKind::Inherits | EdgeKind::Implements)
    }
}

/// Which rule of the call resolver produced a `calls` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Qualified-name match within the caller's own file.
    Scope,
    /// Found on the receiver's type or one of its ancestors.
    Hierarchy,
    /// The only name/arity match in the whole graph.
    Global,
}

/// Optional per-edge attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeMetadata {
    /// Line of the call site or declaration the edge came from.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolution: Option<Resolution>,
}

impl EdgeMetadata {
    pub fn at_line(line: usize) -> Self {
        Self {
            line: Some(line),
            resolution: None,
        }
    }
}

/// Edge weight stored inside the petgraph graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeData {
    pub kind: EdgeKind,
    pub metadata: EdgeMetadata,
}

/// A directed relationship between two node ids, as emitted by front ends and
/// resolver passes and as serialized in query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub metadata: EdgeMetadata,
}

impl Edge {
    pub fn new(kind: EdgeKind, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            target: target.into(),
            metadata: EdgeMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: EdgeMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}
