use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::language::LanguageKind;

/// The kind of declaration a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// One node per source file (Java compilation unit, Python module).
    Module,
    Class,
    Interface,
    Enum,
    /// A method declared on a type (constructors included).
    Method,
    /// A module-level Python function.
    Function,
    Field,
}

impl NodeKind {
    /// Lowercase name used in node ids, JSON output and filter specs.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Enum => "enum",
            NodeKind::Method => "method",
            NodeKind::Function => "function",
            NodeKind::Field => "field",
        }
    }

    /// Parse a kind name. Case-insensitive.
    pub fn from_str_loose(s: &str) -> Option<NodeKind> {
        match s.trim().to_lowercase().as_str() {
            "module" | "file" => Some(NodeKind::Module),
            "class" => Some(NodeKind::Class),
            "interface" => Some(NodeKind::Interface),
            "enum" => Some(NodeKind::Enum),
            "method" => Some(NodeKind::Method),
            "function" => Some(NodeKind::Function),
            "field" => Some(NodeKind::Field),
            _ => None,
        }
    }

    /// Types can own methods and take part in inheritance.
    pub fn is_type(&self) -> bool {
        matches!(self, NodeKind::Class | NodeKind::Interface | NodeKind::Enum)
    }

    /// Methods and free functions are the only call targets.
    pub fn is_callable(&self) -> bool {
        matches!(self, NodeKind::Method | NodeKind::Function)
    }
}

/// 1-based, inclusive line range of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }
}

/// A declared parameter of a method or function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub type_name: Option<String>,
    /// Python parameters with a default value may be omitted at the call site.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub has_default: bool,
    /// Java varargs, Python `*args` / `**kwargs`.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub variadic: bool,
}

/// Parameter list and return type of a callable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Param>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub returns: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub constructor: bool,
}

impl Signature {
    /// Declared parameter count, the only key override matching uses besides the name.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether a call passing `arg_count` arguments can bind to this signature.
    pub fn accepts(&self, arg_count: usize) -> bool {
        let required = self
            .params
            .iter()
            .filter(|p| !p.has_default && !p.variadic)
            .count();
        let variadic = self.params.iter().any(|p| p.variadic);
        if variadic {
            arg_count >= required
        } else {
            arg_count >= required && arg_count <= self.params.len()
        }
    }
}

/// A single HTTP method/path pair a handler is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRoute {
    pub method: String,
    pub path: String,
}

/// Route metadata attached to request-handler methods at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HttpMetadata {
    /// Upper-case HTTP verb, or `ANY` when the mapping accepts every verb.
    pub method: String,
    /// Full route path (class-level base path joined with the handler path).
    pub path: String,
    #[serde(default)]
    pub produces: Vec<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default)]
    pub path_vars: Vec<String>,
    /// Further method/path pairs when one handler is mapped more than once.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub additional_routes: Vec<HttpRoute>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub query_params: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub header_params: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub body_params: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cookie_params: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub framework: Option<String>,
}

impl HttpMetadata {
    /// Every (method, path) pair: the primary route first, then the additional ones.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once((self.method.as_str(), self.path.as_str())).chain(
            self.additional_routes
                .iter()
                .map(|r| (r.method.as_str(), r.path.as_str())),
        )
    }
}

/// Open-ended per-node attributes.
///
/// Known extension kinds are typed fields; anything else lands in `other` and
/// is flattened into the serialized object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Extras {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub http: Option<HttpMetadata>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<Signature>,
    /// Java annotations and Python decorators, `@`-prefixed.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub annotations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub modifiers: Vec<String>,
    /// Field name -> declared (or inferred) type, on type nodes.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub package: Option<String>,
    /// Imported names, on module nodes.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub imports: Vec<String>,
    /// Supertypes as written in source, whether or not the repository declares them.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub supertypes: Vec<String>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// A declaration in source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    /// Stable id: `{language}:{kind}:{file}#{qualified_name}`.
    pub id: String,
    pub kind: NodeKind,
    /// Simple (unqualified) name. Not part of the serialized form.
    #[serde(skip)]
    pub name: String,
    pub qualified_name: String,
    /// Path relative to the repository root, `/`-separated.
    pub file: String,
    pub span: Span,
    pub language: LanguageKind,
    pub extras: Extras,
}

impl Node {
    /// Build a node, deriving its id from language, kind, file and qualified name.
    pub fn new(
        language: LanguageKind,
        kind: NodeKind,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        file: impl Into<String>,
        span: Span,
    ) -> Self {
        let qualified_name = qualified_name.into();
        let file = file.into();
        Self {
            id: node_id(language, kind, &file, &qualified_name),
            kind,
            name: name.into(),
            qualified_name,
            file,
            span,
            language,
            extras: Extras::default(),
        }
    }

    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }

    /// Declared parameter count; nodes without a signature have arity 0.
    pub fn arity(&self) -> usize {
        self.extras.signature.as_ref().map_or(0, Signature::arity)
    }

    pub fn accepts(&self, arg_count: usize) -> bool {
        match &self.extras.signature {
            Some(sig) => sig.accepts(arg_count),
            None => arg_count == 0,
        }
    }
}

/// Format a node id. Same inputs always yield the same id.
pub fn node_id(language: LanguageKind, kind: NodeKind, file: &str, qualified_name: &str) -> String {
    format!(
        "{}:{}:{}#{}",
        language.as_str(),
        kind.as_str(),
        file,
        qualified_name
    )
}
