pub mod http;
pub mod java;
pub mod python;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::diagnostics::Diagnostic;
use crate::graph::edge::{Edge, EdgeKind};
use crate::graph::node::Node;
use crate::language::LanguageKind;
use crate::resolve::CallResolver;

/// Everything a front end extracts from one file.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub nodes: Vec<Node>,
    /// Edges whose endpoints are both declared in this file (`contains`).
    pub edges: Vec<Edge>,
    /// Cross-file type references, linked by the builder after the merge.
    pub type_refs: Vec<TypeRef>,
    /// Call-site hints for the call resolvers.
    pub call_sites: Vec<CallSite>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A textual reference from a node to a type that may live in another file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub source: String,
    /// `Inherits`, `Implements` or `Imports`.
    pub kind: EdgeKind,
    /// The name as written in source.
    pub name: String,
    /// Qualified names to try, most specific first.
    pub candidates: Vec<String>,
    pub file: String,
    pub line: usize,
}

/// Name-resolution context shared by every call site of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileScope {
    /// Id of the file's module node.
    pub module: String,
    /// Java package or Python dotted module name.
    pub package: Option<String>,
    /// Java imports as written (`a.b.C`, `a.b.*`).
    pub imports: Vec<String>,
    /// Local alias -> qualified name (`import x.y as z`, `from m import C`).
    pub aliases: BTreeMap<String, String>,
}

/// An unresolved call: callee name plus whatever the front end knows about the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Id of the calling method or function.
    pub caller: String,
    /// Id of the type enclosing the caller, if any.
    pub enclosing_type: Option<String>,
    /// Simple name of the invoked method or function.
    pub callee: String,
    /// Receiver expression as written (`this`, `super`, `repo`, `self.repo`).
    pub receiver: Option<String>,
    /// Declared type of the receiver when the front end could infer it.
    pub receiver_type: Option<String>,
    pub arg_count: usize,
    pub file: String,
    pub line: usize,
    pub language: LanguageKind,
    pub scope: Arc<FileScope>,
}

/// A language front end: turns one source file into schema nodes and edges.
///
/// Implementations must not panic on malformed input; recoverable problems go into
/// `ParseOutput::diagnostics`. An `Err` (or a panic) is downgraded by the builder
/// to a `ParseError` diagnostic and the file's output is dropped.
pub trait FrontEnd: Send + Sync {
    fn language(&self) -> LanguageKind;

    /// Whether this front end claims `path`. `head` is the start of the file
    /// and is only consulted when the extension alone does not decide.
    fn handles(&self, path: &Path, head: &str) -> bool {
        let lang = self.language();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => lang.matches_extension(ext),
            None => lang.matches_content(head),
        }
    }

    /// Parse `contents` of the file at `path` (relative to the repository root).
    fn parse(&self, path: &str, contents: &str) -> Result<ParseOutput>;
}

/// Dispatch table from files to front ends, and from languages to call resolvers.
///
/// The builder receives one of these instead of hard-wiring the parsers, so tests
/// can register doubles.
#[derive(Clone, Default)]
pub struct LanguageRegistry {
    front_ends: Vec<Arc<dyn FrontEnd>>,
    resolvers: Vec<Arc<dyn CallResolver>>,
}

impl LanguageRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Java and Python front ends with their call resolvers.
    pub fn with_defaults() -> Self {
        Self::empty()
            .with_front_end(java::JavaFrontEnd)
            .with_front_end(python::PythonFrontEnd)
            .with_call_resolver(crate::resolve::java::JavaCallResolver)
            .with_call_resolver(crate::resolve::python::PythonCallResolver)
    }

    pub fn with_front_end(mut self, front_end: impl FrontEnd + 'static) -> Self {
        self.front_ends.push(Arc::new(front_end));
        self
    }

    pub fn with_call_resolver(mut self, resolver: impl CallResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// First registered front end that claims the file.
    pub fn classify(&self, path: &Path, head: &str) -> Option<&Arc<dyn FrontEnd>> {
        self.front_ends.iter().find(|fe| fe.handles(path, head))
    }

    /// Call resolvers registered for `language`, in registration order.
    pub fn resolvers_for(&self, language: LanguageKind) -> impl Iterator<Item = &Arc<dyn CallResolver>> {
        self.resolvers
            .iter()
            .filter(move |r| r.language() == language)
    }
}

/// 1-based line of a tree-sitter node.
pub(crate) fn line_of(node: tree_sitter::Node) -> usize {
    node.start_position().row + 1
}

/// Extract the UTF-8 text of a node from the original source bytes.
pub(crate) fn node_text<'s>(node: tree_sitter::Node<'_>, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

/// Strip one pair of matching quotes (and Python string prefixes) from a literal.
pub(crate) fn unquote(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(pos) = s.find(['"', '\''])
        && pos <= 2
        && s[..pos].chars().all(|c| "rRbBuUfF".contains(c))
    {
        s = &s[pos..];
    }
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if s.len() >= 2 * quote.len() && s.starts_with(quote) && s.ends_with(quote) {
            return s[quote.len()..s.len() - quote.len()].to_string();
        }
    }
    s.to_string()
}

/// Parse-error diagnostic when tree-sitter recovered from syntax errors.
pub(crate) fn syntax_diagnostic(tree: &tree_sitter::Tree, path: &str) -> Option<Diagnostic> {
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }
    let line = first_error_line(root).unwrap_or(1);
    Some(Diagnostic::parse_error(
        path,
        format!("syntax error near line {line}; declarations after it may be missing"),
    ))
}

fn first_error_line(node: tree_sitter::Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(line_of(node));
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error()
            && let Some(line) = first_error_line(child)
        {
            return Some(line);
        }
    }
    None
}
