use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tree_sitter::{Node as TsNode, Parser};

use super::http::{HTTP_ANY, build_metadata, dedup, join_paths, normalize_method};
use super::{
    CallSite, FileScope, FrontEnd, ParseOutput, TypeRef, line_of, node_text, syntax_diagnostic,
    unquote,
};
use crate::graph::edge::{Edge, EdgeKind};
use crate::graph::node::{Extras, HttpMetadata, HttpRoute, Node, NodeKind, Param, Signature, Span};
use crate::language::LanguageKind;

thread_local! {
    static PARSER_PY: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("tree-sitter-python grammar is ABI compatible");
        p
    });
}

/// Builtins never produce call sites; they can't resolve to anything in the graph.
const PY_BUILTINS: &[&str] = &[
    "abs", "all", "any", "bool", "bytes", "callable", "dict", "dir", "enumerate", "filter",
    "float", "format", "frozenset", "getattr", "hasattr", "hash", "id", "int", "isinstance",
    "issubclass", "iter", "len", "list", "map", "max", "min", "next", "object", "open", "print",
    "range", "repr", "reversed", "round", "set", "setattr", "sorted", "str", "sum", "super",
    "tuple", "type", "vars", "zip",
];

const HTTP_VERBS: &[&str] = &["get", "post", "put", "delete", "patch", "head", "options"];

/// Python front end backed by tree-sitter-python.
pub struct PythonFrontEnd;

impl FrontEnd for PythonFrontEnd {
    fn language(&self) -> LanguageKind {
        LanguageKind::Python
    }

    fn parse(&self, path: &str, contents: &str) -> Result<ParseOutput> {
        let source = contents.as_bytes();
        let tree = PARSER_PY
            .with(|p| p.borrow_mut().parse(source, None))
            .ok_or_else(|| anyhow!("tree-sitter returned None for {path}"))?;

        let mut extractor = Extractor::new(path, source);
        extractor.module(tree.root_node());
        let mut out = extractor.out;
        out.diagnostics.extend(syntax_diagnostic(&tree, path));
        Ok(out)
    }
}

/// Dotted module name for a repository-relative path: `a/b/c.py` -> `a.b.c`,
/// `a/b/__init__.py` -> `a.b`.
pub fn module_name(path: &str) -> String {
    let stem = path
        .strip_suffix(".py")
        .or_else(|| path.strip_suffix(".pyi"))
        .unwrap_or(path);
    let mut parts: Vec<&str> = stem.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() > 1 && parts.last() == Some(&"__init__") {
        parts.pop();
    }
    parts.join(".")
}

/// Qualified names a reference to `name` may denote: an import alias, a member
/// of the enclosing class, a name in the current module, then the name as written.
pub fn name_candidates(
    name: &str,
    module_qn: &str,
    aliases: &BTreeMap<String, String>,
    enclosing: Option<&str>,
) -> Vec<String> {
    let (head, tail) = match name.split_once('.') {
        Some((h, t)) => (h, Some(t)),
        None => (name, None),
    };
    let with_tail = |base: &str| match tail {
        Some(t) => format!("{base}.{t}"),
        None => base.to_string(),
    };
    let mut out = Vec::new();
    if let Some(target) = aliases.get(name) {
        out.push(target.clone());
    }
    if let Some(target) = aliases.get(head) {
        out.push(with_tail(target));
    }
    if let Some(class) = enclosing {
        out.push(with_tail(&format!("{class}.{head}")));
    }
    if !module_qn.is_empty() {
        out.push(with_tail(&format!("{module_qn}.{head}")));
    }
    out.push(name.to_string());
    dedup(out)
}

/// Who a route decorator hangs off (`app`, `bp`, `router`) and what it adds.
#[derive(Debug, Clone)]
struct RouteOwner {
    framework: &'static str,
    prefix: Option<String>,
}

/// Positional and keyword arguments of a call.
struct CallArgs<'t> {
    positional: Vec<TsNode<'t>>,
    keywords: Vec<(String, TsNode<'t>)>,
}

impl<'t> CallArgs<'t> {
    fn keyword(&self, name: &str) -> Option<TsNode<'t>> {
        self.keywords
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }
}

/// A parameter plus the callee of its default value (`Query(...)`, `Header(...)`).
struct PyParam {
    param: Param,
    default_call: Option<String>,
}

struct ClassFrame {
    id: String,
    qualified_name: String,
    fields: BTreeMap<String, String>,
}

struct Extractor<'a> {
    path: &'a str,
    source: &'a [u8],
    module_qn: String,
    module_id: String,
    aliases: BTreeMap<String, String>,
    imports: Vec<String>,
    uses_fastapi: bool,
    route_owners: HashMap<String, RouteOwner>,
    scope: Arc<FileScope>,
    classes: Vec<ClassFrame>,
    seen: HashSet<String>,
    out: ParseOutput,
}

impl<'a> Extractor<'a> {
    fn new(path: &'a str, source: &'a [u8]) -> Self {
        Self {
            path,
            source,
            module_qn: module_name(path),
            module_id: String::new(),
            aliases: BTreeMap::new(),
            imports: Vec::new(),
            uses_fastapi: false,
            route_owners: HashMap::new(),
            scope: Arc::new(FileScope::default()),
            classes: Vec::new(),
            seen: HashSet::new(),
            out: ParseOutput::default(),
        }
    }

    fn text(&self, node: TsNode) -> &'a str {
        node_text(node, self.source)
    }

    fn span(node: TsNode) -> Span {
        Span::new(line_of(node), node.end_position().row + 1)
    }

    fn qualify(&self, name: &str) -> String {
        match self.classes.last() {
            Some(class) => format!("{}.{}", class.qualified_name, name),
            None if self.module_qn.is_empty() => name.to_string(),
            None => format!("{}.{}", self.module_qn, name),
        }
    }

    /// Package that relative imports are resolved against.
    fn package(&self) -> String {
        if self.path.ends_with("__init__.py") || self.path.ends_with("__init__.pyi") {
            self.module_qn.clone()
        } else {
            self.module_qn
                .rsplit_once('.')
                .map(|(pkg, _)| pkg.to_string())
                .unwrap_or_default()
        }
    }

    /// Push `node` unless an earlier definition in this file took its id
    /// (redefinitions and `@x.setter` pairs keep the first one).
    fn push_node(&mut self, node: Node, parent_id: &str) -> Option<String> {
        if !self.seen.insert(node.id.clone()) {
            return None;
        }
        let id = node.id.clone();
        self.out
            .edges
            .push(Edge::new(EdgeKind::Contains, parent_id, &id));
        self.out.nodes.push(node);
        Some(id)
    }

    fn module(&mut self, root: TsNode) {
        let mut import_refs = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "import_statement" => self.import_statement(child),
                "import_from_statement" => import_refs.extend(self.import_from(child)),
                "expression_statement" => self.route_owner(child),
                _ => {}
            }
        }
        self.uses_fastapi = self
            .imports
            .iter()
            .any(|i| i.starts_with("fastapi") || i.starts_with("starlette"));

        let name = self
            .module_qn
            .rsplit('.')
            .next()
            .unwrap_or(&self.module_qn)
            .to_string();
        let module = Node::new(
            LanguageKind::Python,
            NodeKind::Module,
            name,
            &self.module_qn,
            self.path,
            Self::span(root),
        )
        .with_extras(Extras {
            imports: self.imports.clone(),
            ..Default::default()
        });
        self.module_id = module.id.clone();
        self.seen.insert(module.id.clone());
        self.out.nodes.push(module);

        for (name, qualified, line) in import_refs {
            self.out.type_refs.push(TypeRef {
                source: self.module_id.clone(),
                kind: EdgeKind::Imports,
                name,
                candidates: vec![qualified],
                file: self.path.to_string(),
                line,
            });
        }

        self.scope = Arc::new(FileScope {
            module: self.module_id.clone(),
            package: Some(self.module_qn.clone()),
            imports: self.imports.clone(),
            aliases: self.aliases.clone(),
        });

        let module_id = self.module_id.clone();
        let mut sites = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "class_definition" | "function_definition" | "decorated_definition" => {
                    self.definition(child, &module_id)
                }
                _ => self.collect_calls(child, &module_id, None, &HashMap::new(), true, &mut sites),
            }
        }
        self.out.call_sites.extend(sites);
    }

    fn import_statement(&mut self, node: TsNode) {
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let (target, alias) = match name.kind() {
                "aliased_import" => (
                    name.child_by_field_name("name").map(|n| self.text(n)),
                    name.child_by_field_name("alias").map(|n| self.text(n)),
                ),
                _ => (Some(self.text(name)), None),
            };
            let Some(target) = target else { continue };
            self.aliases
                .insert(alias.unwrap_or(target).to_string(), target.to_string());
            self.imports.push(target.to_string());
        }
    }

    /// Returns `(bound name, qualified name, line)` per imported name.
    fn import_from(&mut self, node: TsNode) -> Vec<(String, String, usize)> {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return Vec::new();
        };
        let written = self.text(module_node);
        let module = if module_node.kind() == "relative_import" {
            let dots = written.chars().take_while(|c| *c == '.').count();
            let rest = &written[dots..];
            let mut base: Vec<String> = self
                .package()
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            for _ in 1..dots {
                base.pop();
            }
            if !rest.is_empty() {
                base.push(rest.to_string());
            }
            base.join(".")
        } else {
            written.to_string()
        };

        let mut refs = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "wildcard_import" {
                self.imports.push(format!("{module}.*"));
            }
        }
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let (target, alias) = match name.kind() {
                "aliased_import" => (
                    name.child_by_field_name("name").map(|n| self.text(n)),
                    name.child_by_field_name("alias").map(|n| self.text(n)),
                ),
                _ => (Some(self.text(name)), None),
            };
            let Some(target) = target else { continue };
            let qualified = if module.is_empty() {
                target.to_string()
            } else {
                format!("{module}.{target}")
            };
            let bound = alias.unwrap_or(target).to_string();
            self.aliases.insert(bound.clone(), qualified.clone());
            self.imports.push(qualified.clone());
            refs.push((bound, qualified, line_of(name)));
        }
        refs
    }

    /// `bp = Blueprint(..., url_prefix="/api")`, `router = APIRouter(prefix="/items")`.
    fn route_owner(&mut self, stmt: TsNode) {
        let Some(assignment) = stmt.named_child(0).filter(|n| n.kind() == "assignment") else {
            return;
        };
        let left = assignment.child_by_field_name("left");
        let right = assignment.child_by_field_name("right");
        let (Some(left), Some(call)) = (left, right) else {
            return;
        };
        if left.kind() != "identifier" || call.kind() != "call" {
            return;
        }
        let Some(function) = call.child_by_field_name("function") else {
            return;
        };
        let ctor = self.text(function).rsplit('.').next().unwrap_or("");
        let (framework, prefix_key) = match ctor {
            "Flask" => ("flask", None),
            "Blueprint" => ("flask", Some("url_prefix")),
            "FastAPI" => ("fastapi", None),
            "APIRouter" => ("fastapi", Some("prefix")),
            _ => return,
        };
        let args = self.call_args(call);
        let prefix = prefix_key
            .and_then(|k| args.keyword(k))
            .and_then(|v| self.string_literal(v));
        self.route_owners.insert(
            self.text(left).to_string(),
            RouteOwner { framework, prefix },
        );
    }

    fn definition(&mut self, node: TsNode, parent_id: &str) {
        let (def, decorators) = if node.kind() == "decorated_definition" {
            let mut cursor = node.walk();
            let decorators: Vec<TsNode> = node
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "decorator")
                .collect();
            match node.child_by_field_name("definition") {
                Some(def) => (def, decorators),
                None => return,
            }
        } else {
            (node, Vec::new())
        };
        match def.kind() {
            "class_definition" => self.class(def, &decorators, parent_id),
            "function_definition" => self.function(def, &decorators, parent_id),
            _ => {}
        }
    }

    fn decorator_names(&self, decorators: &[TsNode]) -> Vec<String> {
        decorators
            .iter()
            .filter_map(|d| d.named_child(0))
            .map(|expr| {
                let target = if expr.kind() == "call" {
                    expr.child_by_field_name("function").unwrap_or(expr)
                } else {
                    expr
                };
                format!("@{}", self.text(target))
            })
            .collect()
    }

    fn class(&mut self, def: TsNode, decorators: &[TsNode], parent_id: &str) {
        let Some(name_node) = def.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let qualified_name = self.qualify(&name);
        let node = Node::new(
            LanguageKind::Python,
            NodeKind::Class,
            &name,
            &qualified_name,
            self.path,
            Self::span(def),
        )
        .with_extras(Extras {
            annotations: self.decorator_names(decorators),
            package: Some(self.module_qn.clone()),
            ..Default::default()
        });
        let Some(id) = self.push_node(node, parent_id) else {
            return;
        };
        let slot = self.out.nodes.len() - 1;

        if let Some(bases) = def.child_by_field_name("superclasses") {
            let written = self.out.type_refs.len();
            self.bases(bases, &id);
            self.out.nodes[slot].extras.supertypes = self.out.type_refs[written..]
                .iter()
                .map(|r| r.name.clone())
                .collect();
        }

        self.classes.push(ClassFrame {
            id: id.clone(),
            qualified_name,
            fields: BTreeMap::new(),
        });
        if let Some(body) = def.child_by_field_name("body") {
            self.class_fields(body, &id);
            let mut cursor = body.walk();
            let members: Vec<TsNode> = body.named_children(&mut cursor).collect();
            for member in members {
                if matches!(
                    member.kind(),
                    "class_definition" | "function_definition" | "decorated_definition"
                ) {
                    self.definition(member, &id);
                }
            }
        }
        if let Some(frame) = self.classes.pop() {
            self.out.nodes[slot].extras.fields = frame.fields;
        }
    }

    fn bases(&mut self, bases: TsNode, class_id: &str) {
        let mut cursor = bases.walk();
        for base in bases.named_children(&mut cursor) {
            let target = match base.kind() {
                "identifier" | "attribute" => base,
                "subscript" => match base.child_by_field_name("value") {
                    Some(v) => v,
                    None => continue,
                },
                _ => continue,
            };
            let name = self.text(target).to_string();
            if name == "object" {
                continue;
            }
            let candidates = self.name_candidates(&name);
            self.out.type_refs.push(TypeRef {
                source: class_id.to_string(),
                kind: EdgeKind::Inherits,
                name,
                candidates,
                file: self.path.to_string(),
                line: line_of(base),
            });
        }
    }

    fn name_candidates(&self, name: &str) -> Vec<String> {
        let enclosing = self.classes.last().map(|c| c.qualified_name.as_str());
        name_candidates(name, &self.module_qn, &self.aliases, enclosing)
    }

    /// Class attributes become field nodes; `self.x = ...` in any method only
    /// records the attribute type for receiver inference.
    fn class_fields(&mut self, body: TsNode, class_id: &str) {
        let mut cursor = body.walk();
        let statements: Vec<TsNode> = body.named_children(&mut cursor).collect();
        for stmt in statements {
            match stmt.kind() {
                "expression_statement" => {
                    let Some(assignment) =
                        stmt.named_child(0).filter(|n| n.kind() == "assignment")
                    else {
                        continue;
                    };
                    let Some(left) = assignment
                        .child_by_field_name("left")
                        .filter(|l| l.kind() == "identifier")
                    else {
                        continue;
                    };
                    let name = self.text(left).to_string();
                    let ty = self.assigned_type(assignment);
                    let mut extras = Extras::default();
                    if let Some(ty) = &ty {
                        extras
                            .other
                            .insert("type".into(), serde_json::Value::String(ty.clone()));
                    }
                    let node = Node::new(
                        LanguageKind::Python,
                        NodeKind::Field,
                        &name,
                        self.qualify(&name),
                        self.path,
                        Self::span(stmt),
                    )
                    .with_extras(extras);
                    self.push_node(node, class_id);
                    if let (Some(frame), Some(ty)) = (self.classes.last_mut(), ty) {
                        frame.fields.insert(name, ty);
                    }
                }
                "function_definition" | "decorated_definition" => {
                    let mut attrs = HashMap::new();
                    self.self_attributes(stmt, &mut attrs);
                    if let Some(frame) = self.classes.last_mut() {
                        for (name, ty) in attrs {
                            frame.fields.entry(name).or_insert(ty);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn self_attributes(&self, node: TsNode, attrs: &mut HashMap<String, String>) {
        if node.kind() == "class_definition" {
            return;
        }
        if node.kind() == "assignment"
            && let Some(left) = node.child_by_field_name("left")
            && left.kind() == "attribute"
            && left
                .child_by_field_name("object")
                .is_some_and(|o| self.text(o) == "self")
            && let Some(attr) = left.child_by_field_name("attribute")
            && let Some(ty) = self.assigned_type(node)
        {
            attrs.insert(self.text(attr).to_string(), ty);
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.self_attributes(child, attrs);
        }
    }

    /// Annotated type, or the class being instantiated on the right-hand side.
    fn assigned_type(&self, assignment: TsNode) -> Option<String> {
        if let Some(ty) = assignment.child_by_field_name("type") {
            return Some(strip_subscript(self.text(ty)));
        }
        let right = assignment.child_by_field_name("right")?;
        if right.kind() != "call" {
            return None;
        }
        let function = self.text(right.child_by_field_name("function")?);
        let last = function.rsplit('.').next().unwrap_or(function);
        last.starts_with(|c: char| c.is_ascii_uppercase())
            .then(|| function.to_string())
    }

    fn function(&mut self, def: TsNode, decorators: &[TsNode], parent_id: &str) {
        let Some(name_node) = def.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let annotations = self.decorator_names(decorators);
        let in_class = !self.classes.is_empty();
        let is_static = annotations.iter().any(|a| a == "@staticmethod");

        let mut params = def
            .child_by_field_name("parameters")
            .map(|p| self.params(p))
            .unwrap_or_default();
        if in_class
            && !is_static
            && params
                .first()
                .is_some_and(|p| matches!(p.param.name.as_str(), "self" | "cls"))
        {
            params.remove(0);
        }

        let http = self.route(decorators, &params);
        let signature = Signature {
            params: params.iter().map(|p| p.param.clone()).collect(),
            returns: def
                .child_by_field_name("return_type")
                .map(|r| self.text(r).to_string()),
            constructor: in_class && name == "__init__",
        };
        let mut locals: HashMap<String, String> = signature
            .params
            .iter()
            .filter_map(|p| Some((p.name.clone(), strip_subscript(p.type_name.as_deref()?))))
            .collect();

        let kind = if in_class {
            NodeKind::Method
        } else {
            NodeKind::Function
        };
        let node = Node::new(
            LanguageKind::Python,
            kind,
            &name,
            self.qualify(&name),
            self.path,
            Self::span(def),
        )
        .with_extras(Extras {
            http,
            signature: Some(signature),
            annotations,
            ..Default::default()
        });
        let Some(id) = self.push_node(node, parent_id) else {
            return;
        };

        if let Some(body) = def.child_by_field_name("body") {
            self.collect_locals(body, &mut locals);
            let enclosing = self.classes.last().map(|c| c.id.clone());
            let mut sites = Vec::new();
            self.collect_calls(body, &id, enclosing.as_deref(), &locals, false, &mut sites);
            self.out.call_sites.extend(sites);
        }
    }

    fn params(&self, parameters: TsNode) -> Vec<PyParam> {
        let mut out = Vec::new();
        let mut cursor = parameters.walk();
        for p in parameters.named_children(&mut cursor) {
            let (name_node, type_node, default, variadic) = match p.kind() {
                "identifier" => (Some(p), None, None, false),
                "typed_parameter" => {
                    let inner = p.named_child(0);
                    let variadic = inner.is_some_and(|n| {
                        matches!(n.kind(), "list_splat_pattern" | "dictionary_splat_pattern")
                    });
                    let name = if variadic {
                        inner.and_then(|n| n.named_child(0))
                    } else {
                        inner
                    };
                    (name, p.child_by_field_name("type"), None, variadic)
                }
                "default_parameter" => (
                    p.child_by_field_name("name"),
                    None,
                    p.child_by_field_name("value"),
                    false,
                ),
                "typed_default_parameter" => (
                    p.child_by_field_name("name"),
                    p.child_by_field_name("type"),
                    p.child_by_field_name("value"),
                    false,
                ),
                "list_splat_pattern" | "dictionary_splat_pattern" => (p.named_child(0), None, None, true),
                _ => continue,
            };
            let Some(name_node) = name_node else { continue };
            let default_call = default
                .filter(|d| d.kind() == "call")
                .and_then(|d| d.child_by_field_name("function"))
                .map(|f| {
                    let text = self.text(f);
                    text.rsplit('.').next().unwrap_or(text).to_string()
                });
            out.push(PyParam {
                param: Param {
                    name: self.text(name_node).to_string(),
                    type_name: type_node.map(|t| self.text(t).to_string()),
                    has_default: default.is_some(),
                    variadic,
                },
                default_call,
            });
        }
        out
    }

    fn call_args<'t>(&self, call: TsNode<'t>) -> CallArgs<'t> {
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        if let Some(args) = call.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for child in args.named_children(&mut cursor) {
                if child.is_extra() {
                    continue;
                }
                if child.kind() == "keyword_argument" {
                    if let (Some(name), Some(value)) = (
                        child.child_by_field_name("name"),
                        child.child_by_field_name("value"),
                    ) {
                        keywords.push((self.text(name).to_string(), value));
                    }
                    continue;
                }
                positional.push(child);
            }
        }
        CallArgs {
            positional,
            keywords,
        }
    }

    fn string_literal(&self, node: TsNode) -> Option<String> {
        (node.kind() == "string").then(|| unquote(self.text(node)))
    }

    fn string_list(&self, node: TsNode) -> Vec<String> {
        if matches!(node.kind(), "list" | "tuple" | "set") {
            let mut cursor = node.walk();
            return node
                .named_children(&mut cursor)
                .filter_map(|c| self.string_literal(c))
                .collect();
        }
        self.string_literal(node).into_iter().collect()
    }

    /// Route metadata from Flask / FastAPI decorators. Stacked route decorators
    /// become additional routes of the same handler.
    fn route(&self, decorators: &[TsNode], params: &[PyParam]) -> Option<HttpMetadata> {
        let mut merged: Option<HttpMetadata> = None;
        for decorator in decorators {
            let Some(call) = decorator.named_child(0).filter(|n| n.kind() == "call") else {
                continue;
            };
            let Some(function) = call
                .child_by_field_name("function")
                .filter(|f| f.kind() == "attribute")
            else {
                continue;
            };
            let (Some(object), Some(attr)) = (
                function.child_by_field_name("object"),
                function.child_by_field_name("attribute"),
            ) else {
                continue;
            };
            let owner = self.route_owners.get(self.text(object));
            let default_framework = if self.uses_fastapi { "fastapi" } else { "flask" };
            let owner_framework = owner.map(|o| o.framework);
            let args = self.call_args(call);
            let listed = || -> Vec<String> {
                args.keyword("methods")
                    .map(|v| {
                        self.string_list(v)
                            .iter()
                            .filter_map(|m| normalize_method(m))
                            .collect()
                    })
                    .unwrap_or_default()
            };

            let verb = self.text(attr);
            let (methods, framework) = match verb {
                "route" => {
                    let methods = listed();
                    let methods = if methods.is_empty() {
                        vec!["GET".to_string()]
                    } else {
                        methods
                    };
                    (methods, owner_framework.unwrap_or("flask"))
                }
                "api_route" => {
                    let methods = listed();
                    let methods = if methods.is_empty() {
                        vec![HTTP_ANY.to_string()]
                    } else {
                        methods
                    };
                    (methods, "fastapi")
                }
                v if HTTP_VERBS.contains(&v) => (
                    vec![v.to_ascii_uppercase()],
                    owner_framework.unwrap_or(default_framework),
                ),
                _ => continue,
            };

            let Some(path) = args
                .positional
                .first()
                .copied()
                .or_else(|| args.keyword("path"))
                .or_else(|| args.keyword("rule"))
                .and_then(|n| self.string_literal(n))
            else {
                continue;
            };
            let prefix = owner.and_then(|o| o.prefix.as_deref()).unwrap_or("");
            let full = join_paths(prefix, &path);

            let Some(mut http) = build_metadata(&dedup(methods), &[full], framework) else {
                continue;
            };
            if framework == "fastapi" {
                http.produces = vec![
                    args.keyword("response_class")
                        .map(|c| response_class_media_type(self.text(c)))
                        .unwrap_or("application/json")
                        .to_string(),
                ];
                http.response_status = args
                    .keyword("status_code")
                    .map(|s| self.text(s).to_string());
                for p in params {
                    let name = p.param.name.clone();
                    match p.default_call.as_deref() {
                        Some("Query") => http.query_params.push(name),
                        Some("Header") => http.header_params.push(name),
                        Some("Body") => http.body_params.push(name),
                        Some("Cookie") => http.cookie_params.push(name),
                        Some("Path") => http.path_vars.push(name),
                        _ => {}
                    }
                }
                http.path_vars = dedup(std::mem::take(&mut http.path_vars));
            }

            match merged.as_mut() {
                None => merged = Some(http),
                Some(first) => {
                    let extra: Vec<HttpRoute> = http
                        .routes()
                        .map(|(method, path)| HttpRoute {
                            method: method.to_string(),
                            path: path.to_string(),
                        })
                        .collect();
                    first.additional_routes.extend(extra);
                    first.path_vars =
                        dedup(first.path_vars.drain(..).chain(http.path_vars).collect());
                }
            }
        }
        merged
    }

    fn collect_locals(&self, node: TsNode, locals: &mut HashMap<String, String>) {
        if matches!(node.kind(), "function_definition" | "class_definition") {
            return;
        }
        if node.kind() == "assignment"
            && let Some(left) = node.child_by_field_name("left")
            && left.kind() == "identifier"
            && let Some(ty) = self.assigned_type(node)
        {
            locals.insert(self.text(left).to_string(), ty);
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.collect_locals(child, locals);
        }
    }

    fn collect_calls(
        &self,
        node: TsNode,
        caller: &str,
        enclosing_type: Option<&str>,
        locals: &HashMap<String, String>,
        skip_definitions: bool,
        sites: &mut Vec<CallSite>,
    ) {
        if skip_definitions
            && matches!(
                node.kind(),
                "function_definition" | "class_definition" | "decorated_definition"
            )
        {
            return;
        }
        if node.kind() == "call"
            && let Some(site) = self.call_site(node, caller, enclosing_type, locals)
        {
            sites.push(site);
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.collect_calls(child, caller, enclosing_type, locals, skip_definitions, sites);
        }
    }

    fn call_site(
        &self,
        call: TsNode,
        caller: &str,
        enclosing_type: Option<&str>,
        locals: &HashMap<String, String>,
    ) -> Option<CallSite> {
        let function = call.child_by_field_name("function")?;
        let (callee, receiver, receiver_type) = match function.kind() {
            "identifier" => {
                let name = self.text(function);
                if PY_BUILTINS.contains(&name) {
                    return None;
                }
                (name.to_string(), None, None)
            }
            "attribute" => {
                let object = function.child_by_field_name("object")?;
                let attr = function.child_by_field_name("attribute")?;
                let (receiver, receiver_type) = match object.kind() {
                    "call"
                        if object
                            .child_by_field_name("function")
                            .is_some_and(|f| self.text(f) == "super") =>
                    {
                        ("super".to_string(), None)
                    }
                    "identifier" => {
                        let name = self.text(object);
                        (name.to_string(), locals.get(name).cloned())
                    }
                    "attribute"
                        if object
                            .child_by_field_name("object")
                            .is_some_and(|o| self.text(o) == "self") =>
                    {
                        let field = object
                            .child_by_field_name("attribute")
                            .map(|a| self.text(a))
                            .unwrap_or("");
                        let ty = self
                            .classes
                            .last()
                            .and_then(|c| c.fields.get(field))
                            .cloned();
                        (format!("self.{field}"), ty)
                    }
                    _ => (
                        self.text(object)
                            .chars()
                            .filter(|c| !c.is_whitespace())
                            .collect(),
                        None,
                    ),
                };
                (self.text(attr).to_string(), Some(receiver), receiver_type)
            }
            _ => return None,
        };
        let arg_count = call
            .child_by_field_name("arguments")
            .filter(|a| a.kind() == "argument_list")
            .map(|args| {
                let mut cursor = args.walk();
                args.named_children(&mut cursor)
                    .filter(|n| !n.is_extra())
                    .count()
            })
            .unwrap_or(1);
        Some(CallSite {
            caller: caller.to_string(),
            enclosing_type: enclosing_type.map(str::to_string),
            callee,
            receiver,
            receiver_type,
            arg_count,
            file: self.path.to_string(),
            line: line_of(call),
            language: LanguageKind::Python,
            scope: Arc::clone(&self.scope),
        })
    }
}

fn response_class_media_type(class: &str) -> &'static str {
    match class.rsplit('.').next().unwrap_or(class) {
        "HTMLResponse" => "text/html",
        "PlainTextResponse" => "text/plain",
        "StreamingResponse" | "FileResponse" => "application/octet-stream",
        _ => "application/json",
    }
}

/// `Optional[Foo]` -> `Optional`, `"Foo"` -> `Foo`.
fn strip_subscript(raw: &str) -> String {
    let raw = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    raw.split('[').next().unwrap_or(raw).trim().to_string()
}
