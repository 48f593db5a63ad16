use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use anyhow::{Result, anyhow};
use tree_sitter::{Node as TsNode, Parser, Query, QueryCursor, StreamingIterator};

use super::http::{build_metadata, combine_paths, dedup, media_type, normalize_method};
use super::{
    CallSite, FileScope, FrontEnd, ParseOutput, TypeRef, line_of, node_text, syntax_diagnostic,
    unquote,
};
use crate::diagnostics::Diagnostic;
use crate::graph::edge::{Edge, EdgeKind};
use crate::graph::node::{Extras, HttpMetadata, Node, NodeKind, Param, Signature, Span};
use crate::language::LanguageKind;

thread_local! {
    static PARSER_JAVA: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_java::LANGUAGE.into())
            .expect("tree-sitter-java grammar is ABI compatible");
        p
    });
}

const CALLS_QUERY: &str = "(method_invocation) @call";

static CALLS: OnceLock<Query> = OnceLock::new();

fn calls_query() -> &'static Query {
    CALLS.get_or_init(|| {
        Query::new(&tree_sitter_java::LANGUAGE.into(), CALLS_QUERY).expect("invalid Java call query")
    })
}

/// Spring shortcut annotations and the verb each one binds.
const VERB_MAPPINGS: &[(&str, &str)] = &[
    ("GetMapping", "GET"),
    ("PostMapping", "POST"),
    ("PutMapping", "PUT"),
    ("DeleteMapping", "DELETE"),
    ("PatchMapping", "PATCH"),
];

/// Java front end backed by tree-sitter-java.
pub struct JavaFrontEnd;

impl FrontEnd for JavaFrontEnd {
    fn language(&self) -> LanguageKind {
        LanguageKind::Java
    }

    fn parse(&self, path: &str, contents: &str) -> Result<ParseOutput> {
        let source = contents.as_bytes();
        let tree = PARSER_JAVA
            .with(|p| p.borrow_mut().parse(source, None))
            .ok_or_else(|| anyhow!("tree-sitter returned None for {path}"))?;

        let mut extractor = Extractor::new(path, source);
        extractor.compilation_unit(tree.root_node());
        let mut out = extractor.out;
        out.diagnostics.extend(syntax_diagnostic(&tree, path));
        Ok(out)
    }
}

/// Candidate qualified names for a type written as `name`, most specific first:
/// member types of the enclosing types, single-type imports, the current package,
/// then on-demand (`.*`) imports.
pub fn type_candidates(
    name: &str,
    package: Option<&str>,
    imports: &[String],
    enclosing: &[String],
) -> Vec<String> {
    let (head, tail) = match name.split_once('.') {
        Some((head, tail)) => (head, Some(tail)),
        None => (name, None),
    };
    let mut out: Vec<String> = Vec::new();
    let mut push = |qn: String| {
        let qn = match tail {
            Some(tail) => format!("{qn}.{tail}"),
            None => qn,
        };
        if !out.contains(&qn) {
            out.push(qn);
        }
    };

    // `com.acme.Foo` is already qualified.
    if tail.is_some() && head.starts_with(|c: char| c.is_ascii_lowercase()) {
        push(head.to_string());
    }
    for outer in enclosing {
        push(format!("{outer}.{head}"));
    }
    for import in imports {
        if import
            .strip_suffix(head)
            .is_some_and(|prefix| prefix.ends_with('.'))
        {
            push(import.clone());
        }
    }
    match package {
        Some(pkg) => push(format!("{pkg}.{head}")),
        None => push(head.to_string()),
    }
    for import in imports {
        if let Some(pkg) = import.strip_suffix(".*") {
            push(format!("{pkg}.{head}"));
        }
    }
    out
}

/// A parsed annotation: simple name plus element values keyed by element name.
/// A single unnamed value is stored under `value`.
#[derive(Debug, Clone, Default)]
struct Annotation {
    name: String,
    args: BTreeMap<String, Vec<String>>,
}

impl Annotation {
    fn values(&self, keys: &[&str]) -> Vec<String> {
        keys.iter()
            .filter_map(|k| self.args.get(*k))
            .flatten()
            .cloned()
            .collect()
    }

    fn first(&self, keys: &[&str]) -> Option<String> {
        self.values(keys).into_iter().next()
    }
}

/// Route information carried by `@RequestMapping` and the verb shortcuts.
#[derive(Debug, Clone, Default)]
struct RouteMapping {
    methods: Vec<String>,
    paths: Vec<String>,
    produces: Vec<String>,
    consumes: Vec<String>,
}

impl RouteMapping {
    fn from_annotations(annotations: &[Annotation]) -> Option<RouteMapping> {
        let mut found: Option<RouteMapping> = None;
        for a in annotations {
            let verb = match a.name.as_str() {
                "RequestMapping" => None,
                other => match VERB_MAPPINGS.iter().find(|(n, _)| *n == other) {
                    Some((_, verb)) => Some(*verb),
                    None => continue,
                },
            };
            let mapping = found.get_or_insert_with(RouteMapping::default);
            match verb {
                Some(verb) => mapping.methods.push(verb.to_string()),
                None => mapping
                    .methods
                    .extend(a.values(&["method"]).iter().filter_map(|m| normalize_method(m))),
            }
            mapping.paths.extend(a.values(&["value", "path"]));
            mapping
                .produces
                .extend(a.values(&["produces"]).iter().map(|m| media_type(m)));
            mapping
                .consumes
                .extend(a.values(&["consumes"]).iter().map(|m| media_type(m)));
        }
        found.map(|m| RouteMapping {
            methods: dedup(m.methods),
            paths: dedup(m.paths),
            produces: dedup(m.produces),
            consumes: dedup(m.consumes),
        })
    }
}

/// A type whose body is being walked.
struct TypeFrame {
    /// Parent of every member declared in the body.
    id: String,
    qualified_name: String,
    /// Field name -> declared type (generic arguments stripped).
    fields: BTreeMap<String, String>,
    mapping: Option<RouteMapping>,
    cors: Option<serde_json::Value>,
}

struct Extractor<'a> {
    path: &'a str,
    source: &'a [u8],
    package: Option<String>,
    imports: Vec<String>,
    module_id: String,
    scope: Arc<FileScope>,
    types: Vec<TypeFrame>,
    seen: HashSet<String>,
    out: ParseOutput,
}

impl<'a> Extractor<'a> {
    fn new(path: &'a str, source: &'a [u8]) -> Self {
        Self {
            path,
            source,
            package: None,
            imports: Vec::new(),
            module_id: String::new(),
            scope: Arc::new(FileScope::default()),
            types: Vec::new(),
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

    /// Id of the innermost type being walked, or the file's module.
    fn parent_id(&self) -> String {
        self.types
            .last()
            .map(|t| t.id.clone())
            .unwrap_or_else(|| self.module_id.clone())
    }

    /// Push `node` under the current parent unless an earlier declaration in
    /// this file already took its id. The first one wins; the clash is
    /// reported against the file.
    fn push_node(&mut self, node: Node) -> Option<String> {
        if !self.seen.insert(node.id.clone()) {
            let mut diagnostic = Diagnostic::parse_error(
                self.path,
                format!("duplicate declaration of {}", node.qualified_name),
            );
            diagnostic.line = Some(node.span.start_line);
            self.out.diagnostics.push(diagnostic);
            return None;
        }
        let id = node.id.clone();
        let parent = self.parent_id();
        self.out
            .edges
            .push(Edge::new(EdgeKind::Contains, &parent, &id));
        self.out.nodes.push(node);
        Some(id)
    }

    fn compilation_unit(&mut self, root: TsNode) {
        let mut written_imports = Vec::new();
        let mut import_lines = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_declaration" => {
                    let mut c = child.walk();
                    self.package = child
                        .named_children(&mut c)
                        .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
                        .map(|n| self.text(n).to_string());
                }
                "import_declaration" => {
                    let text = self.text(child);
                    let body = text
                        .trim()
                        .trim_start_matches("import")
                        .trim_end_matches(';')
                        .trim();
                    let is_static = body.starts_with("static ");
                    let name: String = body
                        .trim_start_matches("static")
                        .chars()
                        .filter(|c| !c.is_whitespace())
                        .collect();
                    if is_static {
                        written_imports.push(format!("static {name}"));
                    } else {
                        written_imports.push(name.clone());
                        self.imports.push(name);
                        import_lines.push(line_of(child));
                    }
                }
                _ => {}
            }
        }

        let file_name = self.path.rsplit('/').next().unwrap_or(self.path);
        let module = Node::new(
            LanguageKind::Java,
            NodeKind::Module,
            file_name,
            self.path,
            self.path,
            Self::span(root),
        )
        .with_extras(Extras {
            package: self.package.clone(),
            imports: written_imports,
            ..Default::default()
        });
        self.module_id = module.id.clone();
        self.seen.insert(module.id.clone());
        self.out.nodes.push(module);

        for (import, line) in self.imports.iter().zip(import_lines) {
            if import.ends_with(".*") {
                continue;
            }
            self.out.type_refs.push(TypeRef {
                source: self.module_id.clone(),
                kind: EdgeKind::Imports,
                name: import.rsplit('.').next().unwrap_or(import).to_string(),
                candidates: vec![import.clone()],
                file: self.path.to_string(),
                line,
            });
        }

        self.scope = Arc::new(FileScope {
            module: self.module_id.clone(),
            package: self.package.clone(),
            imports: self.imports.clone(),
            aliases: BTreeMap::new(),
        });

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            self.type_declaration(child);
        }
    }

    fn type_declaration(&mut self, decl: TsNode) {
        let kind = match decl.kind() {
            "class_declaration" | "record_declaration" => NodeKind::Class,
            "interface_declaration" => NodeKind::Interface,
            "enum_declaration" => NodeKind::Enum,
            _ => return,
        };
        let Some(name_node) = decl.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let qualified_name = match self.types.last() {
            Some(outer) => format!("{}.{}", outer.qualified_name, name),
            None => match &self.package {
                Some(pkg) => format!("{pkg}.{name}"),
                None => name.clone(),
            },
        };

        let (annotations, modifiers) = self.modifiers(decl);
        let node = Node::new(
            LanguageKind::Java,
            kind,
            &name,
            &qualified_name,
            self.path,
            Self::span(decl),
        )
        .with_extras(Extras {
            annotations: annotations.iter().map(|a| format!("@{}", a.name)).collect(),
            modifiers,
            package: self.package.clone(),
            ..Default::default()
        });
        let slot = self.out.nodes.len();
        // A repeated type would repeat every member id too.
        let Some(id) = self.push_node(node) else {
            return;
        };

        let written = self.out.type_refs.len();
        self.supertypes(decl, &id);
        self.out.nodes[slot].extras.supertypes = self.out.type_refs[written..]
            .iter()
            .map(|r| r.name.clone())
            .collect();

        let cors = cors_of(&annotations);
        self.types.push(TypeFrame {
            id: id.clone(),
            qualified_name,
            fields: BTreeMap::new(),
            mapping: RouteMapping::from_annotations(&annotations),
            cors,
        });

        if decl.kind() == "record_declaration"
            && let Some(components) = decl.child_by_field_name("parameters")
        {
            for param in self.params(components) {
                if let Some(frame) = self.types.last_mut() {
                    frame
                        .fields
                        .insert(param.name.clone(), param.type_name.clone().unwrap_or_default());
                }
            }
        }

        let members = decl
            .child_by_field_name("body")
            .map(body_members)
            .unwrap_or_default();
        for member in &members {
            if matches!(member.kind(), "field_declaration" | "constant_declaration") {
                self.field(*member);
            }
        }
        for member in &members {
            match member.kind() {
                "method_declaration" | "constructor_declaration" => self.method(*member, &name),
                _ => self.type_declaration(*member),
            }
        }

        if let Some(frame) = self.types.pop() {
            self.out.nodes[slot].extras.fields = frame.fields;
        }
    }

    fn supertypes(&mut self, decl: TsNode, id: &str) {
        let enclosing: Vec<String> = self
            .types
            .iter()
            .rev()
            .map(|t| t.qualified_name.clone())
            .collect();
        let mut refs: Vec<(EdgeKind, TsNode)> = Vec::new();
        let mut cursor = decl.walk();
        for child in decl.named_children(&mut cursor) {
            let kind = match (decl.kind(), child.kind()) {
                (_, "superclass") => EdgeKind::Inherits,
                ("interface_declaration", "extends_interfaces") => EdgeKind::Inherits,
                (_, "super_interfaces") => EdgeKind::Implements,
                _ => continue,
            };
            let mut c = child.walk();
            for ty in child.named_children(&mut c) {
                if ty.kind() == "type_list" {
                    let mut tc = ty.walk();
                    refs.extend(ty.named_children(&mut tc).map(|t| (kind, t)));
                } else {
                    refs.push((kind, ty));
                }
            }
        }
        for (kind, ty) in refs {
            let name = base_type_name(ty, self.source);
            if name.is_empty() {
                continue;
            }
            let candidates =
                type_candidates(&name, self.package.as_deref(), &self.imports, &enclosing);
            self.out.type_refs.push(TypeRef {
                source: id.to_string(),
                kind,
                name,
                candidates,
                file: self.path.to_string(),
                line: line_of(ty),
            });
        }
    }

    fn field(&mut self, decl: TsNode) {
        let Some(frame) = self.types.last() else {
            return;
        };
        let owner_qn = frame.qualified_name.clone();
        let (annotations, modifiers) = self.modifiers(decl);
        let declared = decl.child_by_field_name("type");
        let type_text = declared.map(|t| squash(self.text(t))).unwrap_or_default();
        let type_name = declared
            .map(|t| base_type_name(t, self.source))
            .unwrap_or_default();

        let mut cursor = decl.walk();
        let declarators: Vec<TsNode> = decl
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            let name = self.text(name_node).to_string();
            let mut extras = Extras {
                annotations: annotations.iter().map(|a| format!("@{}", a.name)).collect(),
                modifiers: modifiers.clone(),
                ..Default::default()
            };
            let dims = declarator
                .child_by_field_name("dimensions")
                .map(|d| squash(self.text(d)))
                .unwrap_or_default();
            extras.other.insert(
                "type".into(),
                serde_json::Value::String(format!("{type_text}{dims}")),
            );
            let node = Node::new(
                LanguageKind::Java,
                NodeKind::Field,
                &name,
                format!("{owner_qn}.{name}"),
                self.path,
                Self::span(decl),
            )
            .with_extras(extras);
            if self.push_node(node).is_none() {
                continue;
            }
            if let Some(frame) = self.types.last_mut() {
                frame.fields.insert(name, type_name.clone());
            }
        }
    }

    fn method(&mut self, decl: TsNode, owner_name: &str) {
        let Some(frame) = self.types.last() else {
            return;
        };
        let owner_qn = frame.qualified_name.clone();
        let owner_id = frame.id.clone();
        let constructor = decl.kind() == "constructor_declaration";
        let name = match decl.child_by_field_name("name") {
            Some(n) => self.text(n).to_string(),
            None if constructor => owner_name.to_string(),
            None => return,
        };
        let (annotations, modifiers) = self.modifiers(decl);
        let formals = decl.child_by_field_name("parameters");
        let params = formals.map(|f| self.params(f)).unwrap_or_default();
        let param_types: Vec<String> = params
            .iter()
            .map(|p| p.type_name.clone().unwrap_or_else(|| "var".into()))
            .collect();
        let qualified_name = format!("{owner_qn}.{name}({})", param_types.join(","));

        let http = self.route(&annotations, formals, &params);
        let mut extras = Extras {
            signature: Some(Signature {
                params: params.clone(),
                returns: decl
                    .child_by_field_name("type")
                    .map(|t| squash(self.text(t))),
                constructor,
            }),
            annotations: annotations.iter().map(|a| format!("@{}", a.name)).collect(),
            modifiers,
            ..Default::default()
        };
        if http.is_some() {
            let cors = cors_of(&annotations).or_else(|| self.types.last().and_then(|t| t.cors.clone()));
            if let Some(cors) = cors {
                extras.other.insert("cors".into(), cors);
            }
        }
        extras.http = http;

        let node = Node::new(
            LanguageKind::Java,
            NodeKind::Method,
            &name,
            &qualified_name,
            self.path,
            Self::span(decl),
        )
        .with_extras(extras);
        let Some(id) = self.push_node(node) else {
            return;
        };

        if let Some(body) = decl.child_by_field_name("body") {
            self.call_sites(body, &id, &owner_id, &params);
        }
    }

    fn params(&self, formals: TsNode) -> Vec<Param> {
        let mut params = Vec::new();
        let mut cursor = formals.walk();
        for p in formals.named_children(&mut cursor) {
            let (type_node, name_node, variadic) = match p.kind() {
                "formal_parameter" => (
                    p.child_by_field_name("type"),
                    p.child_by_field_name("name"),
                    false,
                ),
                "spread_parameter" => {
                    let mut c = p.walk();
                    let children: Vec<TsNode> = p.named_children(&mut c).collect();
                    let ty = children
                        .iter()
                        .find(|n| !matches!(n.kind(), "modifiers" | "variable_declarator"))
                        .copied();
                    let name = children
                        .iter()
                        .find(|n| n.kind() == "variable_declarator")
                        .and_then(|d| d.child_by_field_name("name"));
                    (ty, name, true)
                }
                _ => continue,
            };
            let Some(name_node) = name_node else {
                continue;
            };
            let mut type_name = type_node.map(|t| squash(self.text(t)));
            // C-style `int a[]` carries its dimensions on the name.
            if let Some(dims) = p.child_by_field_name("dimensions") {
                let dims = squash(self.text(dims));
                type_name = type_name.map(|t| format!("{t}{dims}"));
            }
            if variadic {
                type_name = type_name.map(|t| format!("{t}..."));
            }
            params.push(Param {
                name: self.text(name_node).to_string(),
                type_name,
                has_default: false,
                variadic,
            });
        }
        params
    }

    /// Route metadata of a handler method, merged with its class-level mapping.
    fn route(
        &self,
        annotations: &[Annotation],
        formals: Option<TsNode>,
        params: &[Param],
    ) -> Option<HttpMetadata> {
        let own = RouteMapping::from_annotations(annotations)?;
        let class = self.types.last().and_then(|t| t.mapping.clone()).unwrap_or_default();

        let mut paths = combine_paths(&class.paths, &own.paths);
        if paths.is_empty() {
            paths.push("/".into());
        }
        let methods = if own.methods.is_empty() {
            class.methods
        } else {
            own.methods
        };
        let mut http = build_metadata(&methods, &paths, "spring")?;
        http.produces = if own.produces.is_empty() {
            class.produces
        } else {
            own.produces
        };
        http.consumes = if own.consumes.is_empty() {
            class.consumes
        } else {
            own.consumes
        };

        let mut path_vars = std::mem::take(&mut http.path_vars);
        if let Some(formals) = formals {
            let mut cursor = formals.walk();
            let declared = formals
                .named_children(&mut cursor)
                .filter(|p| matches!(p.kind(), "formal_parameter" | "spread_parameter"));
            for (param_node, param) in declared.zip(params) {
                let (param_annotations, _) = self.modifiers(param_node);
                for a in &param_annotations {
                    let bound = a
                        .first(&["value", "name"])
                        .unwrap_or_else(|| param.name.clone());
                    match a.name.as_str() {
                        "PathVariable" => path_vars.push(bound),
                        "RequestParam" => http.query_params.push(bound),
                        "RequestHeader" => http.header_params.push(bound),
                        "CookieValue" => http.cookie_params.push(bound),
                        "RequestBody" => http.body_params.push(param.name.clone()),
                        _ => {}
                    }
                }
            }
        }
        http.path_vars = dedup(path_vars);
        http.response_status = annotations
            .iter()
            .find(|a| a.name == "ResponseStatus")
            .and_then(|a| a.first(&["value", "code"]));
        Some(http)
    }

    fn call_sites(&mut self, body: TsNode, caller_id: &str, owner_id: &str, params: &[Param]) {
        let mut locals: HashMap<String, String> = params
            .iter()
            .filter_map(|p| {
                let ty = p.type_name.as_deref()?.trim_end_matches("...");
                Some((p.name.clone(), strip_generics(ty)))
            })
            .collect();
        collect_locals(body, self.source, &mut locals);

        let query = calls_query();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, body, self.source);
        let mut sites = Vec::new();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let call = capture.node;
                let Some(name_node) = call.child_by_field_name("name") else {
                    continue;
                };
                let (receiver, receiver_type) = match call.child_by_field_name("object") {
                    None => (None, None),
                    Some(obj) => self.receiver(obj, &locals),
                };
                let arg_count = call
                    .child_by_field_name("arguments")
                    .map(|args| {
                        let mut c = args.walk();
                        args.named_children(&mut c).filter(|n| !n.is_extra()).count()
                    })
                    .unwrap_or(0);
                sites.push(CallSite {
                    caller: caller_id.to_string(),
                    enclosing_type: Some(owner_id.to_string()),
                    callee: self.text(name_node).to_string(),
                    receiver,
                    receiver_type,
                    arg_count,
                    file: self.path.to_string(),
                    line: line_of(call),
                    language: LanguageKind::Java,
                    scope: Arc::clone(&self.scope),
                });
            }
        }
        self.out.call_sites.extend(sites);
    }

    fn receiver(
        &self,
        obj: TsNode,
        locals: &HashMap<String, String>,
    ) -> (Option<String>, Option<String>) {
        let text = self.text(obj);
        match obj.kind() {
            "this" | "super" => (Some(text.to_string()), None),
            "identifier" => {
                let ty = locals.get(text).cloned().or_else(|| self.field_type(text));
                (Some(text.to_string()), ty)
            }
            "field_access" => {
                let target = obj.child_by_field_name("object").map(|o| o.kind());
                let field = obj.child_by_field_name("field").map(|f| self.text(f));
                match (target, field) {
                    (Some("this"), Some(field)) => {
                        (Some(format!("this.{field}")), self.field_type(field))
                    }
                    _ => (Some(squash(text)), None),
                }
            }
            _ => (Some(squash(text)), None),
        }
    }

    /// Declared type of a field visible from the current type (innermost first).
    fn field_type(&self, name: &str) -> Option<String> {
        self.types
            .iter()
            .rev()
            .find_map(|t| t.fields.get(name))
            .filter(|t| !t.is_empty())
            .cloned()
    }

    /// Annotations and keyword modifiers attached to a declaration.
    fn modifiers(&self, decl: TsNode) -> (Vec<Annotation>, Vec<String>) {
        let mut annotations = Vec::new();
        let mut modifiers = Vec::new();
        let mut cursor = decl.walk();
        let Some(mods) = decl.children(&mut cursor).find(|c| c.kind() == "modifiers") else {
            return (annotations, modifiers);
        };
        let mut c = mods.walk();
        for m in mods.children(&mut c) {
            match m.kind() {
                "annotation" | "marker_annotation" => annotations.push(self.annotation(m)),
                _ if m.is_extra() => {}
                _ => modifiers.push(self.text(m).to_string()),
            }
        }
        (annotations, modifiers)
    }

    fn annotation(&self, node: TsNode) -> Annotation {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or("");
        let mut annotation = Annotation {
            name: name.rsplit('.').next().unwrap_or(name).to_string(),
            args: BTreeMap::new(),
        };
        let Some(arguments) = node.child_by_field_name("arguments") else {
            return annotation;
        };
        let mut cursor = arguments.walk();
        for arg in arguments.named_children(&mut cursor) {
            if arg.is_extra() {
                continue;
            }
            if arg.kind() == "element_value_pair" {
                let key = arg.child_by_field_name("key").map(|k| self.text(k));
                let value = arg.child_by_field_name("value");
                if let (Some(key), Some(value)) = (key, value) {
                    annotation
                        .args
                        .insert(key.to_string(), self.element_values(value));
                }
            } else {
                annotation
                    .args
                    .insert("value".into(), self.element_values(arg));
            }
        }
        annotation
    }

    fn element_values(&self, node: TsNode) -> Vec<String> {
        match node.kind() {
            "string_literal" => vec![unquote(self.text(node))],
            "element_value_array_initializer" => {
                let mut cursor = node.walk();
                let values: Vec<String> = node
                    .named_children(&mut cursor)
                    .filter(|n| !n.is_extra())
                    .flat_map(|n| self.element_values(n))
                    .collect();
                dedup(values)
            }
            _ => vec![squash(self.text(node))],
        }
    }
}

/// Member declarations of a class, interface, enum or record body.
fn body_members(body: TsNode) -> Vec<TsNode> {
    let mut members = Vec::new();
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        if child.kind() == "enum_body_declarations" {
            let mut c = child.walk();
            members.extend(child.named_children(&mut c));
        } else {
            members.push(child);
        }
    }
    members
}

fn cors_of(annotations: &[Annotation]) -> Option<serde_json::Value> {
    let cors = annotations.iter().find(|a| a.name == "CrossOrigin")?;
    let map: serde_json::Map<String, serde_json::Value> = cors
        .args
        .iter()
        .map(|(k, v)| {
            let key = if k == "value" { "origins".to_string() } else { k.clone() };
            (key, serde_json::json!(v))
        })
        .collect();
    Some(serde_json::Value::Object(map))
}

fn collect_locals(node: TsNode, source: &[u8], locals: &mut HashMap<String, String>) {
    match node.kind() {
        "local_variable_declaration" => {
            let declared = node
                .child_by_field_name("type")
                .map(|t| base_type_name(t, source))
                .filter(|t| t != "var");
            let mut cursor = node.walk();
            for declarator in node.children_by_field_name("declarator", &mut cursor) {
                let Some(name) = declarator.child_by_field_name("name") else {
                    continue;
                };
                let inferred = declarator
                    .child_by_field_name("value")
                    .filter(|v| v.kind() == "object_creation_expression")
                    .and_then(|v| v.child_by_field_name("type"))
                    .map(|t| base_type_name(t, source));
                if let Some(ty) = declared.clone().or(inferred) {
                    locals.insert(node_text(name, source).to_string(), ty);
                }
            }
        }
        "enhanced_for_statement" => {
            let ty = node.child_by_field_name("type");
            let name = node.child_by_field_name("name");
            if let (Some(ty), Some(name)) = (ty, name) {
                let ty = base_type_name(ty, source);
                if ty != "var" {
                    locals.insert(node_text(name, source).to_string(), ty);
                }
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_locals(child, source, locals);
    }
}

/// Type name with generic arguments and array brackets removed: `List<Foo>[]` -> `List`.
fn base_type_name(node: TsNode, source: &[u8]) -> String {
    strip_generics(node_text(node, source))
}

fn strip_generics(raw: &str) -> String {
    let head = raw.split('<').next().unwrap_or(raw);
    let mut name = squash(head);
    while let Some(stripped) = name.strip_suffix("[]") {
        name = stripped.to_string();
    }
    name
}

/// Remove all whitespace so ids do not depend on formatting.
fn squash(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str, src: &str) -> ParseOutput {
        JavaFrontEnd.parse(path, src).expect("parse should succeed")
    }

    fn node<'a>(out: &'a ParseOutput, qualified_name: &str) -> &'a Node {
        out.nodes
            .iter()
            .find(|n| n.qualified_name == qualified_name)
            .unwrap_or_else(|| panic!("no node {qualified_name}"))
    }

    #[test]
    fn test_declarations_and_containment() {
        let src = r#"
package com.acme.shop;

import java.util.List;
import com.acme.base.BaseService;

public class ProductService extends BaseService implements Auditable {
    private ProductRepository repo;
    private List<String> tags;

    public ProductService(ProductRepository repo) { this.repo = repo; }

    public Product find(String id, int depth) { return repo.findById(id); }

    static class Cache {}
}
"#;
        let out = parse("src/ProductService.java", src);
        let class = node(&out, "com.acme.shop.ProductService");
        assert_eq!(class.kind, NodeKind::Class);
        assert_eq!(class.extras.fields.get("repo").map(String::as_str), Some("ProductRepository"));
        assert_eq!(class.extras.fields.get("tags").map(String::as_str), Some("List"));

        let find = node(&out, "com.acme.shop.ProductService.find(String,int)");
        assert_eq!(find.kind, NodeKind::Method);
        assert_eq!(find.arity(), 2);
        let ctor = node(&out, "com.acme.shop.ProductService.ProductService(ProductRepository)");
        assert!(ctor.extras.signature.as_ref().unwrap().constructor);
        node(&out, "com.acme.shop.ProductService.Cache");
        node(&out, "com.acme.shop.ProductService.repo");

        assert!(out.edges.iter().all(|e| e.kind == EdgeKind::Contains));
        assert!(
            out.edges
                .iter()
                .any(|e| e.source == class.id && e.target == find.id)
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_supertype_refs_carry_candidates() {
        let src = r#"
package com.acme.shop;
import com.acme.base.BaseService;
import com.acme.audit.*;
public class ProductService extends BaseService implements Auditable, Comparable<ProductService> {}
interface Store extends Readable {}
"#;
        let out = parse("ProductService.java", src);
        let inherits: Vec<&TypeRef> = out
            .type_refs
            .iter()
            .filter(|r| r.kind == EdgeKind::Inherits)
            .collect();
        assert_eq!(inherits.len(), 2);
        assert_eq!(inherits[0].name, "BaseService");
        assert_eq!(inherits[0].candidates[0], "com.acme.base.BaseService");
        assert_eq!(inherits[1].name, "Readable");
        let class = node(&out, "com.acme.shop.ProductService");
        assert_eq!(class.extras.supertypes, vec!["BaseService", "Auditable", "Comparable"]);

        let implements: Vec<&TypeRef> = out
            .type_refs
            .iter()
            .filter(|r| r.kind == EdgeKind::Implements)
            .collect();
        assert_eq!(implements.len(), 2);
        assert_eq!(
            implements[0].candidates,
            vec!["com.acme.shop.Auditable", "com.acme.audit.Auditable"]
        );
        assert_eq!(implements[1].name, "Comparable");

        let imports: Vec<&TypeRef> = out
            .type_refs
            .iter()
            .filter(|r| r.kind == EdgeKind::Imports)
            .collect();
        assert_eq!(imports.len(), 1, "on-demand imports produce no reference");
    }

    #[test]
    fn test_spring_routes() {
        let src = r#"
package com.acme.web;

@RestController
@RequestMapping(value = "/api", produces = MediaType.APPLICATION_JSON_VALUE)
public class ProductController {

    @GetMapping("/updatingProduct/{productId}")
    public Product get(@PathVariable("productId") String id, @RequestParam String expand) { return null; }

    @RequestMapping(path = {"/a", "/b"}, method = {RequestMethod.POST, RequestMethod.PUT}, consumes = "text/plain")
    @ResponseStatus(HttpStatus.CREATED)
    public void save(@RequestBody Product body, @RequestHeader("X-Trace") String trace) {}

    @RequestMapping("/any")
    public void any() {}

    public void helper() {}
}
"#;
        let out = parse("ProductController.java", src);
        let get = node(&out, "com.acme.web.ProductController.get(String,String)");
        let http = get.extras.http.as_ref().expect("GET mapping");
        assert_eq!(http.method, "GET");
        assert_eq!(http.path, "/api/updatingProduct/{productId}");
        assert_eq!(http.produces, vec!["application/json"]);
        assert_eq!(http.path_vars, vec!["productId"]);
        assert_eq!(http.query_params, vec!["expand"]);
        assert_eq!(http.framework.as_deref(), Some("spring"));

        let save = node(&out, "com.acme.web.ProductController.save(Product,String)");
        let http = save.extras.http.as_ref().expect("request mapping");
        assert_eq!(http.method, "POST");
        assert_eq!(http.path, "/api/a");
        let extra: Vec<(&str, &str)> = http.routes().skip(1).collect();
        assert_eq!(extra, vec![("POST", "/api/b"), ("PUT", "/api/a"), ("PUT", "/api/b")]);
        assert_eq!(http.consumes, vec!["text/plain"]);
        assert_eq!(http.body_params, vec!["body"]);
        assert_eq!(http.header_params, vec!["X-Trace"]);
        assert_eq!(http.response_status.as_deref(), Some("HttpStatus.CREATED"));
        assert!(http.path_vars.is_empty());

        let any = node(&out, "com.acme.web.ProductController.any()");
        assert_eq!(any.extras.http.as_ref().unwrap().method, "ANY");
        assert!(node(&out, "com.acme.web.ProductController.helper()").extras.http.is_none());
    }

    #[test]
    fn test_call_sites_record_receiver_types() {
        let src = r#"
package app;
class Service {
    private Repo repo;
    void run(Helper helper) {
        save(1);
        this.repo.load("k");
        helper.assist();
        Store s = new Store();
        s.put(1, 2);
        super.close();
        Util.compute();
    }
}
"#;
        let out = parse("app/Service.java", src);
        let by_callee = |name: &str| {
            out.call_sites
                .iter()
                .find(|c| c.callee == name)
                .unwrap_or_else(|| panic!("no call to {name}"))
        };
        let save = by_callee("save");
        assert_eq!(save.receiver, None);
        assert_eq!(save.arg_count, 1);
        assert_eq!(save.line, 6);
        assert_eq!(by_callee("load").receiver_type.as_deref(), Some("Repo"));
        assert_eq!(by_callee("assist").receiver_type.as_deref(), Some("Helper"));
        assert_eq!(by_callee("put").receiver_type.as_deref(), Some("Store"));
        assert_eq!(by_callee("put").arg_count, 2);
        assert_eq!(by_callee("close").receiver.as_deref(), Some("super"));
        let compute = by_callee("compute");
        assert_eq!(compute.receiver.as_deref(), Some("Util"));
        assert_eq!(compute.receiver_type, None);
        assert_eq!(compute.scope.package.as_deref(), Some("app"));
    }

    #[test]
    fn test_syntax_error_yields_partial_output() {
        let src = "package p;\nclass Ok { void a() {} }\nclass Broken { void b( { }\n";
        let out = parse("p/Broken.java", src);
        assert!(out.nodes.iter().any(|n| n.qualified_name == "p.Ok"));
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].names_file("p/Broken.java"));
    }

    #[test]
    fn test_array_declarators_and_repeated_members() {
        let src = r#"
package p;
class Arrays {
    int counts[];
    static int sum(int a[]) { return 0; }
    static int sum(int a) { return a; }
    static int sum(int[] a) { return 1; }
}
"#;
        let out = parse("p/Arrays.java", src);
        let array = node(&out, "p.Arrays.sum(int[])");
        assert_eq!(array.span.start_line, 5);
        node(&out, "p.Arrays.sum(int)");
        let field = node(&out, "p.Arrays.counts");
        assert_eq!(field.extras.other["type"], "int[]");

        let sums = out.nodes.iter().filter(|n| n.name == "sum").count();
        assert_eq!(sums, 2);
        let contains = out
            .edges
            .iter()
            .filter(|e| e.target == array.id)
            .count();
        assert_eq!(contains, 1);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].line, Some(7));
        assert!(out.diagnostics[0].message.contains("p.Arrays.sum(int[])"));
    }

    #[test]
    fn test_type_candidates_order() {
        let imports = vec!["x.y.Thing".to_string(), "z.*".to_string()];
        let got = type_candidates("Thing", Some("p"), &imports, &["p.Outer".to_string()]);
        assert_eq!(got, vec!["p.Outer.Thing", "x.y.Thing", "p.Thing", "z.Thing"]);
        let qualified = type_candidates("com.q.Other", Some("p"), &[], &[]);
        assert_eq!(qualified[0], "com.q.Other");
    }
}
