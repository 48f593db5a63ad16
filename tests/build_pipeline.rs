//! End-to-end builds over small Java and Python trees written to a temp dir,
//! plus builds with injected front-end doubles.

use std::fs;
use std::path::Path;

use codeprop::diagnostics::count_kind;
use codeprop::graph::edge::{Edge, EdgeKind, Resolution};
use codeprop::graph::node::{Node, NodeKind, Span};
use codeprop::{
    BuildConfig, BuildError, DiagnosticKind, FrontEnd, GraphBuilder, LanguageKind,
    LanguageRegistry, ParseOutput, build_graph,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn java_shop() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "src/shop/BaseController.java",
        r#"package shop;

public abstract class BaseController {
    protected String render(String view) {
        return view;
    }

    public void audit() {
    }
}
"#,
    );
    write(
        dir.path(),
        "src/shop/ProductService.java",
        r#"package shop;

public class ProductService {
    public void touch(long id) {
    }

    public void save(String body) {
    }
}
"#,
    );
    write(
        dir.path(),
        "src/shop/ProductController.java",
        r#"package shop;

import org.springframework.http.MediaType;
import org.springframework.web.bind.annotation.*;

@RestController
@RequestMapping("/api")
public class ProductController extends BaseController {
    private final ProductService service;

    public ProductController(ProductService service) {
        this.service = service;
    }

    @GetMapping(value = "/updatingProduct/{productId}", produces = "application/json")
    public String update(@PathVariable("productId") long productId) {
        service.touch(productId);
        audit();
        return render("product");
    }

    @PostMapping(path = "/products", consumes = MediaType.APPLICATION_JSON_VALUE)
    public void create(@RequestBody String body) {
        this.service.save(body);
    }

    @Override
    public void audit() {
    }
}
"#,
    );
    dir
}

fn python_app() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "app/__init__.py", "");
    write(
        dir.path(),
        "app/models.py",
        r#"class Repository:
    def save(self, item):
        return item


class UserRepository(Repository):
    def save(self, item):
        return super().save(item)
"#,
    );
    write(
        dir.path(),
        "app/views.py",
        r#"from flask import Flask
from app.models import UserRepository

app = Flask(__name__)


@app.route("/users/<int:user_id>", methods=["GET", "POST"])
def user_detail(user_id):
    repo = UserRepository()
    return repo.save(user_id)
"#,
    );
    dir
}

fn id(language: &str, kind: &str, file: &str, qn: &str) -> String {
    format!("{language}:{kind}:{file}#{qn}")
}

fn has(edges: &[Edge], kind: EdgeKind, source: &str, target: &str) -> bool {
    edges
        .iter()
        .any(|e| e.kind == kind && e.source == source && e.target == target)
}

// ---------------------------------------------------------------------------
// Real front ends
// ---------------------------------------------------------------------------

#[test]
fn test_java_declarations_and_relationships() {
    let dir = java_shop();
    let out = build_graph(dir.path()).unwrap();
    let graph = &out.graph;
    let edges = graph.edges();

    let controller = id("java", "class", "src/shop/ProductController.java", "shop.ProductController");
    let base = id("java", "class", "src/shop/BaseController.java", "shop.BaseController");
    assert!(graph.node(&controller).is_some());
    assert!(has(&edges, EdgeKind::Inherits, &controller, &base));

    let audit_sub = id(
        "java",
        "method",
        "src/shop/ProductController.java",
        "shop.ProductController.audit()",
    );
    let audit_base = id("java", "method", "src/shop/BaseController.java", "shop.BaseController.audit()");
    assert!(has(&edges, EdgeKind::Overrides, &audit_sub, &audit_base));
    assert_eq!(graph.edges_by_kind().get(&EdgeKind::Overrides), Some(&1));

    assert_eq!(out.stats.files_parsed, 3);
    assert_eq!(count_kind(&out.diagnostics, DiagnosticKind::ParseError), 0);
}

#[test]
fn test_java_spring_routes() {
    let dir = java_shop();
    let out = build_graph(dir.path()).unwrap();

    let update = out
        .graph
        .node(&id(
            "java",
            "method",
            "src/shop/ProductController.java",
            "shop.ProductController.update(long)",
        ))
        .unwrap();
    let http = update.extras.http.as_ref().unwrap();
    assert_eq!(http.method, "GET");
    assert_eq!(http.path, "/api/updatingProduct/{productId}");
    assert_eq!(http.produces, vec!["application/json"]);
    assert_eq!(http.path_vars, vec!["productId"]);

    let create = out
        .graph
        .node(&id(
            "java",
            "method",
            "src/shop/ProductController.java",
            "shop.ProductController.create(String)",
        ))
        .unwrap();
    let http = create.extras.http.as_ref().unwrap();
    assert_eq!(http.method, "POST");
    assert_eq!(http.path, "/api/products");
    assert_eq!(http.consumes, vec!["application/json"]);
    assert_eq!(http.body_params, vec!["body"]);
    assert!(http.path_vars.is_empty());
}

#[test]
fn test_java_call_resolution() {
    let dir = java_shop();
    let out = build_graph(dir.path()).unwrap();
    let edges = out.graph.edges();
    let file = "src/shop/ProductController.java";
    let update = id("java", "method", file, "shop.ProductController.update(long)");

    let calls: Vec<&Edge> = edges
        .iter()
        .filter(|e| e.kind == EdgeKind::Calls && e.source == update)
        .collect();
    let target_of = |qn_suffix: &str| {
        calls
            .iter()
            .find(|e| e.target.ends_with(qn_suffix))
            .unwrap_or_else(|| panic!("no call to {qn_suffix}: {calls:?}"))
    };

    // Field receiver typed by its declaration.
    let touch = target_of("#shop.ProductService.touch(long)");
    assert_eq!(touch.metadata.resolution, Some(Resolution::Hierarchy));
    // Unqualified call found on the caller's own class.
    let audit = target_of("#shop.ProductController.audit()");
    assert_eq!(audit.metadata.resolution, Some(Resolution::Scope));
    assert_eq!(audit.metadata.line, Some(18));
    // Inherited helper.
    let render = target_of("#shop.BaseController.render(String)");
    assert_eq!(render.metadata.resolution, Some(Resolution::Hierarchy));

    let create = id("java", "method", file, "shop.ProductController.create(String)");
    assert!(has(
        &edges,
        EdgeKind::Calls,
        &create,
        &id("java", "method", "src/shop/ProductService.java", "shop.ProductService.save(String)"),
    ));
}

#[test]
fn test_python_classes_routes_and_calls() {
    let dir = python_app();
    let out = build_graph(dir.path()).unwrap();
    let graph = &out.graph;
    let edges = graph.edges();

    let repo = id("python", "class", "app/models.py", "app.models.Repository");
    let user_repo = id("python", "class", "app/models.py", "app.models.UserRepository");
    assert!(has(&edges, EdgeKind::Inherits, &user_repo, &repo));

    let save = id("python", "method", "app/models.py", "app.models.Repository.save");
    let user_save = id("python", "method", "app/models.py", "app.models.UserRepository.save");
    assert!(has(&edges, EdgeKind::Overrides, &user_save, &save));
    assert_eq!(graph.node(&user_save).unwrap().arity(), 1);
    // super().save(item)
    assert!(has(&edges, EdgeKind::Calls, &user_save, &save));

    let detail = id("python", "function", "app/views.py", "app.views.user_detail");
    let node = graph.node(&detail).unwrap();
    let http = node.extras.http.as_ref().unwrap();
    assert_eq!(http.method, "GET");
    assert_eq!(http.path, "/users/<int:user_id>");
    assert_eq!(http.path_vars, vec!["user_id"]);
    assert_eq!(http.additional_routes.len(), 1);
    assert_eq!(http.additional_routes[0].method, "POST");
    assert_eq!(http.framework.as_deref(), Some("flask"));

    // repo = UserRepository(); repo.save(...)
    assert!(has(&edges, EdgeKind::Calls, &detail, &user_save));
}

#[test]
fn test_syntax_error_does_not_stop_other_files() {
    let dir = java_shop();
    write(dir.path(), "src/shop/Broken.java", "package shop;\npublic class Broken {\n  void f( {\n}\n");
    let out = build_graph(dir.path()).unwrap();

    let parse_errors: Vec<_> = out
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::ParseError)
        .collect();
    assert_eq!(parse_errors.len(), 1);
    assert!(parse_errors[0].names_file("src/shop/Broken.java"));
    assert!(out.graph.node(&id("java", "class", "src/shop/ProductController.java", "shop.ProductController")).is_some());
}

#[test]
fn test_repeated_java_declarations_do_not_stop_other_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "p/Good.java", "package p;\npublic class Good {\n    void ok() {}\n}\n");
    write(
        dir.path(),
        "p/Arrays.java",
        "package p;\nclass Arrays {\n    static int sum(int a[]) { return 0; }\n    static int sum(int a) { return a; }\n}\n",
    );
    write(
        dir.path(),
        "p/Dup.java",
        "package p;\nclass Dup {\n    void run() {}\n    void run() {}\n}\n",
    );
    let out = build_graph(dir.path()).unwrap();

    assert_eq!(out.stats.files_parsed, 3);
    assert!(out.graph.node(&id("java", "method", "p/Good.java", "p.Good.ok()")).is_some());
    // Array declarators keep their dimensions, so both overloads survive.
    assert!(out.graph.node(&id("java", "method", "p/Arrays.java", "p.Arrays.sum(int[])")).is_some());
    assert!(out.graph.node(&id("java", "method", "p/Arrays.java", "p.Arrays.sum(int)")).is_some());

    let run = id("java", "method", "p/Dup.java", "p.Dup.run()");
    let node = out.graph.node(&run).unwrap();
    assert_eq!(node.span.start_line, 3, "first declaration wins");
    let repeated: Vec<_> = out
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::ParseError)
        .collect();
    assert_eq!(repeated.len(), 1);
    assert!(repeated[0].names_file("p/Dup.java"));
    assert_eq!(repeated[0].line, Some(4));
    assert!(repeated[0].message.contains("p.Dup.run()"));
}

#[test]
fn test_mixed_languages_and_config_exclude() {
    let dir = java_shop();
    write(dir.path(), "scripts/tool.py", "def main():\n    pass\n");
    write(dir.path(), "codeprop.toml", "exclude = [\"scripts\"]\n");
    let out = build_graph(dir.path()).unwrap();
    assert!(out.graph.nodes().all(|n| n.language == LanguageKind::Java));

    fs::remove_file(dir.path().join("codeprop.toml")).unwrap();
    let out = build_graph(dir.path()).unwrap();
    assert_eq!(out.graph.languages(), vec![LanguageKind::Java, LanguageKind::Python]);
}

#[test]
fn test_repository_without_sources() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "docs/readme.md", "# docs");
    let out = build_graph(dir.path()).unwrap();
    assert_eq!(out.graph.node_count(), 0);
    assert_eq!(out.graph.edge_count(), 0);
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].kind, DiagnosticKind::NoFilesProcessed);
}

#[test]
fn test_bad_roots() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        build_graph(&dir.path().join("missing")),
        Err(BuildError::RootNotFound(_))
    ));
    write(dir.path(), "file.java", "class A {}");
    assert!(matches!(
        build_graph(&dir.path().join("file.java")),
        Err(BuildError::RootNotDirectory(_))
    ));
}

#[test]
fn test_build_is_deterministic() {
    let dir = java_shop();
    let first = build_graph(dir.path()).unwrap();
    let second = build_graph(dir.path()).unwrap();
    let ids = |g: &codeprop::CodeGraph| g.nodes().map(|n| n.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first.graph), ids(&second.graph));
    assert_eq!(first.graph.edges(), second.graph.edges());
}

// ---------------------------------------------------------------------------
// Front-end doubles
// ---------------------------------------------------------------------------

/// Claims `.fake` files. One module node per file; `FAIL` in the contents
/// makes it return an error, `PANIC` makes it panic.
struct FakeFrontEnd;

impl FrontEnd for FakeFrontEnd {
    fn language(&self) -> LanguageKind {
        LanguageKind::Java
    }

    fn handles(&self, path: &Path, _head: &str) -> bool {
        path.extension().is_some_and(|e| e == "fake")
    }

    fn parse(&self, path: &str, contents: &str) -> anyhow::Result<ParseOutput> {
        if contents.contains("PANIC") {
            panic!("fake front end blew up on {path}");
        }
        if contents.contains("FAIL") {
            anyhow::bail!("cannot parse {path}");
        }
        let node = Node::new(LanguageKind::Java, NodeKind::Module, path, path, path, Span::new(1, 1));
        Ok(ParseOutput {
            nodes: vec![node],
            ..Default::default()
        })
    }
}

/// Emits the same node id for every file.
struct CollidingFrontEnd;

impl FrontEnd for CollidingFrontEnd {
    fn language(&self) -> LanguageKind {
        LanguageKind::Java
    }

    fn parse(&self, path: &str, _contents: &str) -> anyhow::Result<ParseOutput> {
        let mut node = Node::new(LanguageKind::Java, NodeKind::Class, "Same", "Same", path, Span::new(1, 1));
        node.id = "java:class:Same".into();
        Ok(ParseOutput {
            nodes: vec![node],
            ..Default::default()
        })
    }
}

/// Emits the same method twice in every file.
struct RepeatingFrontEnd;

impl FrontEnd for RepeatingFrontEnd {
    fn language(&self) -> LanguageKind {
        LanguageKind::Java
    }

    fn parse(&self, path: &str, _contents: &str) -> anyhow::Result<ParseOutput> {
        let module = Node::new(LanguageKind::Java, NodeKind::Module, path, path, path, Span::new(1, 3));
        let first = Node::new(LanguageKind::Java, NodeKind::Method, "run", "Dup.run()", path, Span::new(1, 1));
        let second = Node::new(LanguageKind::Java, NodeKind::Method, "run", "Dup.run()", path, Span::new(2, 2));
        let edges = vec![
            Edge::new(EdgeKind::Contains, &module.id, &first.id),
            Edge::new(EdgeKind::Contains, &module.id, &second.id),
        ];
        Ok(ParseOutput {
            nodes: vec![module, first, second],
            edges,
            ..Default::default()
        })
    }
}

/// Emits a `contains` edge to a node it never declares.
struct DanglingFrontEnd;

impl FrontEnd for DanglingFrontEnd {
    fn language(&self) -> LanguageKind {
        LanguageKind::Java
    }

    fn parse(&self, path: &str, _contents: &str) -> anyhow::Result<ParseOutput> {
        let node = Node::new(LanguageKind::Java, NodeKind::Module, path, path, path, Span::new(1, 1));
        let edge = Edge::new(EdgeKind::Contains, &node.id, "java:class:Ghost");
        Ok(ParseOutput {
            nodes: vec![node],
            edges: vec![edge],
            ..Default::default()
        })
    }
}

#[test]
fn test_front_end_errors_and_panics_become_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.fake", "ok");
    write(dir.path(), "b.fake", "FAIL");
    write(dir.path(), "c.fake", "PANIC");
    write(dir.path(), "d.fake", "ok");
    write(dir.path(), "Ignored.java", "class Ignored {}");

    for parallel in [true, false] {
        let out = GraphBuilder::new(LanguageRegistry::empty().with_front_end(FakeFrontEnd))
            .with_config(BuildConfig {
                parallel,
                ..Default::default()
            })
            .build(dir.path())
            .unwrap();

        let names: Vec<&str> = out.graph.nodes().map(|n| n.file.as_str()).collect();
        assert_eq!(names, vec!["a.fake", "d.fake"]);
        assert_eq!(out.stats.files_failed, 2);
        assert_eq!(out.diagnostics.len(), 2);
        assert!(out.diagnostics[0].names_file("b.fake"));
        assert!(out.diagnostics[0].message.contains("cannot parse"));
        assert!(out.diagnostics[1].names_file("c.fake"));
        assert!(out.diagnostics[1].message.contains("panicked"));
    }
}

#[test]
fn test_duplicate_ids_abort_the_build() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "A.java", "");
    write(dir.path(), "B.java", "");
    let err = GraphBuilder::new(LanguageRegistry::empty().with_front_end(CollidingFrontEnd))
        .build(dir.path())
        .err()
        .unwrap();
    match err {
        BuildError::DuplicateNodeId {
            id,
            first_file,
            second_file,
        } => {
            assert_eq!(id, "java:class:Same");
            assert_eq!(first_file, "A.java");
            assert_eq!(second_file, "B.java");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_duplicate_ids_within_one_file_become_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "A.java", "");
    write(dir.path(), "B.java", "");
    let out = GraphBuilder::new(LanguageRegistry::empty().with_front_end(RepeatingFrontEnd))
        .build(dir.path())
        .unwrap();

    let methods: Vec<&Node> = out.graph.nodes().filter(|n| n.kind == NodeKind::Method).collect();
    assert_eq!(methods.len(), 2);
    assert!(methods.iter().all(|m| m.span.start_line == 1));
    assert_eq!(out.graph.edge_count(), 2);
    assert_eq!(count_kind(&out.diagnostics, DiagnosticKind::ParseError), 2);
    assert!(out.diagnostics[0].names_file("A.java"));
    assert!(out.diagnostics[1].names_file("B.java"));
}

#[test]
fn test_dangling_edge_aborts_the_build() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "A.java", "");
    let err = GraphBuilder::new(LanguageRegistry::empty().with_front_end(DanglingFrontEnd))
        .build(dir.path())
        .err()
        .unwrap();
    assert!(matches!(err, BuildError::DanglingEdge { ref missing, .. } if missing == "java:class:Ghost"));
}
