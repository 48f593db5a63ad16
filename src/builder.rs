use std::collections::BTreeMap;
use std::io::Read;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use petgraph::stable_graph::NodeIndex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, count_kind};
use crate::error::BuildError;
use crate::frontend::{FrontEnd, LanguageRegistry, ParseOutput, TypeRef};
use crate::graph::CodeGraph;
use crate::graph::edge::{EdgeKind, EdgeMetadata};
use crate::graph::node::NodeKind;
use crate::resolve::derive_overrides;
use crate::walker::{relative_path, walk_repository};

/// Bytes read from an extension-less file to sniff its language.
const SNIFF_BYTES: usize = 256;

/// Counters for one build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    /// Regular files found by the walk.
    pub files_seen: usize,
    /// Files handed to a front end that produced output.
    pub files_parsed: usize,
    /// Files whose front end failed outright; their output is omitted.
    pub files_failed: usize,
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub edges_by_kind: BTreeMap<String, usize>,
    pub unresolved_calls: usize,
    /// Wall-clock time for the build in seconds.
    pub elapsed_secs: f64,
}

/// A finished graph plus everything non-fatal that happened while building it.
pub struct BuildOutput {
    pub graph: CodeGraph,
    /// Diagnostics in pipeline order: parse, type linking, call resolution.
    pub diagnostics: Vec<Diagnostic>,
    pub stats: BuildStats,
}

/// Build the graph for `root` with the Java and Python front ends and the
/// configuration found in the root's `codeprop.toml`.
pub fn build_graph(root: &Path) -> Result<BuildOutput, BuildError> {
    GraphBuilder::new(LanguageRegistry::with_defaults())
        .with_config(BuildConfig::load(root))
        .build(root)
}

/// Graph builder with an injected language registry.
pub struct GraphBuilder {
    registry: LanguageRegistry,
    config: BuildConfig,
}

struct ParseJob {
    path: PathBuf,
    relative: String,
    front_end: Arc<dyn FrontEnd>,
}

enum FileOutcome {
    Parsed(ParseOutput),
    Failed(Diagnostic),
}

impl GraphBuilder {
    pub fn new(registry: LanguageRegistry) -> Self {
        Self {
            registry,
            config: BuildConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    /// Walk `root`, parse every supported file, merge, link and resolve.
    ///
    /// Fails only on a bad root or an inconsistent merge (duplicate ids,
    /// dangling edges); per-file and per-call problems become diagnostics.
    pub fn build(&self, root: &Path) -> Result<BuildOutput, BuildError> {
        let start = Instant::now();
        check_root(root)?;

        let files = walk_repository(root, &self.config);
        let jobs = self.classify(root, &files);
        debug!(seen = files.len(), supported = jobs.len(), "walked repository");

        let mut stats = BuildStats {
            files_seen: files.len(),
            ..Default::default()
        };

        if jobs.is_empty() {
            stats.elapsed_secs = start.elapsed().as_secs_f64();
            info!(root = %root.display(), "no supported files found");
            return Ok(BuildOutput {
                graph: CodeGraph::new(),
                diagnostics: vec![Diagnostic::no_files_processed()],
                stats,
            });
        }

        // Results come back in job order whichever way they are computed.
        let outcomes: Vec<FileOutcome> = if self.config.parallel {
            jobs.par_iter().map(parse_one).collect()
        } else {
            jobs.iter().map(parse_one).collect()
        };

        let mut graph = CodeGraph::new();
        let mut diagnostics = Vec::new();
        let mut type_refs = Vec::new();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Parsed(out) => {
                    stats.files_parsed += 1;
                    diagnostics.extend(out.diagnostics);
                    for node in out.nodes {
                        match graph.add_node(node) {
                            Ok(_) => {}
                            // Within one file the first declaration wins.
                            Err(BuildError::DuplicateNodeId {
                                id,
                                first_file,
                                second_file,
                            }) if first_file == second_file => {
                                warn!(file = %second_file, %id, "duplicate declaration skipped");
                                diagnostics.push(Diagnostic::parse_error(
                                    second_file,
                                    format!("duplicate declaration {id}"),
                                ));
                            }
                            Err(err) => return Err(err),
                        }
                    }
                    graph.add_edges(out.edges)?;
                    type_refs.extend(out.type_refs);
                    graph.push_call_sites(out.call_sites);
                }
                FileOutcome::Failed(diagnostic) => {
                    stats.files_failed += 1;
                    diagnostics.push(diagnostic);
                }
            }
        }
        debug!(nodes = graph.node_count(), edges = graph.edge_count(), "merged files");

        let linked = link_type_refs(&mut graph, &type_refs, &mut diagnostics);
        debug!(linked, refs = type_refs.len(), "linked type references");

        let overrides = graph.add_edges(derive_overrides(&graph))?;
        debug!(overrides, "added override edges");

        for language in graph.languages() {
            for resolver in self.registry.resolvers_for(language) {
                let resolution = resolver.resolve_calls(&graph);
                let added = graph.add_edges(resolution.edges)?;
                debug!(language = language.as_str(), added, "added call edges");
                diagnostics.extend(resolution.diagnostics);
            }
        }

        stats.nodes = graph.node_count();
        stats.edges = graph.edge_count();
        stats.nodes_by_kind = graph
            .nodes_by_kind()
            .into_iter()
            .map(|(k, n)| (k.as_str().to_string(), n))
            .collect();
        stats.edges_by_kind = graph
            .edges_by_kind()
            .into_iter()
            .map(|(k, n)| (k.as_str().to_string(), n))
            .collect();
        stats.unresolved_calls = count_kind(&diagnostics, DiagnosticKind::UnresolvedCall);
        stats.elapsed_secs = start.elapsed().as_secs_f64();

        info!(
            files = stats.files_parsed,
            failed = stats.files_failed,
            nodes = stats.nodes,
            edges = stats.edges,
            diagnostics = diagnostics.len(),
            "built graph"
        );

        Ok(BuildOutput {
            graph,
            diagnostics,
            stats,
        })
    }

    /// Pair each walked file with the front end that claims it.
    fn classify(&self, root: &Path, files: &[PathBuf]) -> Vec<ParseJob> {
        let allowed = self.config.allowed_languages();
        files
            .iter()
            .filter_map(|path| {
                let head = if path.extension().is_none() {
                    read_head(path)
                } else {
                    String::new()
                };
                let front_end = self.registry.classify(path, &head)?;
                if let Some(langs) = &allowed
                    && !langs.contains(&front_end.language())
                {
                    return None;
                }
                Some(ParseJob {
                    path: path.clone(),
                    relative: relative_path(root, path),
                    front_end: Arc::clone(front_end),
                })
            })
            .collect()
    }
}

fn check_root(root: &Path) -> Result<(), BuildError> {
    let meta = match std::fs::metadata(root) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(BuildError::RootNotFound(root.to_path_buf()));
        }
        Err(source) => {
            return Err(BuildError::RootUnreadable {
                path: root.to_path_buf(),
                source,
            });
        }
    };
    if !meta.is_dir() {
        return Err(BuildError::RootNotDirectory(root.to_path_buf()));
    }
    std::fs::read_dir(root).map_err(|source| BuildError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn read_head(path: &Path) -> String {
    let mut buf = Vec::with_capacity(SNIFF_BYTES);
    let read = std::fs::File::open(path)
        .and_then(|f| f.take(SNIFF_BYTES as u64).read_to_end(&mut buf));
    match read {
        Ok(_) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => String::new(),
    }
}

/// Read and parse one file. Never panics: front-end errors and panics
/// become a `ParseError` diagnostic naming the file.
fn parse_one(job: &ParseJob) -> FileOutcome {
    let bytes = match std::fs::read(&job.path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(file = %job.relative, "read failed: {err}");
            return FileOutcome::Failed(Diagnostic::parse_error(
                &job.relative,
                format!("could not read file: {err}"),
            ));
        }
    };
    let contents = String::from_utf8_lossy(&bytes);

    match catch_unwind(AssertUnwindSafe(|| {
        job.front_end.parse(&job.relative, &contents)
    })) {
        Ok(Ok(out)) => FileOutcome::Parsed(out),
        Ok(Err(err)) => {
            warn!(file = %job.relative, "front end failed: {err:#}");
            FileOutcome::Failed(Diagnostic::parse_error(&job.relative, format!("{err:#}")))
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(file = %job.relative, "front end panicked: {message}");
            FileOutcome::Failed(Diagnostic::parse_error(
                &job.relative,
                format!("front end panicked: {message}"),
            ))
        }
    }
}

/// Turn textual type references into edges. Returns how many edges were added.
///
/// Unresolved supertypes are reported; unresolved imports are not, since most
/// name library code that is not part of the repository.
fn link_type_refs(graph: &mut CodeGraph, refs: &[TypeRef], diagnostics: &mut Vec<Diagnostic>) -> usize {
    let mut added = 0;
    for r in refs {
        let Some(source) = graph.index_of(&r.source) else {
            continue;
        };
        match resolve_type_ref(graph, source, r) {
            Some(target) if target != source => {
                if graph.add_edge_between(source, target, r.kind, EdgeMetadata::at_line(r.line)) {
                    added += 1;
                }
            }
            Some(_) => {}
            None if r.kind.is_inheritance() => diagnostics.push(Diagnostic::unresolved_type(
                &r.file,
                r.line,
                format!("{} target {} is not declared in the repository", r.kind.as_str(), r.name),
            )),
            None => {}
        }
    }
    added
}

fn resolve_type_ref(graph: &CodeGraph, source: NodeIndex, r: &TypeRef) -> Option<NodeIndex> {
    let language = graph.node_at(source).language;
    let eligible = |idx: &NodeIndex| {
        let node = graph.node_at(*idx);
        node.language == language
            && match r.kind {
                EdgeKind::Imports => node.kind != NodeKind::Field,
                _ => node.kind.is_type(),
            }
    };

    for candidate in &r.candidates {
        let hits: Vec<NodeIndex> = graph
            .by_qualified_name(candidate)
            .iter()
            .copied()
            .filter(|idx| eligible(idx))
            .collect();
        if hits.is_empty() {
            continue;
        }
        let same_file = hits.iter().copied().find(|&h| graph.node_at(h).file == r.file);
        return same_file.or_else(|| hits.first().copied());
    }

    // A supertype whose simple name is unique in the repository.
    if !r.kind.is_inheritance() {
        return None;
    }
    let simple = r.name.rsplit('.').next().unwrap_or(&r.name);
    let mut by_name = graph.by_name(simple).iter().copied().filter(|idx| eligible(idx));
    match (by_name.next(), by_name.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::Edge;
    use crate::graph::node::{Node, Span};
    use crate::language::LanguageKind;
    use std::fs;

    fn class(qn: &str, file: &str) -> Node {
        let name = qn.rsplit('.').next().unwrap();
        Node::new(LanguageKind::Java, NodeKind::Class, name, qn, file, Span::new(1, 9))
    }

    fn type_ref(source: &str, kind: EdgeKind, name: &str, candidates: &[&str]) -> TypeRef {
        TypeRef {
            source: source.to_string(),
            kind,
            name: name.to_string(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            file: "a/Sub.java".to_string(),
            line: 1,
        }
    }

    #[test]
    fn test_root_checks() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(check_root(&missing), Err(BuildError::RootNotFound(_))));
        let file = dir.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(check_root(&file), Err(BuildError::RootNotDirectory(_))));
        assert!(check_root(dir.path()).is_ok());
    }

    #[test]
    fn test_link_prefers_candidate_order_then_unique_simple_name() {
        let mut graph = CodeGraph::new();
        let sub = class("a.Sub", "a/Sub.java");
        let sub_id = sub.id.clone();
        graph.add_node(sub).unwrap();
        graph.add_node(class("a.Base", "a/Base.java")).unwrap();
        graph.add_node(class("b.Base", "b/Base.java")).unwrap();
        graph.add_node(class("c.Api", "c/Api.java")).unwrap();

        let refs = vec![
            type_ref(&sub_id, EdgeKind::Inherits, "Base", &["b.Base", "a.Base"]),
            type_ref(&sub_id, EdgeKind::Implements, "Api", &["a.Api"]),
            type_ref(&sub_id, EdgeKind::Implements, "Serializable", &["a.Serializable"]),
            type_ref(&sub_id, EdgeKind::Imports, "List", &["java.util.List"]),
        ];
        let mut diagnostics = Vec::new();
        assert_eq!(link_type_refs(&mut graph, &refs, &mut diagnostics), 2);

        let edges = graph.edges();
        let b_base = graph.node_at(graph.by_qualified_name("b.Base")[0]).id.clone();
        assert_eq!(
            edges[0],
            Edge::new(EdgeKind::Inherits, &sub_id, b_base).with_metadata(EdgeMetadata::at_line(1))
        );
        // No `a.Api`; the simple name is unique.
        assert_eq!(edges[1].kind, EdgeKind::Implements);
        assert!(edges[1].target.ends_with("#c.Api"));

        // The JDK interface is reported, the JDK import is not.
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnresolvedType);
        assert!(diagnostics[0].message.contains("Serializable"));
    }

    #[test]
    fn test_ambiguous_simple_name_is_not_guessed() {
        let mut graph = CodeGraph::new();
        let sub = class("a.Sub", "a/Sub.java");
        let sub_id = sub.id.clone();
        graph.add_node(sub).unwrap();
        graph.add_node(class("x.Base", "x/Base.java")).unwrap();
        graph.add_node(class("y.Base", "y/Base.java")).unwrap();

        let refs = vec![type_ref(&sub_id, EdgeKind::Inherits, "Base", &["a.Base"])];
        let mut diagnostics = Vec::new();
        assert_eq!(link_type_refs(&mut graph, &refs, &mut diagnostics), 0);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_empty_repository() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# nothing").unwrap();
        let out = build_graph(dir.path()).unwrap();
        assert_eq!(out.graph.node_count(), 0);
        assert_eq!(out.graph.edge_count(), 0);
        assert_eq!(out.diagnostics, vec![Diagnostic::no_files_processed()]);
        assert_eq!(out.stats.files_seen, 1);
    }

    #[test]
    fn test_language_filter_from_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.java"), "class A {}").unwrap();
        fs::write(dir.path().join("b.py"), "def b():\n    pass\n").unwrap();
        let config = BuildConfig {
            languages: vec!["python".to_string()],
            ..Default::default()
        };
        let out = GraphBuilder::new(LanguageRegistry::with_defaults())
            .with_config(config)
            .build(dir.path())
            .unwrap();
        assert!(out.graph.nodes().all(|n| n.language == LanguageKind::Python));
        assert_eq!(out.stats.files_parsed, 1);
    }
}
