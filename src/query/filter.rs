use petgraph::stable_graph::NodeIndex;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::graph::CodeGraph;
use crate::graph::edge::EdgeKind;
use crate::graph::node::{HttpMetadata, Node, NodeKind};
use crate::language::LanguageKind;

/// Every option a filter specification may set.
pub const KNOWN_OPTIONS: &[&str] = &[
    "kind",
    "language",
    "http_method_any",
    "http_path_regex",
    "http_produces_any",
    "http_consumes_any",
    "http_has_path_vars",
    "neighbors",
    "text",
    "name_regex",
    "file_regex",
    "annotations_any",
    "extends",
    "implements",
    "calls",
];

/// Declarative node filter. Unset options impose no constraint; the empty
/// filter matches every node. All set options must hold (logical AND).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSpec {
    /// Node kind (`class`, `method`, ...).
    pub kind: Option<String>,
    pub language: Option<String>,
    /// HTTP verbs, case-insensitive. `ANY` only matches handlers mapped to every verb.
    pub http_method_any: Option<Vec<String>>,
    /// Unanchored regex searched in the route path.
    pub http_path_regex: Option<String>,
    pub http_produces_any: Option<Vec<String>>,
    pub http_consumes_any: Option<Vec<String>>,
    pub http_has_path_vars: Option<bool>,
    /// Hops of expansion over edges in either direction.
    pub neighbors: Option<usize>,
    /// Case-insensitive substring of name, qualified name, file or annotations.
    pub text: Option<String>,
    pub name_regex: Option<String>,
    pub file_regex: Option<String>,
    pub annotations_any: Option<Vec<String>>,
    /// Name (suffix) of a type the node inherits from.
    pub extends: Option<String>,
    /// Name (suffix) of an interface the node implements.
    pub implements: Option<String>,
    /// Case-insensitive substring of the name of something the node calls.
    pub calls: Option<String>,
}

impl FilterSpec {
    /// Parse a filter from its JSON text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    /// Validate and deserialize a JSON filter object.
    ///
    /// Unknown options, values of the wrong type and negative `neighbors` are
    /// rejected with the offending option named in the error.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let Value::Object(map) = value else {
            return Err(ConfigError::NotAnObject);
        };
        for (key, v) in map {
            if !KNOWN_OPTIONS.contains(&key.as_str()) {
                return Err(ConfigError::UnknownOption(key.clone()));
            }
            if key == "neighbors"
                && let Some(n) = v.as_i64()
                && n < 0
            {
                return Err(ConfigError::NegativeNeighbors(n));
            }
            let single = Value::Object(Map::from_iter([(key.clone(), v.clone())]));
            serde_json::from_value::<FilterSpec>(single).map_err(|err| {
                ConfigError::InvalidValue {
                    option: key.clone(),
                    message: err.to_string(),
                }
            })?;
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Check option values and compile the regexes.
    pub fn compile(&self) -> Result<CompiledFilter, ConfigError> {
        let kind = match &self.kind {
            Some(k) => Some(NodeKind::from_str_loose(k).ok_or_else(|| ConfigError::InvalidValue {
                option: "kind".into(),
                message: format!("unknown node kind {k:?}"),
            })?),
            None => None,
        };
        let language = match &self.language {
            Some(l) => Some(LanguageKind::from_str_loose(l).ok_or_else(|| {
                ConfigError::InvalidValue {
                    option: "language".into(),
                    message: format!("unsupported language {l:?}"),
                }
            })?),
            None => None,
        };

        Ok(CompiledFilter {
            kind,
            language,
            http_methods: upper(&self.http_method_any),
            http_path: compile_regex("http_path_regex", &self.http_path_regex)?,
            produces: lower(&self.http_produces_any),
            consumes: lower(&self.http_consumes_any),
            has_path_vars: self.http_has_path_vars,
            text: self.text.as_ref().map(|t| t.to_lowercase()),
            name: compile_regex("name_regex", &self.name_regex)?,
            file: compile_regex("file_regex", &self.file_regex)?,
            annotations: self.annotations_any.as_ref().map(|list| {
                list.iter()
                    .map(|a| a.trim_start_matches('@').to_lowercase())
                    .collect()
            }),
            extends: self.extends.clone(),
            implements: self.implements.clone(),
            calls: self.calls.as_ref().map(|c| c.to_lowercase()),
            neighbors: self.neighbors.unwrap_or(0),
        })
    }
}

fn upper(list: &Option<Vec<String>>) -> Option<Vec<String>> {
    list.as_ref()
        .map(|l| l.iter().map(|s| s.trim().to_uppercase()).collect())
}

fn lower(list: &Option<Vec<String>>) -> Option<Vec<String>> {
    list.as_ref()
        .map(|l| l.iter().map(|s| s.trim().to_lowercase()).collect())
}

fn compile_regex(option: &'static str, pattern: &Option<String>) -> Result<Option<Regex>, ConfigError> {
    pattern
        .as_deref()
        .map(|p| Regex::new(p).map_err(|source| ConfigError::InvalidRegex { option, source }))
        .transpose()
}

/// A validated filter ready to evaluate.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    kind: Option<NodeKind>,
    language: Option<LanguageKind>,
    http_methods: Option<Vec<String>>,
    http_path: Option<Regex>,
    produces: Option<Vec<String>>,
    consumes: Option<Vec<String>>,
    has_path_vars: Option<bool>,
    text: Option<String>,
    name: Option<Regex>,
    file: Option<Regex>,
    annotations: Option<Vec<String>>,
    extends: Option<String>,
    implements: Option<String>,
    calls: Option<String>,
    neighbors: usize,
}

impl CompiledFilter {
    pub fn neighbors(&self) -> usize {
        self.neighbors
    }

    fn needs_http(&self) -> bool {
        self.http_methods.is_some()
            || self.http_path.is_some()
            || self.produces.is_some()
            || self.consumes.is_some()
            || self.has_path_vars.is_some()
    }

    /// Whether the node at `idx` satisfies every set predicate. Never mutates the graph.
    pub fn matches(&self, graph: &CodeGraph, idx: NodeIndex) -> bool {
        let node = graph.node_at(idx);
        if self.kind.is_some_and(|k| k != node.kind) {
            return false;
        }
        if self.language.is_some_and(|l| l != node.language) {
            return false;
        }
        if self.needs_http() {
            match &node.extras.http {
                Some(http) if self.matches_http(http) => {}
                _ => return false,
            }
        }
        if let Some(text) = &self.text
            && !matches_text(node, text)
        {
            return false;
        }
        if let Some(re) = &self.name
            && !(re.is_match(&node.name) || re.is_match(&node.qualified_name))
        {
            return false;
        }
        if let Some(re) = &self.file
            && !re.is_match(&node.file)
        {
            return false;
        }
        if let Some(wanted) = &self.annotations
            && !node.extras.annotations.iter().any(|a| annotation_matches(a, wanted))
        {
            return false;
        }
        if let Some(name) = &self.extends
            && !targets_ending_with(graph, idx, EdgeKind::Inherits, name)
        {
            return false;
        }
        if let Some(name) = &self.implements
            && !targets_ending_with(graph, idx, EdgeKind::Implements, name)
        {
            return false;
        }
        if let Some(callee) = &self.calls
            && !graph.outgoing(idx, EdgeKind::Calls).into_iter().any(|t| {
                let target = graph.node_at(t);
                target.name.to_lowercase().contains(callee.as_str())
                    || target.qualified_name.to_lowercase().contains(callee.as_str())
            })
        {
            return false;
        }
        true
    }

    fn matches_http(&self, http: &HttpMetadata) -> bool {
        if let Some(methods) = &self.http_methods
            && !http
                .routes()
                .any(|(m, _)| methods.iter().any(|w| w.eq_ignore_ascii_case(m)))
        {
            return false;
        }
        if let Some(re) = &self.http_path
            && !http.routes().any(|(_, p)| re.is_match(p))
        {
            return false;
        }
        if let Some(wanted) = &self.produces
            && !intersects(&http.produces, wanted)
        {
            return false;
        }
        if let Some(wanted) = &self.consumes
            && !intersects(&http.consumes, wanted)
        {
            return false;
        }
        if let Some(want) = self.has_path_vars
            && want == http.path_vars.is_empty()
        {
            return false;
        }
        true
    }
}

fn intersects(have: &[String], wanted: &[String]) -> bool {
    have.iter()
        .any(|h| wanted.iter().any(|w| w.eq_ignore_ascii_case(h.trim())))
}

fn matches_text(node: &Node, needle: &str) -> bool {
    node.name.to_lowercase().contains(needle)
        || node.qualified_name.to_lowercase().contains(needle)
        || node.file.to_lowercase().contains(needle)
        || node
            .extras
            .annotations
            .iter()
            .any(|a| a.to_lowercase().contains(needle))
}

/// `@GetMapping` matches `GetMapping`; `@app.get` matches `app.get` and `get`.
fn annotation_matches(annotation: &str, wanted: &[String]) -> bool {
    let name = annotation.trim_start_matches('@');
    let name = name.split('(').next().unwrap_or(name).to_lowercase();
    wanted
        .iter()
        .any(|w| name == *w || name.ends_with(&format!(".{w}")))
}

fn targets_ending_with(graph: &CodeGraph, idx: NodeIndex, kind: EdgeKind, suffix: &str) -> bool {
    graph
        .outgoing(idx, kind)
        .into_iter()
        .any(|t| graph.node_at(t).qualified_name.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_unknown_option_rejected() {
        let err = FilterSpec::from_json(&json!({"kind": "method", "http_verb": "GET"})).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOption(ref o) if o == "http_verb"));
    }

    #[test]
    fn test_negative_neighbors_rejected() {
        let err = FilterSpec::from_json(&json!({"neighbors": -1})).unwrap_err();
        assert!(matches!(err, ConfigError::NegativeNeighbors(-1)));
    }

    #[test]
    fn test_wrong_type_names_option() {
        let err = FilterSpec::from_json(&json!({"http_has_path_vars": "yes"})).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref option, .. } if option == "http_has_path_vars"));
    }

    #[test]
    fn test_not_an_object() {
        assert!(matches!(
            FilterSpec::from_json(&json!(["kind"])),
            Err(ConfigError::NotAnObject)
        ));
        assert!(matches!(FilterSpec::parse("{kind"), Err(ConfigError::InvalidJson(_))));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let spec = FilterSpec::from_json(&json!({"http_path_regex": "(unclosed"})).unwrap();
        assert!(matches!(
            spec.compile(),
            Err(ConfigError::InvalidRegex { option: "http_path_regex", .. })
        ));
    }

    #[test]
    fn test_unknown_kind_is_config_error() {
        let spec = FilterSpec::from_json(&json!({"kind": "struct"})).unwrap();
        assert!(matches!(spec.compile(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_empty_filter_parses() {
        let spec = FilterSpec::from_json(&json!({})).unwrap();
        assert_eq!(spec, FilterSpec::default());
        assert_eq!(spec.compile().unwrap().neighbors(), 0);
    }

    #[test]
    fn test_annotation_matching() {
        let wanted = vec!["getmapping".to_string(), "get".to_string()];
        assert!(annotation_matches("@GetMapping", &wanted));
        assert!(annotation_matches("@router.get", &wanted));
        assert!(!annotation_matches("@Override", &wanted));
    }
}
