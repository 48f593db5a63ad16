//! Route helpers shared by the Java and Python front ends.

use crate::graph::node::{HttpMetadata, HttpRoute};

pub const HTTP_ANY: &str = "ANY";

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "HEAD"];

/// Normalize a verb spelling (`get`, `RequestMethod.GET`, `"Post"`) to upper case.
/// `ALL`/`ANY` map to [`HTTP_ANY`]; anything else is rejected.
pub fn normalize_method(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let trimmed = trimmed.rsplit('.').next().unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_ascii_uppercase();
    if upper == "ALL" || upper == HTTP_ANY {
        return Some(HTTP_ANY.to_string());
    }
    HTTP_METHODS
        .iter()
        .any(|method| *method == upper)
        .then_some(upper)
}

/// Join a base path and a handler path with exactly one `/` between them.
pub fn join_paths(prefix: &str, suffix: &str) -> String {
    let mut left = prefix.trim().to_string();
    if !left.starts_with('/') {
        left = format!("/{left}");
    }
    let left = left.trim_end_matches('/');
    let right = suffix.trim().trim_start_matches('/');
    if left.is_empty() {
        if right.is_empty() {
            "/".to_string()
        } else {
            format!("/{right}")
        }
    } else if right.is_empty() {
        left.to_string()
    } else {
        format!("{left}/{right}")
    }
}

/// Every base × handler path combination. Either side may be empty.
pub fn combine_paths(base_paths: &[String], method_paths: &[String]) -> Vec<String> {
    let combined: Vec<String> = match (base_paths.is_empty(), method_paths.is_empty()) {
        (false, false) => base_paths
            .iter()
            .flat_map(|b| method_paths.iter().map(move |m| join_paths(b, m)))
            .collect(),
        (true, false) => method_paths.iter().map(|m| join_paths("", m)).collect(),
        (false, true) => base_paths.iter().map(|b| join_paths(b, "")).collect(),
        (true, true) => Vec::new(),
    };
    dedup(combined)
}

/// Template variables in a route path: `{id}`, `{id:\d+}`, `<id>`, `<int:id>`.
pub fn path_vars(path: &str) -> Vec<String> {
    let mut vars = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find(['{', '<']) {
        let close = if rest.as_bytes()[start] == b'{' { '}' } else { '>' };
        let Some(len) = rest[start + 1..].find(close) else {
            break;
        };
        let inner = &rest[start + 1..start + 1 + len];
        let name = if close == '}' {
            inner.split(':').next().unwrap_or(inner)
        } else {
            inner.rsplit(':').next().unwrap_or(inner)
        };
        let name = name.trim();
        if !name.is_empty() {
            vars.push(name.to_string());
        }
        rest = &rest[start + 1 + len + 1..];
    }
    dedup(vars)
}

/// Order-preserving dedup that also drops blank entries.
pub fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|s| !s.trim().is_empty() && seen.insert(s.clone()))
        .collect()
}

/// Map a `MediaType.APPLICATION_JSON_VALUE`-style constant to its literal value.
/// Literal strings and unknown constants pass through unchanged.
pub fn media_type(raw: &str) -> String {
    let constant = raw.rsplit('.').next().unwrap_or(raw);
    let mapped = match constant.trim_end_matches("_VALUE") {
        "APPLICATION_JSON" => "application/json",
        "APPLICATION_XML" => "application/xml",
        "TEXT_PLAIN" => "text/plain",
        "TEXT_HTML" => "text/html",
        "TEXT_XML" => "text/xml",
        "APPLICATION_FORM_URLENCODED" => "application/x-www-form-urlencoded",
        "MULTIPART_FORM_DATA" => "multipart/form-data",
        "APPLICATION_OCTET_STREAM" => "application/octet-stream",
        "TEXT_EVENT_STREAM" => "text/event-stream",
        "ALL" => "*/*",
        _ => return raw.to_string(),
    };
    mapped.to_string()
}

/// Expand verbs × paths into the primary route plus `additional_routes`.
///
/// Returns `None` when there is no path at all. An empty verb list means the
/// mapping accepts every verb.
pub fn build_metadata(methods: &[String], paths: &[String], framework: &str) -> Option<HttpMetadata> {
    if paths.is_empty() {
        return None;
    }
    let any = [HTTP_ANY.to_string()];
    let methods = if methods.is_empty() { &any[..] } else { methods };

    let mut routes = methods
        .iter()
        .flat_map(|m| paths.iter().map(move |p| (m.clone(), p.clone())));
    let (method, path) = routes.next()?;
    let additional_routes = routes
        .map(|(method, path)| HttpRoute { method, path })
        .collect();

    let path_vars = dedup(paths.iter().flat_map(|p| path_vars(p)).collect());
    Some(HttpMetadata {
        method,
        path,
        path_vars,
        additional_routes,
        framework: Some(framework.to_string()),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_method() {
        assert_eq!(normalize_method("get").as_deref(), Some("GET"));
        assert_eq!(normalize_method("RequestMethod.POST").as_deref(), Some("POST"));
        assert_eq!(normalize_method("\"delete\"").as_deref(), Some("DELETE"));
        assert_eq!(normalize_method("all").as_deref(), Some("ANY"));
        assert_eq!(normalize_method("route"), None);
        assert_eq!(normalize_method(""), None);
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/api", "items"), "/api/items");
        assert_eq!(join_paths("/api/", "/items"), "/api/items");
        assert_eq!(join_paths("api", ""), "/api");
        assert_eq!(join_paths("", "items/{id}"), "/items/{id}");
        assert_eq!(join_paths("", ""), "/");
        assert_eq!(join_paths("/users", "/"), "/users");
    }

    #[test]
    fn test_combine_paths_is_cartesian() {
        let base = vec!["/v1".to_string(), "/v2".to_string()];
        let leaf = vec!["/a".to_string()];
        assert_eq!(combine_paths(&base, &leaf), vec!["/v1/a", "/v2/a"]);
        assert_eq!(combine_paths(&[], &leaf), vec!["/a"]);
        assert_eq!(combine_paths(&base, &[]), vec!["/v1", "/v2"]);
        assert!(combine_paths(&[], &[]).is_empty());
    }

    #[test]
    fn test_path_vars_across_frameworks() {
        assert_eq!(path_vars("/updatingProduct/{productId}"), vec!["productId"]);
        assert_eq!(path_vars("/files/{name:.+}/v/{rev}"), vec!["name", "rev"]);
        assert_eq!(path_vars("/users/<int:user_id>/<slug>"), vec!["user_id", "slug"]);
        assert!(path_vars("/health").is_empty());
        assert_eq!(path_vars("/broken/{open"), Vec::<String>::new());
    }

    #[test]
    fn test_media_type_constants() {
        assert_eq!(media_type("MediaType.APPLICATION_JSON_VALUE"), "application/json");
        assert_eq!(media_type("APPLICATION_XML_VALUE"), "application/xml");
        assert_eq!(media_type("text/csv"), "text/csv");
    }

    #[test]
    fn test_build_metadata_spreads_routes() {
        let http = build_metadata(
            &["GET".to_string(), "HEAD".to_string()],
            &["/a/{id}".to_string()],
            "spring",
        )
        .unwrap();
        assert_eq!(http.method, "GET");
        assert_eq!(http.path, "/a/{id}");
        assert_eq!(http.additional_routes.len(), 1);
        assert_eq!(http.additional_routes[0].method, "HEAD");
        assert_eq!(http.path_vars, vec!["id"]);

        let any = build_metadata(&[], &["/x".to_string()], "flask").unwrap();
        assert_eq!(any.method, "ANY");
        assert!(build_metadata(&["GET".to_string()], &[], "flask").is_none());
    }
}
