use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

use petgraph::stable_graph::NodeIndex;
use serde::Serialize;

use crate::error::ConfigError;
use crate::graph::CodeGraph;
use crate::graph::edge::EdgeKind;
use crate::graph::node::{HttpMetadata, HttpRoute};

/// One HTTP handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// Qualified name of the declaring type or module.
    pub owner: Option<String>,
    pub handler: String,
    pub id: String,
    pub method: String,
    pub path: String,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
    pub path_vars: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_routes: Vec<HttpRoute>,
    pub file: String,
    pub line: usize,
}

/// Where a handler parameter is bound from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    Path,
    Query,
    Header,
    Body,
    Cookie,
}

impl ParamSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header => "header",
            ParamSource::Body => "body",
            ParamSource::Cookie => "cookie",
        }
    }

    /// Names bound from this source on one handler.
    pub fn params<'h>(&self, http: &'h HttpMetadata) -> &'h [String] {
        match self {
            ParamSource::Path => &http.path_vars,
            ParamSource::Query => &http.query_params,
            ParamSource::Header => &http.header_params,
            ParamSource::Body => &http.body_params,
            ParamSource::Cookie => &http.cookie_params,
        }
    }
}

impl FromStr for ParamSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "path" => Ok(ParamSource::Path),
            "query" => Ok(ParamSource::Query),
            "header" => Ok(ParamSource::Header),
            "body" => Ok(ParamSource::Body),
            "cookie" => Ok(ParamSource::Cookie),
            other => Err(ConfigError::InvalidValue {
                option: "param_source".into(),
                message: format!("`{other}` is not one of path, query, header, body, cookie"),
            }),
        }
    }
}

/// An endpoint together with the parameters it binds from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamUsage {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub source: ParamSource,
    pub params: Vec<String>,
}

/// Everything known about one handler's route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointDetail {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub query_params: Vec<String>,
    pub header_params: Vec<String>,
    pub body_params: Vec<String>,
    pub cookie_params: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors: Option<serde_json::Value>,
}

fn endpoint_at(graph: &CodeGraph, idx: NodeIndex) -> Option<(Endpoint, &HttpMetadata)> {
    let node = graph.node_at(idx);
    let http = node.extras.http.as_ref()?;
    let owner = graph.owner_of(idx).map(|o| graph.node_at(o));
    let endpoint = Endpoint {
        owner: owner.map(|o| o.qualified_name.clone()),
        handler: node.qualified_name.clone(),
        id: node.id.clone(),
        method: http.method.clone(),
        path: http.path.clone(),
        produces: http.produces.clone(),
        consumes: http.consumes.clone(),
        path_vars: http.path_vars.clone(),
        additional_routes: http.additional_routes.clone(),
        file: node.file.clone(),
        line: node.span.start_line,
    };
    Some((endpoint, http))
}

/// Every route-bearing node in insertion order, optionally restricted to one
/// owner given by qualified or simple name.
pub fn list_endpoints(graph: &CodeGraph, owner: Option<&str>) -> Vec<Endpoint> {
    graph
        .node_indices()
        .filter(|&idx| match owner {
            None => true,
            Some(wanted) => graph.owner_of(idx).is_some_and(|o| {
                let o = graph.node_at(o);
                o.qualified_name == wanted || o.name == wanted
            }),
        })
        .filter_map(|idx| endpoint_at(graph, idx).map(|(e, _)| e))
        .collect()
}

/// Endpoints binding at least one parameter from `source`, in insertion order.
pub fn endpoints_with_param_source(graph: &CodeGraph, source: ParamSource) -> Vec<ParamUsage> {
    graph
        .node_indices()
        .filter_map(|idx| {
            let (endpoint, http) = endpoint_at(graph, idx)?;
            let params = source.params(http);
            if params.is_empty() {
                return None;
            }
            Some(ParamUsage {
                params: params.to_vec(),
                endpoint,
                source,
            })
        })
        .collect()
}

/// Full route detail for the handler with this id or qualified name.
/// `None` when no such handler exists or it has no route.
pub fn endpoint_detail(graph: &CodeGraph, handler: &str) -> Option<EndpointDetail> {
    let idx = graph.index_of(handler).or_else(|| {
        graph
            .by_qualified_name(handler)
            .iter()
            .copied()
            .find(|&idx| graph.node_at(idx).extras.http.is_some())
    })?;
    let (endpoint, http) = endpoint_at(graph, idx)?;
    Some(EndpointDetail {
        query_params: http.query_params.clone(),
        header_params: http.header_params.clone(),
        body_params: http.body_params.clone(),
        cookie_params: http.cookie_params.clone(),
        response_status: http.response_status.clone(),
        framework: http.framework.clone(),
        cors: graph.node_at(idx).extras.other.get("cors").cloned(),
        endpoint,
    })
}

/// Ids of callables reachable from `id` over `calls` edges within `depth` hops,
/// nearest first. The start node is not included; an unknown id yields nothing.
pub fn calls_from(graph: &CodeGraph, id: &str, depth: usize) -> Vec<String> {
    let Some(start) = graph.index_of(id) else {
        return Vec::new();
    };
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([(start, 0usize)]);
    let mut out = Vec::new();
    while let Some((idx, dist)) = queue.pop_front() {
        if dist == depth {
            continue;
        }
        for callee in graph.outgoing(idx, EdgeKind::Calls) {
            if seen.insert(callee) {
                out.push(graph.node_at(callee).id.clone());
                queue.push_back((callee, dist + 1));
            }
        }
    }
    out
}
