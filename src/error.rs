use std::path::PathBuf;

use thiserror::Error;

/// Fatal build failures. A build that hits one of these returns no graph.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("repository root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("repository root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("repository root is not readable: {}: {source}", .path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("duplicate node id {id} (first declared in {first_file}, again in {second_file})")]
    DuplicateNodeId {
        id: String,
        first_file: String,
        second_file: String,
    },

    #[error("{kind} edge references unknown node {missing} ({source_id} -> {target_id})")]
    DanglingEdge {
        kind: &'static str,
        source_id: String,
        target_id: String,
        missing: String,
    },
}

/// Rejected filter specifications. Fatal to a single query call only.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unrecognized filter option `{0}`")]
    UnknownOption(String),

    #[error("invalid value for filter option `{option}`: {message}")]
    InvalidValue { option: String, message: String },

    #[error("invalid regex for `{option}`: {source}")]
    InvalidRegex {
        option: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("`neighbors` must be >= 0, got {0}")]
    NegativeNeighbors(i64),

    #[error("filter specification must be a JSON object")]
    NotAnObject,

    #[error("filter specification is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
