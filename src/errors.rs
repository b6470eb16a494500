//! Error types shared across the crate.
//!
//! Only failures that stop a whole batch (an invalid rule) or a single
//! collaborator call (a graph read/write) are modelled as errors here.
//! Per-reference conditions such as "no version token" or "conflict" are
//! recorded as notes on the change descriptors instead, see
//! `crate::resolve::change::ChangeNote`.

use std::path::PathBuf;
use thiserror::Error;

/// Rule validation failures. These are raised before any reference is
/// touched, so a batch either starts with a valid rule or not at all.
#[derive(Error, Debug)]
pub enum RuleError {
    /// A regex field failed to compile.
    #[error("invalid pattern in `{field}`: {pattern:?}: {source}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A glob failed to parse: a glob rule pattern or a node path or
    /// parameter name filter.
    #[error("invalid glob in `{field}`: {pattern:?}: {source}")]
    InvalidGlob {
        field: &'static str,
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The active method needs a parameter that was left unset.
    #[error("method `{method}` requires `{field}`")]
    MissingParameter {
        method: &'static str,
        field: &'static str,
    },
}

/// Errors raised by graph collaborators.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("parameter `{parm}` not found on {node}")]
    ParmNotFound { node: String, parm: String },

    #[error("parameter `{parm}` on {node} is read-only")]
    ReadOnly { node: String, parm: String },

    #[error("failed to read scene {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scene {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
