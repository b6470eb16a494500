//! The host node graph, seen through the narrow interface the engine
//! needs: list nodes, list typed parameters, read and write raw values,
//! and snapshot the variable context.

pub mod collector;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::errors::GraphError;
use crate::resolve::token::{self, Context};

pub use collector::{collect, Filters, ReferenceCollector};
pub use memory::{MemoryGraph, Scene, SceneNode, SceneParm};

/// Parameter types that hold paths. Parameters of any other type are
/// never surfaced.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ParmType {
    File,
    Image,
    ImageSequence,
    Geometry,
    Directory,
    /// Plain string parameters conventionally named `filepath`.
    Filepath,
}

impl ParmType {
    /// Parse a host type tag. `None` for tags that do not hold paths.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "file" => Some(ParmType::File),
            "image" => Some(ParmType::Image),
            "image-sequence" | "image_sequence" => Some(ParmType::ImageSequence),
            "geometry" => Some(ParmType::Geometry),
            "directory" => Some(ParmType::Directory),
            "filepath" => Some(ParmType::Filepath),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParmType::File => "file",
            ParmType::Image => "image",
            ParmType::ImageSequence => "image-sequence",
            ParmType::Geometry => "geometry",
            ParmType::Directory => "directory",
            ParmType::Filepath => "filepath",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub path: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParmInfo {
    pub name: String,
    pub type_tag: String,
    pub raw: String,
}

/// Capabilities required from the host graph.
pub trait Graph {
    /// Every node, in traversal order.
    fn nodes(&self) -> Vec<NodeInfo>;

    /// Parameters of `node`, in declaration order.
    fn parameters(&self, node: &str) -> Result<Vec<ParmInfo>, GraphError>;

    fn get(&self, node: &str, parm: &str) -> Result<String, GraphError>;

    fn set(&mut self, node: &str, parm: &str, value: &str) -> Result<(), GraphError>;

    /// `Ok` when [`Graph::set`] on this parameter would be accepted.
    fn check_writable(&self, node: &str, parm: &str) -> Result<(), GraphError> {
        self.get(node, parm).map(|_| ())
    }

    /// Snapshot of variables, frame and tile policy.
    fn context(&self) -> Context;
}

/// One path-bearing parameter, as seen by a single collection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathReference {
    /// Position in the collection pass.
    pub index: usize,
    pub node: String,
    pub node_type: String,
    pub parm: String,
    pub parm_type: ParmType,
    pub raw: String,
    pub missing: bool,
    pub empty: bool,
    /// The value is a host expression (contains a backtick).
    pub expression: bool,
}

impl PathReference {
    /// Fully expanded form of the raw value. Always recomputed.
    pub fn resolved(&self, context: &Context) -> String {
        token::expand(&self.raw, context)
    }

    /// Expanded form with frame and tile tokens kept.
    pub fn template(&self, context: &Context) -> String {
        token::expand(&self.raw, &context.template())
    }
}
