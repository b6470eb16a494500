//! An in-memory graph backed by a JSON scene document.
//!
//! ```json
//! {
//!   "variables": { "HIP": "/proj/shot010" },
//!   "frame": 1001,
//!   "nodes": [
//!     { "path": "/obj/geo1/file1", "type": "file",
//!       "parameters": [ { "name": "file", "type": "geometry", "value": "$HIP/geo/a.bgeo" } ] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::GraphError;
use crate::fs_op::helpers::atomic_write;
use crate::graph::{Graph, NodeInfo, ParmInfo};
use crate::resolve::token::{Context, UdimPolicy};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<i64>,
    #[serde(default)]
    pub udim: UdimPolicy,
    #[serde(default)]
    pub nodes: Vec<SceneNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneNode {
    pub path: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub parameters: Vec<SceneParm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneParm {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub value: String,
    /// Writes to a locked parameter fail.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let text = fs::read_to_string(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| GraphError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the scene as pretty JSON, atomically replacing `path`.
    pub fn save(&self, path: &Path) -> Result<(), GraphError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| GraphError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        atomic_write(path, text.as_bytes()).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// [`Graph`] over a [`Scene`].
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    scene: Scene,
}

impl MemoryGraph {
    pub fn new(scene: Scene) -> Self {
        Self { scene }
    }

    pub fn load(path: &Path) -> Result<Self, GraphError> {
        Scene::load(path).map(Self::new)
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn into_scene(self) -> Scene {
        self.scene
    }

    fn node(&self, node: &str) -> Result<&SceneNode, GraphError> {
        self.scene
            .nodes
            .iter()
            .find(|n| n.path == node)
            .ok_or_else(|| GraphError::NodeNotFound(node.to_string()))
    }

    fn parm(&self, node: &str, parm: &str) -> Result<&SceneParm, GraphError> {
        self.node(node)?
            .parameters
            .iter()
            .find(|p| p.name == parm)
            .ok_or_else(|| GraphError::ParmNotFound {
                node: node.to_string(),
                parm: parm.to_string(),
            })
    }
}

impl Graph for MemoryGraph {
    fn nodes(&self) -> Vec<NodeInfo> {
        self.scene
            .nodes
            .iter()
            .map(|n| NodeInfo {
                path: n.path.clone(),
                type_name: n.type_name.clone(),
            })
            .collect()
    }

    fn parameters(&self, node: &str) -> Result<Vec<ParmInfo>, GraphError> {
        Ok(self
            .node(node)?
            .parameters
            .iter()
            .map(|p| ParmInfo {
                name: p.name.clone(),
                type_tag: p.type_tag.clone(),
                raw: p.value.clone(),
            })
            .collect())
    }

    fn get(&self, node: &str, parm: &str) -> Result<String, GraphError> {
        self.parm(node, parm).map(|p| p.value.clone())
    }

    fn check_writable(&self, node: &str, parm: &str) -> Result<(), GraphError> {
        if self.parm(node, parm)?.locked {
            return Err(GraphError::ReadOnly {
                node: node.to_string(),
                parm: parm.to_string(),
            });
        }
        Ok(())
    }

    fn set(&mut self, node: &str, parm: &str, value: &str) -> Result<(), GraphError> {
        let not_found = || GraphError::ParmNotFound {
            node: node.to_string(),
            parm: parm.to_string(),
        };
        let entry = self
            .scene
            .nodes
            .iter_mut()
            .find(|n| n.path == node)
            .ok_or_else(|| GraphError::NodeNotFound(node.to_string()))?
            .parameters
            .iter_mut()
            .find(|p| p.name == parm)
            .ok_or_else(not_found)?;
        if entry.locked {
            return Err(GraphError::ReadOnly {
                node: node.to_string(),
                parm: parm.to_string(),
            });
        }
        entry.value = value.to_string();
        Ok(())
    }

    fn context(&self) -> Context {
        let mut ctx = Context::new().with_udim(self.scene.udim);
        for (name, value) in &self.scene.variables {
            ctx.set_var(name.clone(), value.clone());
        }
        match self.scene.frame {
            Some(frame) => ctx.with_frame(frame),
            None => ctx,
        }
    }
}
