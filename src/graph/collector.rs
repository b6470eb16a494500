//! Walks a graph and produces the path references a batch works on.

use std::collections::BTreeSet;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::errors::RuleError;
use crate::fs_op::FsProbe;
use crate::graph::{Graph, ParmType, PathReference};
use crate::resolve::sequence;
use crate::resolve::token::{self, Context};

/// Reference filters. All set filters must pass; an empty list or set
/// means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    /// Globs over node paths; any may match.
    pub node_paths: Vec<String>,
    pub node_types: BTreeSet<String>,
    /// Globs over parameter names; any may match.
    pub parm_names: Vec<String>,
    pub parm_types: BTreeSet<ParmType>,
    /// Include references with a blank value.
    pub show_empty: bool,
    /// Only include references whose file does not exist.
    pub show_missing: bool,
}

/// [`Filters`] with their globs compiled.
#[derive(Debug, Clone)]
pub struct ReferenceCollector {
    filters: Filters,
    node_paths: Option<GlobSet>,
    parm_names: Option<GlobSet>,
}

fn compile_globset(globs: &[String], field: &'static str) -> Result<Option<GlobSet>, RuleError> {
    if globs.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for g in globs {
        let glob = Glob::new(g).map_err(|source| RuleError::InvalidGlob {
            field,
            pattern: g.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|source| RuleError::InvalidGlob {
            field,
            pattern: globs.join(", "),
            source,
        })
}

impl ReferenceCollector {
    pub fn new(filters: Filters) -> Result<Self, RuleError> {
        Ok(Self {
            node_paths: compile_globset(&filters.node_paths, "node_paths")?,
            parm_names: compile_globset(&filters.parm_names, "parm_names")?,
            filters,
        })
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Collect references in graph traversal order. Parameters of types
    /// that do not hold paths are never surfaced.
    pub fn collect(
        &self,
        graph: &dyn Graph,
        context: &Context,
        probe: &dyn FsProbe,
    ) -> Vec<PathReference> {
        let f = &self.filters;
        let template = context.template();
        let mut out = Vec::new();
        for node in graph.nodes() {
            if self.node_paths.as_ref().is_some_and(|g| !g.is_match(&node.path)) {
                continue;
            }
            if !f.node_types.is_empty() && !f.node_types.contains(&node.type_name) {
                continue;
            }
            let parms = match graph.parameters(&node.path) {
                Ok(parms) => parms,
                Err(e) => {
                    tracing::warn!(node = %node.path, error = %e, "skipping node");
                    continue;
                }
            };
            for parm in parms {
                let Some(parm_type) = ParmType::from_tag(&parm.type_tag) else {
                    continue;
                };
                if !f.parm_types.is_empty() && !f.parm_types.contains(&parm_type) {
                    continue;
                }
                if self.parm_names.as_ref().is_some_and(|g| !g.is_match(&parm.name)) {
                    continue;
                }

                let empty = parm.raw.trim().is_empty();
                if empty && !f.show_empty {
                    continue;
                }
                let expression = parm.raw.contains('`');
                let missing = !empty
                    && !expression
                    && !sequence::exists(probe, &token::expand(&parm.raw, &template));
                if f.show_missing && !missing {
                    continue;
                }

                out.push(PathReference {
                    index: out.len(),
                    node: node.path.clone(),
                    node_type: node.type_name.clone(),
                    parm: parm.name,
                    parm_type,
                    raw: parm.raw,
                    missing,
                    empty,
                    expression,
                });
            }
        }
        tracing::debug!(count = out.len(), "collected references");
        out
    }
}

/// Collect from `graph` with its own context snapshot.
pub fn collect(
    graph: &dyn Graph,
    filters: &Filters,
    probe: &dyn FsProbe,
) -> Result<Vec<PathReference>, RuleError> {
    let collector = ReferenceCollector::new(filters.clone())?;
    Ok(collector.collect(graph, &graph.context(), probe))
}
