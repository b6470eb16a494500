pub mod app;
pub mod errors;
pub mod fs_op;
pub mod graph;
pub mod plan;
pub mod resolve;
pub mod runner;

pub use crate::errors::{GraphError, RuleError};
pub use crate::graph::{collect, Filters, Graph, MemoryGraph, PathReference};
pub use crate::plan::{execute, plan, ExecuteOptions, ExecutionPlan, ExecutionReport};
pub use crate::resolve::{ChangeDescriptor, ChangeStatus, Context, Method, RewriteRule};
