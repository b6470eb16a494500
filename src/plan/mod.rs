//! Batch planning and execution.

pub mod executor;
pub mod planner;
pub mod report;

pub use executor::{execute, execute_with, ExecuteOptions};
pub use planner::{plan, ExecutionPlan, PlanStep, PlanSummary};
pub use report::{diff_segments, ExecutionReport, Outcome, ReportRow, Segment};
