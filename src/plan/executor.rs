//! Runs a plan: file operation first, parameter writes only once it has
//! succeeded. Steps run one at a time, in plan order. A step whose writes
//! cannot all be made has its file operation undone.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;

use crate::fs_op::{transfer, Filesystem, TransferKind};
use crate::graph::Graph;
use crate::plan::planner::{ExecutionPlan, PlanStep};
use crate::plan::report::{ExecutionReport, Outcome, ReportRow};
use crate::resolve::change::{ChangeDescriptor, ChangeStatus, FileOp};

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub dry_run: bool,
    /// Checked before each step. Completed steps are not rolled back.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ExecuteOptions {
    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Execute `plan` against `graph` and `fs`.
pub fn execute(
    plan: &ExecutionPlan,
    graph: &mut dyn Graph,
    fs: &dyn Filesystem,
    options: &ExecuteOptions,
) -> ExecutionReport {
    execute_with(plan, graph, fs, options, |_, _, _| {})
}

/// Like [`execute`], calling `progress(done, total, step)` before each step.
pub fn execute_with<F>(
    plan: &ExecutionPlan,
    graph: &mut dyn Graph,
    fs: &dyn Filesystem,
    options: &ExecuteOptions,
    mut progress: F,
) -> ExecutionReport
where
    F: FnMut(usize, usize, &PlanStep),
{
    let started = Local::now();
    let changes = plan.changes();
    let steps = plan.steps();
    let total = steps.len();
    let mut rows: BTreeMap<usize, ReportRow> = BTreeMap::new();
    let mut cancelled = false;

    for (done, step) in steps.iter().enumerate() {
        if !cancelled && options.cancelled() {
            tracing::warn!(done, total, "batch cancelled");
            cancelled = true;
        }
        if cancelled {
            for &i in &step.members {
                rows.insert(i, ReportRow::new(&changes[i], Outcome::Cancelled));
            }
            continue;
        }
        progress(done, total, step);

        if options.dry_run {
            for &i in &step.members {
                rows.insert(i, ReportRow::new(&changes[i], Outcome::DryRun));
            }
            continue;
        }

        let kind = match step.file_op {
            FileOp::None => {
                for &i in &step.members {
                    rows.insert(i, write_one(graph, &changes[i]));
                }
                continue;
            }
            FileOp::Copy => TransferKind::Copy,
            FileOp::Move => TransferKind::Move,
        };

        // Files are only touched when every parameter pointing at them can
        // follow, otherwise a move would leave a reference dangling.
        let unwritable = step.members.iter().find_map(|&i| {
            graph
                .check_writable(&changes[i].node, &changes[i].parm)
                .err()
        });
        if let Some(e) = unwritable {
            tracing::warn!(
                source = %step.source,
                error = %e,
                "parameter cannot be written, file left in place"
            );
            fail_step(&mut rows, changes, step, &e.to_string());
            continue;
        }

        let transferred =
            match transfer(fs, kind, &step.source, &step.destination, step.overwrite) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(
                        source = %step.source,
                        destination = %step.destination,
                        error = %e,
                        "file operation failed"
                    );
                    fail_step(&mut rows, changes, step, &e.to_string());
                    continue;
                }
            };
        tracing::debug!(files = transferred.files(), source = %step.source, "transferred");

        let mut written = Vec::with_capacity(step.members.len());
        let mut write_err = None;
        for &i in &step.members {
            let change = &changes[i];
            match graph.set(&change.node, &change.parm, &change.new_raw) {
                Ok(()) => written.push(i),
                Err(e) => {
                    write_err = Some(e);
                    break;
                }
            }
        }

        match write_err {
            None => {
                transferred.commit(fs);
                for i in written {
                    let change = &changes[i];
                    tracing::debug!(
                        node = %change.node,
                        parm = %change.parm,
                        value = %change.new_raw,
                        "updated"
                    );
                    rows.insert(i, ReportRow::new(change, Outcome::Succeeded));
                }
            }
            Some(e) => {
                tracing::warn!(source = %step.source, error = %e, "write failed, undoing step");
                for &i in &written {
                    let change = &changes[i];
                    if let Err(revert) = graph.set(&change.node, &change.parm, &change.old_raw) {
                        tracing::error!(
                            node = %change.node,
                            parm = %change.parm,
                            error = %revert,
                            "could not restore parameter"
                        );
                    }
                }
                let mut message = e.to_string();
                if let Err(undo) = transferred.rollback(fs) {
                    message = format!("{}; undoing the file operation failed: {}", message, undo);
                }
                fail_step(&mut rows, changes, step, &message);
            }
        }
    }

    for (i, change) in changes.iter().enumerate() {
        rows.entry(i).or_insert_with(|| {
            let outcome = match change.status {
                ChangeStatus::NoOp => Outcome::Unchanged,
                _ => Outcome::Skipped,
            };
            ReportRow::new(change, outcome)
        });
    }

    let report = ExecutionReport {
        started,
        finished: Local::now(),
        dry_run: options.dry_run,
        cancelled,
        rows: rows.into_values().collect(),
    };
    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        skipped = report.skipped(),
        planned = report.planned(),
        "batch finished"
    );
    report
}

fn write_one(graph: &mut dyn Graph, change: &ChangeDescriptor) -> ReportRow {
    match graph.set(&change.node, &change.parm, &change.new_raw) {
        Ok(()) => {
            tracing::debug!(
                node = %change.node,
                parm = %change.parm,
                value = %change.new_raw,
                "updated"
            );
            ReportRow::new(change, Outcome::Succeeded)
        }
        Err(e) => {
            tracing::warn!(
                node = %change.node,
                parm = %change.parm,
                error = %e,
                "write failed"
            );
            ReportRow::new(change, Outcome::Failed).with_error(e.to_string())
        }
    }
}

fn fail_step(
    rows: &mut BTreeMap<usize, ReportRow>,
    changes: &[ChangeDescriptor],
    step: &PlanStep,
    error: &str,
) {
    for &i in &step.members {
        rows.insert(
            i,
            ReportRow::new(&changes[i], Outcome::Failed).with_error(error),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_op::LocalFs;
    use crate::graph::{MemoryGraph, Scene, SceneNode, SceneParm};
    use crate::resolve::rule::Method;

    fn scene() -> MemoryGraph {
        MemoryGraph::new(Scene {
            nodes: vec![SceneNode {
                path: "/obj/a".into(),
                type_name: "file".into(),
                parameters: vec![SceneParm {
                    name: "file".into(),
                    type_tag: "file".into(),
                    value: "/t/a.exr".into(),
                    locked: false,
                }],
            }],
            ..Scene::default()
        })
    }

    fn rename(to: &str) -> ChangeDescriptor {
        ChangeDescriptor {
            reference: 0,
            node: "/obj/a".into(),
            parm: "file".into(),
            old_raw: "/t/a.exr".into(),
            new_raw: to.into(),
            old_path: "/t/a.exr".into(),
            new_path: to.into(),
            file_op: FileOp::None,
            status: ChangeStatus::Pending,
            notes: Vec::new(),
            highlighted: false,
            forced: false,
        }
    }

    #[test]
    fn dry_run_touches_nothing() {
        let plan = ExecutionPlan::from_changes(
            Method::ReplaceRegex,
            false,
            vec![rename("/t/b.exr")],
            &LocalFs,
        );
        let mut graph = scene();
        let options = ExecuteOptions {
            dry_run: true,
            ..ExecuteOptions::default()
        };
        let report = execute(&plan, &mut graph, &LocalFs, &options);
        assert_eq!(report.planned(), 1);
        assert_eq!(report.succeeded(), 0);
        assert_eq!(graph.get("/obj/a", "file").unwrap(), "/t/a.exr");
    }

    #[test]
    fn cancelled_batch_runs_no_steps() {
        let plan = ExecutionPlan::from_changes(
            Method::ReplaceRegex,
            false,
            vec![rename("/t/b.exr")],
            &LocalFs,
        );
        let mut graph = scene();
        let options = ExecuteOptions {
            dry_run: false,
            cancel: Some(Arc::new(AtomicBool::new(true))),
        };
        let report = execute(&plan, &mut graph, &LocalFs, &options);
        assert!(report.cancelled);
        assert_eq!(report.rows[0].outcome, Outcome::Cancelled);
        assert_eq!(graph.get("/obj/a", "file").unwrap(), "/t/a.exr");
    }

    #[test]
    fn parameter_writes_apply_the_new_raw_value() {
        let plan = ExecutionPlan::from_changes(
            Method::ReplaceRegex,
            false,
            vec![rename("$HIP/b.exr")],
            &LocalFs,
        );
        let mut graph = scene();
        let mut seen = Vec::new();
        let options = ExecuteOptions::default();
        let report = execute_with(&plan, &mut graph, &LocalFs, &options, |done, total, _| {
            seen.push((done, total))
        });
        assert_eq!(report.succeeded(), 1);
        assert_eq!(seen, vec![(0, 1)]);
        assert_eq!(graph.get("/obj/a", "file").unwrap(), "$HIP/b.exr");
    }
}
