//! Batch planning: rewrite every reference, then flag collisions and order
//! the file operations so chained moves do not clobber each other.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::fs_op::FsProbe;
use crate::graph::PathReference;
use crate::resolve::change::{ChangeDescriptor, ChangeNote, ChangeStatus, FileOp};
use crate::resolve::rewrite::PathRewriter;
use crate::resolve::rule::{CompiledRule, Method};
use crate::resolve::sequence;
use crate::resolve::token::Context;

/// One physical operation: a file transfer (or none) fanned out to the
/// parameter writes of every change sharing its source and destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub file_op: FileOp,
    pub source: String,
    pub destination: String,
    /// Indices into [`ExecutionPlan::changes`].
    pub members: Vec<usize>,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub pending: usize,
    pub unchanged: usize,
    pub conflicts: usize,
    pub would_overwrite: usize,
}

/// The descriptors of one batch plus their execution order. Built once per
/// batch action and executed at most once.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    method: Method,
    overwrite: bool,
    /// One descriptor per reference, in collection order.
    changes: Vec<ChangeDescriptor>,
    /// Indices of non-no-op changes in the order they run.
    order: Vec<usize>,
}

/// Build the plan for `references` under `rule`.
pub fn plan(
    references: &[PathReference],
    rule: &CompiledRule,
    context: &Context,
    probe: &dyn FsProbe,
) -> ExecutionPlan {
    let rewriter = PathRewriter::new(rule, context, probe);
    let changes: Vec<ChangeDescriptor> = references.iter().map(|r| rewriter.apply(r)).collect();
    let plan = ExecutionPlan::from_changes(rule.method(), rule.rule().overwrite, changes, probe);

    let summary = plan.summary();
    tracing::info!(
        method = %plan.method,
        pending = summary.pending,
        unchanged = summary.unchanged,
        conflicts = summary.conflicts,
        would_overwrite = summary.would_overwrite,
        "planned batch"
    );
    plan
}

impl ExecutionPlan {
    /// Flag collisions among already rewritten `changes` and order them.
    pub fn from_changes(
        method: Method,
        overwrite: bool,
        changes: Vec<ChangeDescriptor>,
        probe: &dyn FsProbe,
    ) -> Self {
        let mut plan = ExecutionPlan {
            method,
            overwrite,
            changes,
            order: Vec::new(),
        };
        plan.flag_shared_destinations();
        let check_existing = matches!(method, Method::Copy | Method::Move) && !overwrite;
        if check_existing {
            plan.flag_existing_destinations(probe);
        }
        let cycles = plan.order_steps();
        if check_existing && cycles > 0 {
            plan.flag_existing_destinations(probe);
        }
        plan
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn changes(&self) -> &[ChangeDescriptor] {
        &self.changes
    }

    pub fn summary(&self) -> PlanSummary {
        let mut s = PlanSummary::default();
        for c in &self.changes {
            match c.status {
                ChangeStatus::Pending => s.pending += 1,
                ChangeStatus::NoOp => s.unchanged += 1,
                ChangeStatus::Conflict => s.conflicts += 1,
                ChangeStatus::WouldOverwrite => s.would_overwrite += 1,
            }
        }
        s
    }

    /// Include the flagged change for `reference` in execution. Returns
    /// `false` when there is no such change or it cannot be forced.
    pub fn force(&mut self, reference: usize) -> bool {
        match self.changes.iter_mut().find(|c| c.reference == reference) {
            Some(c) if c.can_force() => {
                c.forced = true;
                true
            }
            _ => false,
        }
    }

    /// Force every change that can be forced. Returns how many were.
    pub fn force_all(&mut self) -> usize {
        let mut n = 0;
        for c in self.changes.iter_mut().filter(|c| c.can_force()) {
            c.forced = true;
            n += 1;
        }
        n
    }

    /// Executable work in run order. Changes sharing a source and a
    /// destination collapse into one step.
    pub fn steps(&self) -> Vec<PlanStep> {
        let mut steps: Vec<PlanStep> = Vec::new();
        let mut by_pair: HashMap<(FileOp, &str, &str), usize> = HashMap::new();
        for &i in &self.order {
            let c = &self.changes[i];
            if !c.is_executable() {
                continue;
            }
            let forced_overwrite = c.forced && c.status == ChangeStatus::WouldOverwrite;
            if c.file_op != FileOp::None {
                let key = (c.file_op, c.old_path.as_str(), c.new_path.as_str());
                if let Some(&s) = by_pair.get(&key) {
                    steps[s].members.push(i);
                    steps[s].overwrite |= forced_overwrite;
                    continue;
                }
                by_pair.insert(key, steps.len());
            }
            steps.push(PlanStep {
                file_op: c.file_op,
                source: c.old_path.clone(),
                destination: c.new_path.clone(),
                members: vec![i],
                overwrite: self.overwrite || forced_overwrite,
            });
        }
        steps
    }

    /// Mark every member of a destination group with more than one distinct
    /// source as a conflict.
    fn flag_shared_destinations(&mut self) {
        let mut sources: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for c in self.changes.iter().filter(|c| !c.is_noop()) {
            sources
                .entry(c.new_path.as_str())
                .or_default()
                .insert(c.old_path.as_str());
        }
        let shared: BTreeSet<String> = sources
            .into_iter()
            .filter(|(_, srcs)| srcs.len() > 1)
            .map(|(dst, _)| dst.to_string())
            .collect();
        for c in self.changes.iter_mut() {
            if !c.is_noop() && shared.contains(&c.new_path) {
                c.flag(ChangeStatus::Conflict, ChangeNote::SharedDestination);
            }
        }
    }

    /// Copy/move destinations already on disk. A move into a path that
    /// another pending move of this batch vacates is not an overwrite.
    /// Flagging a move keeps its source occupied, so this repeats until no
    /// further change is flagged.
    fn flag_existing_destinations(&mut self, probe: &dyn FsProbe) {
        loop {
            let vacated: BTreeSet<String> = self
                .changes
                .iter()
                .filter(|c| c.status == ChangeStatus::Pending && c.file_op == FileOp::Move)
                .map(|c| c.old_path.clone())
                .collect();
            let mut flagged = false;
            for c in self.changes.iter_mut() {
                if c.is_noop() || c.file_op == FileOp::None || c.new_path == c.old_path {
                    continue;
                }
                if c.file_op == FileOp::Move && vacated.contains(&c.new_path) {
                    continue;
                }
                if !sequence::exists(probe, &c.new_path) {
                    continue;
                }
                if c.status == ChangeStatus::Pending {
                    c.flag(ChangeStatus::WouldOverwrite, ChangeNote::DestinationExists);
                    flagged = true;
                } else if !c.notes.contains(&ChangeNote::DestinationExists) {
                    c.notes.push(ChangeNote::DestinationExists);
                }
            }
            if !flagged {
                break;
            }
        }
    }

    /// Topological order over file operations: a change whose destination
    /// is another change's source waits for that change. Whatever cannot be
    /// ordered sits on or behind a cycle and becomes an unforceable conflict.
    /// Returns how many changes were caught that way.
    fn order_steps(&mut self) -> usize {
        let active: Vec<usize> = (0..self.changes.len())
            .filter(|&i| !self.changes[i].is_noop())
            .collect();

        let mut by_source: HashMap<&str, Vec<usize>> = HashMap::new();
        for &j in &active {
            let c = &self.changes[j];
            if c.file_op != FileOp::None {
                by_source.entry(c.old_path.as_str()).or_default().push(j);
            }
        }

        // waits_on[i] = number of changes i must wait for; blocks[j] = the
        // changes waiting on j.
        let mut waits_on: HashMap<usize, usize> = active.iter().map(|&i| (i, 0)).collect();
        let mut blocks: HashMap<usize, Vec<usize>> = HashMap::new();
        for &i in &active {
            let c = &self.changes[i];
            if c.file_op == FileOp::None {
                continue;
            }
            for &j in by_source.get(c.new_path.as_str()).into_iter().flatten() {
                if self.changes[j].old_path != c.old_path {
                    *waits_on.entry(i).or_default() += 1;
                    blocks.entry(j).or_default().push(i);
                }
            }
        }

        let mut ready: BTreeSet<usize> = active
            .iter()
            .copied()
            .filter(|i| waits_on.get(i).copied().unwrap_or(0) == 0)
            .collect();
        let mut order = Vec::with_capacity(active.len());
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &k in blocks.get(&i).into_iter().flatten() {
                if let Some(n) = waits_on.get_mut(&k) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(k);
                    }
                }
            }
        }

        let placed: BTreeSet<usize> = order.iter().copied().collect();
        let mut cycles = 0;
        for &i in &active {
            if !placed.contains(&i) {
                cycles += 1;
                tracing::warn!(
                    source = %self.changes[i].old_path,
                    destination = %self.changes[i].new_path,
                    "move cycle"
                );
                self.changes[i].flag(ChangeStatus::Conflict, ChangeNote::MoveCycle);
                order.push(i);
            }
        }
        self.order = order;
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_op::LocalFs;
    use crate::graph::ParmType;
    use crate::resolve::rule::RewriteRule;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    fn refs(raws: &[&str]) -> Vec<PathReference> {
        raws.iter()
            .enumerate()
            .map(|(index, raw)| PathReference {
                index,
                node: format!("/obj/n{}", index),
                node_type: "file".into(),
                parm: "file".into(),
                parm_type: ParmType::File,
                raw: raw.to_string(),
                missing: false,
                empty: false,
                expression: false,
            })
            .collect()
    }

    fn build(rule: RewriteRule, raws: &[&str]) -> ExecutionPlan {
        let compiled = rule.validate().unwrap();
        plan(&refs(raws), &compiled, &Context::new(), &LocalFs)
    }

    fn statuses(plan: &ExecutionPlan) -> Vec<ChangeStatus> {
        plan.changes().iter().map(|c| c.status).collect()
    }

    #[test]
    fn two_sources_one_destination_conflict() {
        let rule = RewriteRule {
            pattern: "[ab]\\.exr".into(),
            replacement: "c.exr".into(),
            ..RewriteRule::new(Method::ReplaceRegex)
        };
        let mut plan = build(rule, &["a.exr", "b.exr"]);
        assert_eq!(statuses(&plan), vec![ChangeStatus::Conflict; 2]);
        assert!(plan.steps().is_empty());

        assert!(plan.force(1));
        assert_eq!(plan.steps().len(), 1);
    }

    #[test]
    fn duplicate_references_share_one_step() {
        let tmp = TempDir::new().unwrap();
        tmp.child("src/a.exr").touch().unwrap();
        let a = format!("{}/src/a.exr", tmp.path().display());
        let rule = RewriteRule {
            destination_root: Some(format!("{}/out", tmp.path().display())),
            ..RewriteRule::new(Method::Copy)
        };
        let plan = build(rule, &[&a, &a]);
        assert_eq!(statuses(&plan), vec![ChangeStatus::Pending; 2]);
        let steps = plan.steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].members, vec![0, 1]);
    }

    #[test]
    fn existing_destination_would_overwrite() {
        let tmp = TempDir::new().unwrap();
        tmp.child("src/a.exr").touch().unwrap();
        tmp.child("out/a.exr").touch().unwrap();
        let a = format!("{}/src/a.exr", tmp.path().display());
        let rule = RewriteRule {
            destination_root: Some(format!("{}/out", tmp.path().display())),
            ..RewriteRule::new(Method::Copy)
        };
        let mut plan = build(rule.clone(), &[&a]);
        assert_eq!(statuses(&plan), vec![ChangeStatus::WouldOverwrite]);
        assert!(plan.steps().is_empty());
        plan.force_all();
        assert!(plan.steps()[0].overwrite);

        let plan = build(RewriteRule { overwrite: true, ..rule }, &[&a]);
        assert_eq!(statuses(&plan), vec![ChangeStatus::Pending]);
    }

    #[test]
    fn chained_moves_run_downstream_first() {
        let tmp = TempDir::new().unwrap();
        tmp.child("a.exr").touch().unwrap();
        tmp.child("b.exr").touch().unwrap();
        let root = tmp.path().display().to_string();
        // a -> b and b -> c: b has to be moved out of the way first, and
        // landing on b is not an overwrite since b is vacated.
        let changes = vec![
            move_change(0, &format!("{root}/a.exr"), &format!("{root}/b.exr")),
            move_change(1, &format!("{root}/b.exr"), &format!("{root}/c.exr")),
        ];
        let plan = ExecutionPlan::from_changes(Method::Move, false, changes, &LocalFs);

        assert_eq!(statuses(&plan), vec![ChangeStatus::Pending; 2]);
        let order: Vec<usize> = plan.steps().iter().map(|s| s.members[0]).collect();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn move_cycle_is_an_unforceable_conflict() {
        let changes = vec![
            move_change(0, "/t/a.exr", "/t/b.exr"),
            move_change(1, "/t/b.exr", "/t/a.exr"),
        ];
        let mut plan = ExecutionPlan::from_changes(Method::Move, false, changes, &LocalFs);
        assert_eq!(statuses(&plan), vec![ChangeStatus::Conflict; 2]);
        assert!(plan.changes()[0].notes.contains(&ChangeNote::MoveCycle));
        assert_eq!(plan.force_all(), 0);
        assert!(plan.steps().is_empty());
    }

    #[test]
    fn a_held_back_move_does_not_vacate_its_source() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.exr", "b.exr", "c.exr"] {
            tmp.child(name).touch().unwrap();
        }
        let root = tmp.path().display().to_string();
        // b -> c lands on an existing c, so b stays put and a -> b would
        // overwrite it too.
        let changes = vec![
            move_change(0, &format!("{root}/a.exr"), &format!("{root}/b.exr")),
            move_change(1, &format!("{root}/b.exr"), &format!("{root}/c.exr")),
        ];
        let mut plan = ExecutionPlan::from_changes(Method::Move, false, changes, &LocalFs);
        assert_eq!(statuses(&plan), vec![ChangeStatus::WouldOverwrite; 2]);
        assert!(plan.steps().is_empty());

        plan.force_all();
        let order: Vec<usize> = plan.steps().iter().map(|s| s.members[0]).collect();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn moves_behind_a_cycle_never_run() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.exr", "b.exr", "c.exr"] {
            tmp.child(name).touch().unwrap();
        }
        let root = tmp.path().display().to_string();
        let changes = vec![
            move_change(0, &format!("{root}/a.exr"), &format!("{root}/b.exr")),
            move_change(1, &format!("{root}/b.exr"), &format!("{root}/a.exr")),
            move_change(2, &format!("{root}/c.exr"), &format!("{root}/a.exr")),
        ];
        let plan = ExecutionPlan::from_changes(Method::Move, false, changes, &LocalFs);
        assert_eq!(statuses(&plan), vec![ChangeStatus::Conflict; 3]);
        assert!(plan.changes()[2].notes.contains(&ChangeNote::DestinationExists));
        assert!(plan.steps().is_empty());
    }

    fn move_change(reference: usize, from: &str, to: &str) -> ChangeDescriptor {
        ChangeDescriptor {
            reference,
            node: format!("/obj/n{}", reference),
            parm: "file".into(),
            old_raw: from.into(),
            new_raw: to.into(),
            old_path: from.into(),
            new_path: to.into(),
            file_op: FileOp::Move,
            status: ChangeStatus::Pending,
            notes: Vec::new(),
            highlighted: false,
            forced: false,
        }
    }
}
