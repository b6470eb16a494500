//! The consolidated result of executing a plan.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::resolve::change::{ChangeDescriptor, ChangeStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Succeeded,
    Failed,
    /// Nothing to do for this reference.
    Unchanged,
    /// Flagged and not forced.
    Skipped,
    /// Would have run; dry runs touch nothing.
    DryRun,
    /// The batch was cancelled before this step.
    Cancelled,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Succeeded => "ok",
            Outcome::Failed => "failed",
            Outcome::Unchanged => "unchanged",
            Outcome::Skipped => "skipped",
            Outcome::DryRun => "dry-run",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// One reference's line in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub reference: usize,
    pub node: String,
    pub parm: String,
    pub old_raw: String,
    pub new_raw: String,
    pub old_path: String,
    pub new_path: String,
    pub status: ChangeStatus,
    pub outcome: Outcome,
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportRow {
    pub fn new(change: &ChangeDescriptor, outcome: Outcome) -> Self {
        Self {
            reference: change.reference,
            node: change.node.clone(),
            parm: change.parm.clone(),
            old_raw: change.old_raw.clone(),
            new_raw: change.new_raw.clone(),
            old_path: change.old_path.clone(),
            new_path: change.new_path.clone(),
            status: change.status,
            outcome,
            notes: change.notes.iter().map(|n| n.to_string()).collect(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub dry_run: bool,
    pub cancelled: bool,
    /// Rows in reference order.
    pub rows: Vec<ReportRow>,
}

impl ExecutionReport {
    fn count(&self, pred: impl Fn(Outcome) -> bool) -> usize {
        self.rows.iter().filter(|r| pred(r.outcome)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| o == Outcome::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| o == Outcome::Failed)
    }

    /// Unchanged, skipped and cancelled rows.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Unchanged | Outcome::Skipped | Outcome::Cancelled))
    }

    /// Rows a dry run would have executed.
    pub fn planned(&self) -> usize {
        self.count(|o| o == Outcome::DryRun)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(|r| r.outcome == Outcome::Failed)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A piece of a rewritten path, for highlighting what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Same(&'a str),
    Changed(&'a str),
}

/// Split `new` into the prefix and suffix it shares with `old` and the
/// changed middle. Boundaries fall on character boundaries.
pub fn diff_segments<'a>(old: &str, new: &'a str) -> Vec<Segment<'a>> {
    let prefix: usize = old
        .chars()
        .zip(new.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix: usize = old[prefix..]
        .chars()
        .rev()
        .zip(new[prefix..].chars().rev())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .scan(0usize, |acc, n| {
            *acc += n;
            (*acc <= max_suffix).then_some(n)
        })
        .sum();

    let mid_end = new.len() - suffix;
    let mut out = Vec::with_capacity(3);
    if prefix > 0 {
        out.push(Segment::Same(&new[..prefix]));
    }
    if mid_end > prefix {
        out.push(Segment::Changed(&new[prefix..mid_end]));
    }
    if suffix > 0 {
        out.push(Segment::Same(&new[mid_end..]));
    }
    out
}
