//! Terminal rendering of references, plans and reports.

use console::{style, StyledObject};

use crate::graph::PathReference;
use crate::plan::{diff_segments, ExecutionPlan, ExecutionReport, Outcome, Segment};
use crate::resolve::change::{ChangeDescriptor, ChangeStatus};
use crate::resolve::token::Context;

fn status_label(status: ChangeStatus) -> StyledObject<&'static str> {
    let label = status.as_str();
    match status {
        ChangeStatus::Pending => style(label).green(),
        ChangeStatus::NoOp => style(label).dim(),
        ChangeStatus::Conflict => style(label).red().bold(),
        ChangeStatus::WouldOverwrite => style(label).yellow(),
    }
}

fn outcome_label(outcome: Outcome) -> StyledObject<&'static str> {
    let label = outcome.as_str();
    match outcome {
        Outcome::Succeeded => style(label).green(),
        Outcome::Failed => style(label).red().bold(),
        Outcome::DryRun => style(label).cyan(),
        Outcome::Unchanged | Outcome::Skipped | Outcome::Cancelled => style(label).dim(),
    }
}

/// `new` with the part that differs from `old` emphasized.
pub fn highlight(old: &str, new: &str) -> String {
    diff_segments(old, new)
        .into_iter()
        .map(|seg| match seg {
            Segment::Same(s) => s.to_string(),
            Segment::Changed(s) => style(s).yellow().bold().to_string(),
        })
        .collect()
}

pub fn print_references(references: &[PathReference], context: &Context) {
    for r in references {
        let flag = if r.expression {
            style("expr").magenta()
        } else if r.empty {
            style("empty").dim()
        } else if r.missing {
            style("missing").red()
        } else {
            style("ok").green()
        };
        println!(
            "{:>4}  {:<8} {}  {}  {}",
            r.index,
            flag,
            style(format!("{}:{}", r.node, r.parm)).bold(),
            style(r.parm_type.as_str()).dim(),
            r.resolved(context)
        );
    }
    println!("{} reference(s)", references.len());
}

fn print_change(c: &ChangeDescriptor) {
    println!(
        "{:>4}  {:<15} {}",
        c.reference,
        status_label(c.status),
        style(format!("{}:{}", c.node, c.parm)).bold()
    );
    if c.is_noop() {
        println!("        {}", style(&c.old_raw).dim());
    } else {
        println!("        {} {}", style("-").red(), c.old_raw);
        println!("        {} {}", style("+").green(), highlight(&c.old_raw, &c.new_raw));
    }
    if !c.notes.is_empty() {
        let notes: Vec<String> = c.notes.iter().map(|n| n.to_string()).collect();
        println!("        {}", style(notes.join(", ")).dim());
    }
}

pub fn print_plan(plan: &ExecutionPlan, all: bool) {
    for c in plan.changes() {
        if all || !c.is_noop() || c.highlighted {
            print_change(c);
        }
    }
    let s = plan.summary();
    println!(
        "{} pending, {} unchanged, {} conflict(s), {} would overwrite",
        style(s.pending).green(),
        s.unchanged,
        style(s.conflicts).red(),
        style(s.would_overwrite).yellow()
    );
}

pub fn print_report(report: &ExecutionReport) {
    for row in report.rows.iter().filter(|r| r.outcome != Outcome::Unchanged) {
        println!(
            "{:>4}  {:<10} {}  {}",
            row.reference,
            outcome_label(row.outcome),
            style(format!("{}:{}", row.node, row.parm)).bold(),
            row.new_raw
        );
        if let Some(err) = &row.error {
            println!("        {}", style(err).red());
        }
    }
    let summary = if report.dry_run {
        format!("{} would run, {} skipped", report.planned(), report.skipped())
    } else {
        format!(
            "{} succeeded, {} failed, {} skipped",
            report.succeeded(),
            report.failed(),
            report.skipped()
        )
    };
    if report.cancelled {
        println!("{} ({})", summary, style("cancelled").yellow());
    } else {
        println!("{}", summary);
    }
}
