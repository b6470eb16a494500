use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::graph::{Filters, ParmType};
use crate::resolve::rule::{Method, RewriteRule};
use crate::resolve::version::VersionPattern;

/// Find, classify and rewrite file path references in a scene.
#[derive(Parser, Debug)]
#[command(name = "pathzoom", version, about)]
pub struct Cli {
    /// Scene file (JSON) to operate on.
    #[arg(long, short = 's', global = true)]
    pub scene: Option<PathBuf>,

    /// Settings file to use instead of the per-user one.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the path references of the scene.
    List {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Show what a rule would change.
    Preview {
        #[command(flatten)]
        rule: RuleArgs,
        #[command(flatten)]
        filters: FilterArgs,
        /// Also list unchanged references.
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Apply a rule: move/copy files, then rewrite parameters.
    Apply {
        #[command(flatten)]
        rule: RuleArgs,
        #[command(flatten)]
        filters: FilterArgs,
        /// Report what would happen without touching anything.
        #[arg(long)]
        dry_run: bool,
        /// Also run conflicting and overwriting changes.
        #[arg(long)]
        force: bool,
        /// Do not ask for confirmation.
        #[arg(long, short = 'y')]
        yes: bool,
        /// Write the updated scene here instead of over the input.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// List the versions on disk for a versioned path.
    Versions {
        path: String,
        /// Use the n-th digit run of the file name as the version.
        #[arg(long)]
        digit_run: Option<usize>,
    },
    /// Print the effective settings.
    Config {
        /// Write them out as the settings file (creates the directories).
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct RuleArgs {
    /// Rewrite method.
    #[arg(long, short = 'm', value_enum)]
    pub method: Option<Method>,
    /// Reuse the rule and filters of the previous run.
    #[arg(long, conflicts_with = "method")]
    pub last: bool,
    #[arg(long, short = 'p')]
    pub pattern: Option<String>,
    #[arg(long, short = 'r')]
    pub replacement: Option<String>,
    #[arg(long, conflicts_with = "match_case")]
    pub ignore_case: bool,
    #[arg(long)]
    pub match_case: bool,
    /// Search with a glob instead of a regex.
    #[arg(long)]
    pub glob: bool,
    /// Match against the stored value instead of the resolved path.
    #[arg(long)]
    pub match_raw: bool,
    #[arg(long)]
    pub target_version: Option<u32>,
    /// Use the n-th digit run of the file name as the version.
    #[arg(long)]
    pub digit_run: Option<usize>,
    #[arg(long, short = 'd')]
    pub destination: Option<String>,
    #[arg(long)]
    pub preserve_structure: bool,
    #[arg(long)]
    pub relative_root: Option<String>,
    #[arg(long)]
    pub overwrite: bool,
    #[arg(long)]
    pub search_root: Option<String>,
    /// Variable to anchor relative paths to (HIP, JOB, ...).
    #[arg(long)]
    pub anchor: Option<String>,
    #[arg(long)]
    pub max_parents: Option<usize>,
}

impl RuleArgs {
    /// Overlay the given flags onto `rule`.
    pub fn apply_to(&self, mut rule: RewriteRule) -> RewriteRule {
        if let Some(method) = self.method {
            rule.method = method;
        }
        if let Some(p) = &self.pattern {
            rule.pattern = p.clone();
        }
        if let Some(r) = &self.replacement {
            rule.replacement = r.clone();
        }
        if self.ignore_case {
            rule.match_case = false;
        }
        if self.match_case {
            rule.match_case = true;
        }
        rule.glob |= self.glob;
        rule.match_raw |= self.match_raw;
        if self.target_version.is_some() {
            rule.target_version = self.target_version;
        }
        if let Some(n) = self.digit_run {
            rule.version_pattern = VersionPattern::NumericRun(n);
        }
        if self.destination.is_some() {
            rule.destination_root = self.destination.clone();
        }
        rule.preserve_relative_structure |= self.preserve_structure;
        if self.relative_root.is_some() {
            rule.relative_root = self.relative_root.clone();
        }
        rule.overwrite |= self.overwrite;
        if self.search_root.is_some() {
            rule.search_root = self.search_root.clone();
        }
        if let Some(a) = &self.anchor {
            rule.anchor_variable = a.clone();
        }
        if let Some(n) = self.max_parents {
            rule.max_parents = n;
        }
        rule
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Node path glob (repeatable).
    #[arg(long = "node")]
    pub node_paths: Vec<String>,
    /// Node type (repeatable).
    #[arg(long = "node-type")]
    pub node_types: Vec<String>,
    /// Parameter name glob (repeatable).
    #[arg(long = "parm")]
    pub parm_names: Vec<String>,
    /// Parameter type (repeatable).
    #[arg(long = "parm-type", value_enum)]
    pub parm_types: Vec<ParmType>,
    #[arg(long)]
    pub show_empty: bool,
    #[arg(long)]
    pub show_missing: bool,
}

impl FilterArgs {
    pub fn apply_to(&self, mut filters: Filters) -> Filters {
        filters.node_paths.extend(self.node_paths.iter().cloned());
        filters.node_types.extend(self.node_types.iter().cloned());
        filters.parm_names.extend(self.parm_names.iter().cloned());
        filters.parm_types.extend(self.parm_types.iter().copied());
        filters.show_empty |= self.show_empty;
        filters.show_missing |= self.show_missing;
        filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_flags_overlay_the_rule() {
        let cli = Cli::try_parse_from([
            "pathzoom",
            "--scene",
            "s.json",
            "apply",
            "-m",
            "replace-glob",
            "-p",
            "tex",
            "-r",
            "maps",
            "--ignore-case",
            "--parm-type",
            "image",
            "--dry-run",
        ])
        .unwrap();
        let Command::Apply { rule, filters, dry_run, .. } = cli.command else {
            panic!("expected apply");
        };
        assert!(dry_run);
        let rule = rule.apply_to(RewriteRule::default());
        assert_eq!(rule.method, Method::ReplaceGlob);
        assert_eq!(rule.replacement, "maps");
        assert!(!rule.match_case);
        let filters = filters.apply_to(Filters::default());
        assert!(filters.parm_types.contains(&ParmType::Image));
    }
}
