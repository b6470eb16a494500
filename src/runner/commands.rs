use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use chrono::Local;
use console::Term;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use crate::app::settings::{
    ensure_dirs_exist, load_settings, load_settings_from, project_config_dir, save_settings,
    save_settings_to, user_cache_dir, Settings,
};
use crate::app::{session_path, Session};
use crate::fs_op::{helpers, LocalFs};
use crate::graph::{Graph, MemoryGraph, ReferenceCollector, Scene};
use crate::plan::{execute_with, plan, ExecuteOptions};
use crate::resolve::rule::RewriteRule;
use crate::resolve::token::{Context, UdimPolicy};
use crate::resolve::version::{VersionPattern, VersionResolver};
use crate::runner::cli::{Cli, Command, FilterArgs, RuleArgs};
use crate::runner::output;

/// Exit code when some changes of a batch failed.
const EXIT_PARTIAL: u8 = 2;

pub fn settings_for(cli: &Cli) -> anyhow::Result<Settings> {
    match &cli.config {
        Some(path) => load_settings_from(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => load_settings().context("loading settings"),
    }
}

pub fn run(cli: Cli, settings: &Settings) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Command::List { filters, json } => {
            let (graph, context) = open_scene(&cli, settings)?;
            let filters = filters.apply_to(settings.filter_defaults(Default::default()));
            let collector = ReferenceCollector::new(filters)?;
            let refs = collector.collect(&graph, &context, &LocalFs);
            if *json {
                println!("{}", serde_json::to_string_pretty(&refs)?);
            } else {
                output::print_references(&refs, &context);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Preview {
            rule,
            filters,
            all,
            json,
        } => {
            let (graph, context) = open_scene(&cli, settings)?;
            let session = build_session(rule, filters, settings)?;
            let plan = plan_for(&graph, &context, &session)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                output::print_plan(&plan, *all);
            }
            save_session(&session);
            Ok(ExitCode::SUCCESS)
        }
        Command::Apply {
            rule,
            filters,
            dry_run,
            force,
            yes,
            output: out,
            json,
        } => {
            let scene_path = scene_path(&cli)?;
            let (mut graph, context) = open_scene(&cli, settings)?;
            let session = build_session(rule, filters, settings)?;
            let mut plan = plan_for(&graph, &context, &session)?;
            if *force {
                let n = plan.force_all();
                tracing::info!(forced = n, "forcing flagged changes");
            }
            if !*json {
                output::print_plan(&plan, false);
            }
            save_session(&session);

            let steps = plan.steps();
            if steps.is_empty() {
                if !*json {
                    println!("nothing to do");
                }
                return Ok(ExitCode::SUCCESS);
            }
            if !*dry_run && settings.confirm_apply && !*yes && !confirm(steps.len())? {
                println!("aborted");
                return Ok(ExitCode::SUCCESS);
            }
            let target = out.clone().unwrap_or(scene_path);
            if !*dry_run {
                helpers::check_writable(&target)
                    .with_context(|| format!("scene {} cannot be written", target.display()))?;
            }

            let cancel = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&cancel);
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
                tracing::warn!(error = %e, "could not install Ctrl-C handler");
            }
            let options = ExecuteOptions {
                dry_run: *dry_run,
                cancel: Some(cancel),
            };

            let bar = ProgressBar::new(steps.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:30} {pos}/{len} {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            let report = execute_with(&plan, &mut graph, &LocalFs, &options, |done, _, step| {
                bar.set_position(done as u64);
                bar.set_message(step.destination.clone());
            });
            bar.finish_and_clear();

            if *json {
                println!("{}", report.to_json()?);
            } else {
                output::print_report(&report);
            }
            if !*dry_run && report.succeeded() > 0 {
                let recovery = user_cache_dir().map(|d| d.join("recovered"));
                save_scene(graph.scene(), &target, recovery.as_deref())?;
            }
            if report.failed() > 0 {
                Ok(ExitCode::from(EXIT_PARTIAL))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Command::Versions { path, digit_run } => {
            let pattern = digit_run.map_or(VersionPattern::Prefixed, VersionPattern::NumericRun);
            let resolver = VersionResolver::new(&LocalFs, pattern);
            let current = resolver.current(path)?;
            let versions = resolver.list_versions(path)?;
            if versions.is_empty() {
                println!("no versions found on disk");
            }
            for v in versions {
                let marker = if v == current { "*" } else { " " };
                println!("{} {}", marker, v);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { init } => {
            if *init {
                let path = match &cli.config {
                    Some(path) => {
                        save_settings_to(settings, path)?;
                        path.clone()
                    }
                    None => {
                        ensure_dirs_exist().context("creating config directories")?;
                        save_settings(settings)?;
                        project_config_dir()
                            .map(|d| d.join("settings.toml"))
                            .unwrap_or_default()
                    }
                };
                eprintln!("wrote {}", path.display());
            }
            print!("{}", toml::to_string_pretty(settings)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Save the updated scene to `target`. Files were already transferred by
/// then, so when that fails the scene goes to `recovery_dir` instead.
fn save_scene(scene: &Scene, target: &Path, recovery_dir: Option<&Path>) -> anyhow::Result<()> {
    let Err(e) = scene.save(target) else {
        return Ok(());
    };
    tracing::error!(target = %target.display(), error = %e, "could not save scene");
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let recovered = recovery_dir
        .map(|dir| dir.join(format!("scene-{}.json", stamp)))
        .filter(|path| scene.save(path).is_ok());
    let message = match recovered {
        Some(path) => format!(
            "writing scene {}; files were already transferred, the updated scene was saved to {}",
            target.display(),
            path.display()
        ),
        None => format!(
            "writing scene {}; files were already transferred and the updated scene could not be saved",
            target.display()
        ),
    };
    Err(anyhow::Error::new(e).context(message))
}

fn scene_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.scene {
        Some(p) => Ok(p.clone()),
        None => bail!("this command needs --scene <FILE>"),
    }
}

/// Load the scene and snapshot its context once for the whole batch.
fn open_scene(cli: &Cli, settings: &Settings) -> anyhow::Result<(MemoryGraph, Context)> {
    let path = scene_path(cli)?;
    let mut scene =
        Scene::load(&path).with_context(|| format!("opening scene {}", path.display()))?;
    if scene.udim == UdimPolicy::Keep {
        scene.udim = settings.udim;
    }
    let graph = MemoryGraph::new(scene);
    let context = graph.context();
    Ok((graph, context))
}

fn build_session(
    rule: &RuleArgs,
    filters: &FilterArgs,
    settings: &Settings,
) -> anyhow::Result<Session> {
    if rule.last {
        let previous = match session_path() {
            Some(path) => load_session(&path)?,
            None => Session::default(),
        };
        return Ok(Session {
            rule: rule.apply_to(previous.rule),
            filters: filters.apply_to(previous.filters),
        });
    }
    if rule.method.is_none() {
        bail!("--method is required (or --last to reuse the previous rule)");
    }
    Ok(Session {
        rule: rule.apply_to(settings.rule_defaults(RewriteRule::default())),
        filters: filters.apply_to(settings.filter_defaults(Default::default())),
    })
}

fn load_session(path: &Path) -> anyhow::Result<Session> {
    Session::load(path).with_context(|| format!("loading session {}", path.display()))
}

fn save_session(session: &Session) {
    let Some(path) = session_path() else { return };
    if let Err(e) = session.save(&path) {
        tracing::warn!(error = %e, "could not save session");
    }
}

fn plan_for(
    graph: &MemoryGraph,
    context: &Context,
    session: &Session,
) -> anyhow::Result<crate::plan::ExecutionPlan> {
    let compiled = session.rule.validate()?;
    let collector = ReferenceCollector::new(session.filters.clone())?;
    let refs = collector.collect(graph, context, &LocalFs);
    Ok(plan(&refs, &compiled, context, &LocalFs))
}

fn confirm(steps: usize) -> anyhow::Result<bool> {
    if !Term::stderr().is_term() {
        bail!("refusing to apply without confirmation; pass --yes");
    }
    Ok(Confirm::new()
        .with_prompt(format!("Apply {} step(s)?", steps))
        .default(false)
        .interact()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    #[test]
    fn a_failed_scene_save_is_recovered() {
        let tmp = TempDir::new().unwrap();
        tmp.child("blocker").write_str("not a directory").unwrap();
        let target = tmp.path().join("blocker/scene.json");
        let recovery = tmp.path().join("recovered");

        let err = save_scene(&Scene::default(), &target, Some(&recovery)).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("already transferred"), "{message}");
        assert!(message.contains("recovered"), "{message}");
        let saved = std::fs::read_dir(&recovery).unwrap().count();
        assert_eq!(saved, 1);
    }

    #[test]
    fn a_scene_save_without_recovery_still_fails() {
        let tmp = TempDir::new().unwrap();
        tmp.child("blocker").write_str("x").unwrap();
        let target = tmp.path().join("blocker/scene.json");
        let err = save_scene(&Scene::default(), &target, None).unwrap_err();
        assert!(format!("{:#}", err).contains("could not be saved"));
    }
}
