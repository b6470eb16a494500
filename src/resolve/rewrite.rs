//! Per-reference rewrite: a rule and a context in, a change descriptor out.
//!
//! The rewriter is pure with respect to the outside world. It may look at
//! the disk through an [`FsProbe`] (sibling versions, source existence, the
//! find-missing search) but never mutates anything, so previews can be
//! rebuilt freely.
//!
//! Paths are handled in their *template* form: variables expanded, frame
//! and tile tokens kept. That keeps a rewritten sequence a sequence.

use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;
use regex::Regex;

use crate::fs_op::FsProbe;
use crate::graph::PathReference;
use crate::resolve::change::{ChangeDescriptor, ChangeNote, ChangeStatus, FileOp};
use crate::resolve::rule::{CompiledRule, Method};
use crate::resolve::sequence;
use crate::resolve::token::{self, Context};
use crate::resolve::version::VersionResolver;

/// What a method produced for one reference.
enum Rewrite {
    /// A new location; the raw value is derived from it.
    Path(String),
    /// A new raw spelling, given directly.
    Raw(String),
    /// The method does not apply.
    Skip(ChangeNote),
}

pub struct PathRewriter<'a> {
    rule: &'a CompiledRule,
    context: &'a Context,
    template: Context,
    probe: &'a dyn FsProbe,
    /// Files under `search_root`, walked once per batch on first use.
    search_index: OnceCell<Vec<PathBuf>>,
}

impl<'a> PathRewriter<'a> {
    pub fn new(rule: &'a CompiledRule, context: &'a Context, probe: &'a dyn FsProbe) -> Self {
        Self {
            rule,
            context,
            template: context.template(),
            probe,
            search_index: OnceCell::new(),
        }
    }

    pub fn rule(&self) -> &CompiledRule {
        self.rule
    }

    /// Apply the rule to `reference`. Always returns a descriptor; when the
    /// rule does not apply it is a `NoOp` carrying the reason.
    pub fn apply(&self, reference: &PathReference) -> ChangeDescriptor {
        let old_path = reference.template(self.context);
        let mut change = ChangeDescriptor {
            reference: reference.index,
            node: reference.node.clone(),
            parm: reference.parm.clone(),
            old_raw: reference.raw.clone(),
            new_raw: reference.raw.clone(),
            old_path: old_path.clone(),
            new_path: old_path.clone(),
            file_op: FileOp::None,
            status: ChangeStatus::NoOp,
            notes: Vec::new(),
            highlighted: false,
            forced: false,
        };

        if reference.empty || reference.raw.trim().is_empty() {
            change.notes.push(ChangeNote::EmptyValue);
            return change;
        }
        if reference.expression {
            change.notes.push(ChangeNote::Expression);
            return change;
        }
        for name in token::unresolved(&reference.raw, self.context) {
            change.notes.push(ChangeNote::UnresolvedToken(name));
        }

        let method = self.rule.method();
        if method == Method::Search {
            let subject = self.subject(reference, &old_path);
            let hit = self
                .rule
                .matcher()
                .is_some_and(|m| m.search(subject).matched);
            change.highlighted = hit;
            change.notes.push(if hit {
                ChangeNote::SearchHit
            } else {
                ChangeNote::NoMatch
            });
            return change;
        }

        let (new_raw, new_path) = match self.rewrite(reference, &old_path) {
            Rewrite::Skip(note) => {
                change.notes.push(note);
                return change;
            }
            Rewrite::Path(path) => (self.recollapse(&reference.raw, &path), path),
            Rewrite::Raw(raw) => {
                let path = if method.rewrites_spelling() {
                    old_path.clone()
                } else {
                    token::expand(&raw, &self.template)
                };
                (raw, path)
            }
        };

        let unchanged = if method.rewrites_spelling() {
            new_raw == reference.raw
        } else {
            new_path == old_path
        };
        if unchanged {
            tracing::trace!(node = %reference.node, parm = %reference.parm, "unchanged");
            return change;
        }

        change.new_raw = new_raw;
        change.new_path = new_path;
        change.status = ChangeStatus::Pending;
        change.file_op = match method {
            Method::Copy => FileOp::Copy,
            Method::Move => FileOp::Move,
            _ => FileOp::None,
        };
        change
    }

    /// The string patterns are matched against.
    fn subject<'r>(&self, reference: &'r PathReference, old_path: &'r str) -> &'r str {
        if self.rule.rule().match_raw {
            &reference.raw
        } else {
            old_path
        }
    }

    fn rewrite(&self, reference: &PathReference, old_path: &str) -> Rewrite {
        let rule = self.rule.rule();
        match rule.method {
            Method::ReplaceRegex | Method::ReplaceGlob => {
                let Some(matcher) = self.rule.matcher() else {
                    return Rewrite::Skip(ChangeNote::NoMatch);
                };
                let subject = self.subject(reference, old_path);
                match matcher.replace(subject, &rule.replacement).replaced {
                    Some(out) if rule.match_raw => Rewrite::Raw(out),
                    Some(out) => Rewrite::Path(out),
                    None => Rewrite::Skip(ChangeNote::NoMatch),
                }
            }
            Method::Copy | Method::Move => {
                if !sequence::exists(self.probe, old_path) {
                    return Rewrite::Skip(ChangeNote::SourceMissing);
                }
                Rewrite::Path(self.destination(old_path))
            }
            Method::SetDirectory => {
                let dir = self.expand_opt(&rule.destination_root);
                Rewrite::Path(normalize(&join(&dir, file_name(old_path))))
            }
            Method::SetVersionLatest | Method::SetVersionEarliest => {
                let resolver = VersionResolver::new(self.probe, rule.version_pattern);
                let found = if rule.method == Method::SetVersionLatest {
                    resolver.latest(old_path)
                } else {
                    resolver.earliest(old_path)
                };
                match found {
                    Ok(Some(path)) => Rewrite::Path(path),
                    Ok(None) => Rewrite::Skip(ChangeNote::NoVersionsFound),
                    Err(_) => Rewrite::Skip(ChangeNote::NoVersionToken),
                }
            }
            Method::SetVersion => {
                let resolver = VersionResolver::new(self.probe, rule.version_pattern);
                let Some(n) = rule.target_version else {
                    return Rewrite::Skip(ChangeNote::NoVersionToken);
                };
                match resolver.set_version(old_path, n) {
                    Ok(path) => Rewrite::Path(path),
                    Err(_) => Rewrite::Skip(ChangeNote::NoVersionToken),
                }
            }
            Method::FindMissing => self.find_missing(old_path),
            Method::MakeRelative => self.make_relative(old_path),
            Method::MakeAbsolute => Rewrite::Raw(old_path.to_string()),
            Method::Search => Rewrite::Skip(ChangeNote::NoMatch),
        }
    }

    /// Destination of a copy/move: the file name (or the path below
    /// `relative_root`) placed under `destination_root`.
    fn destination(&self, old_path: &str) -> String {
        let rule = self.rule.rule();
        let root = self.expand_opt(&rule.destination_root);
        let mut tail = file_name(old_path).to_string();
        if rule.preserve_relative_structure {
            let base = normalize(&self.expand_opt(&rule.relative_root));
            if let Some(rest) = strip_dir_prefix(&normalize(old_path), &base) {
                if !rest.is_empty() {
                    tail = rest.to_string();
                }
            }
        }
        normalize(&join(&root, &tail))
    }

    fn find_missing(&self, old_path: &str) -> Rewrite {
        if sequence::exists(self.probe, old_path) {
            return Rewrite::Skip(ChangeNote::NotMissing);
        }
        let name = file_name(old_path);
        let Some(wanted) = file_name_regex(name) else {
            return Rewrite::Skip(ChangeNote::NotFound);
        };
        let index = self.search_index.get_or_init(|| {
            let root = self.expand_opt(&self.rule.rule().search_root);
            let files = self.probe.walk_files(Path::new(&root));
            tracing::debug!(root = %root, files = files.len(), "indexed search root");
            files
        });
        let hit = index.iter().find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| wanted.is_match(n))
        });
        match hit.and_then(|p| p.parent()) {
            Some(dir) => Rewrite::Path(join(&dir.to_string_lossy(), name)),
            None => Rewrite::Skip(ChangeNote::NotFound),
        }
    }

    fn make_relative(&self, old_path: &str) -> Rewrite {
        let rule = self.rule.rule();
        let anchor = rule.anchor_variable.as_str();
        let Some(root) = self.context.var(anchor) else {
            return Rewrite::Skip(ChangeNote::UnresolvedToken(anchor.to_string()));
        };
        let Some((relative, parents)) = relative_to(&normalize(old_path), &normalize(root)) else {
            return Rewrite::Skip(ChangeNote::OutsideAnchor);
        };
        if parents > rule.max_parents {
            return Rewrite::Skip(ChangeNote::OutsideAnchor);
        }
        if relative.is_empty() {
            Rewrite::Raw(format!("${}", anchor))
        } else {
            Rewrite::Raw(format!("${}/{}", anchor, relative))
        }
    }

    fn expand_opt(&self, value: &Option<String>) -> String {
        token::expand(value.as_deref().unwrap_or_default().trim(), &self.template)
    }

    /// Raw spelling for a rewritten path: re-tokenized when the original
    /// used variables, so `$HIP`-relative references stay portable.
    fn recollapse(&self, old_raw: &str, new_path: &str) -> String {
        if token::has_variables(old_raw) {
            token::collapse(new_path, self.context)
        } else {
            new_path.to_string()
        }
    }
}

fn is_sep(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Last component of `path`.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_sep);
    match trimmed.rfind(is_sep) {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

fn join(dir: &str, tail: &str) -> String {
    if dir.is_empty() {
        tail.to_string()
    } else if dir.ends_with(is_sep) {
        format!("{}{}", dir, tail)
    } else {
        format!("{}/{}", dir, tail)
    }
}

/// Lexically normalize `path`: collapse repeated separators, `.` and
/// `..` components. Separators become `/`. Leading `..` of a relative
/// path are kept; `..` above the root of an absolute path is dropped.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with(is_sep);
    let mut parts: Vec<&str> = Vec::new();
    for comp in path.split(is_sep) {
        match comp {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let body = parts.join("/");
    match (absolute, body.is_empty()) {
        (true, _) => format!("/{}", body),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}

/// The part of `path` below directory `dir`, if `path` lies under it.
fn strip_dir_prefix<'p>(path: &'p str, dir: &str) -> Option<&'p str> {
    if dir == "/" {
        return path.strip_prefix('/');
    }
    let rest = path.strip_prefix(dir)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

/// Relative spelling of normalized `path` from normalized `root`, with the
/// number of `..` hops it needs. `None` when one is absolute and the other
/// is not.
fn relative_to(path: &str, root: &str) -> Option<(String, usize)> {
    if path.starts_with('/') != root.starts_with('/') {
        return None;
    }
    let split = |s: &str| -> Vec<String> {
        s.split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(str::to_string)
            .collect()
    };
    let (p, r) = (split(path), split(root));
    let common = p.iter().zip(&r).take_while(|(a, b)| a == b).count();
    let parents = r.len() - common;
    let mut parts: Vec<String> = vec!["..".to_string(); parents];
    parts.extend(p[common..].iter().cloned());
    Some((parts.join("/"), parents))
}

/// Regex accepting concrete file names for `name`, with frame and tile
/// tokens as wildcards.
fn file_name_regex(name: &str) -> Option<Regex> {
    let holes = sequence::sequence_holes(name);
    let mut text = String::from("^");
    let mut last = 0;
    for hole in &holes {
        text.push_str(&regex::escape(&name[last..hole.range.start]));
        text.push_str(&hole.pattern);
        last = hole.range.end;
    }
    text.push_str(&regex::escape(&name[last..]));
    text.push('$');
    Regex::new(&text).ok()
}
