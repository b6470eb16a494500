//! File sequences and tile sets.
//!
//! A path containing frame or tile tokens is a template for many files on
//! disk. This module turns such templates into per-component regexes and
//! walks the filesystem through an [`FsProbe`] to list the concrete
//! members, capturing each token's value so the same values can be
//! rendered into another template (the destination of a copy or move).

use std::ops::Range;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::fs_op::FsProbe;
use crate::resolve::token::{self, TokenKind};

static PRINTF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#+|%0(\d+)d").expect("printf regex"));

/// What a hole in a template stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoleTag {
    Frame,
    Udim,
    Version,
}

/// A variable region of a template and the regex fragment it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hole {
    pub range: Range<usize>,
    pub pattern: String,
    pub tag: HoleTag,
}

/// A concrete path matching a template, with one capture per hole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch {
    pub path: String,
    pub captures: Vec<String>,
}

/// Frame and tile holes of `path`, sorted by position.
///
/// `$F<n>` accepts exactly n digits, or more without a leading zero for
/// frames that outgrow the padding. `$F` accepts any digits, `#`×n and
/// `%0nd` exactly n digits, tiles `1` followed by three digits.
pub fn sequence_holes(path: &str) -> Vec<Hole> {
    let mut holes: Vec<Hole> = token::scan(path)
        .into_iter()
        .filter_map(|span| match span.kind {
            TokenKind::Frame { padding } => Some(Hole {
                range: span.range,
                pattern: if padding == 0 {
                    r"-?\d+".to_string()
                } else {
                    format!(r"-?(?:\d{{{}}}|[1-9]\d{{{},}})", padding, padding)
                },
                tag: HoleTag::Frame,
            }),
            TokenKind::Udim => Some(Hole {
                range: span.range,
                pattern: r"1\d{3}".to_string(),
                tag: HoleTag::Udim,
            }),
            TokenKind::Variable(_) => None,
        })
        .collect();

    for caps in PRINTF_RE.captures_iter(path) {
        let Some(whole) = caps.get(0) else { continue };
        let width = match caps.get(1) {
            Some(w) => w.as_str().parse().unwrap_or(1),
            None => whole.len(),
        };
        holes.push(Hole {
            range: whole.range(),
            pattern: format!(r"\d{{{}}}", width),
            tag: HoleTag::Frame,
        });
    }
    holes.sort_by_key(|h| h.range.start);
    holes
}

/// `true` if `path` stands for a set of files rather than one.
pub fn is_sequence(path: &str) -> bool {
    !sequence_holes(path).is_empty()
}

/// List the files matching `path`. A plain path yields itself when it
/// exists; a template yields every member found on disk, sorted.
pub fn find_files<P: FsProbe + ?Sized>(probe: &P, path: &str) -> Vec<TemplateMatch> {
    scan(probe, path, &sequence_holes(path))
}

/// `true` if `path` exists, or for a template, if any member exists.
pub fn exists<P: FsProbe + ?Sized>(probe: &P, path: &str) -> bool {
    if is_sequence(path) {
        !find_files(probe, path).is_empty()
    } else {
        probe.exists(Path::new(path))
    }
}

/// Substitute `captures` into the holes of `template`.
/// Returns `None` when the counts differ.
pub fn render(template: &str, holes: &[Hole], captures: &[String]) -> Option<String> {
    if holes.len() != captures.len() {
        return None;
    }
    let mut out = template.to_string();
    for (hole, value) in holes.iter().zip(captures).rev() {
        out.replace_range(hole.range.clone(), value);
    }
    Some(out)
}

/// Walk the filesystem for paths matching `path` with `holes` (sorted,
/// each inside one path component) treated as regex fragments.
pub fn scan<P: FsProbe + ?Sized>(probe: &P, path: &str, holes: &[Hole]) -> Vec<TemplateMatch> {
    if holes.is_empty() {
        return if probe.exists(Path::new(path)) {
            vec![TemplateMatch {
                path: path.to_string(),
                captures: Vec::new(),
            }]
        } else {
            Vec::new()
        };
    }

    let mut frontier: Vec<(String, Vec<String>)> = vec![(String::new(), Vec::new())];
    for (index, comp) in components(path).into_iter().enumerate() {
        let inner: Vec<&Hole> = holes
            .iter()
            .filter(|h| h.range.start >= comp.start && h.range.end <= comp.end)
            .collect();

        if inner.is_empty() {
            let text = &path[comp];
            for (prefix, _) in frontier.iter_mut() {
                if index > 0 {
                    prefix.push('/');
                }
                prefix.push_str(text);
            }
            continue;
        }

        let Some(re) = component_regex(path, comp, &inner) else {
            return Vec::new();
        };
        let mut next = Vec::new();
        for (prefix, caps) in &frontier {
            let listing = match (index, prefix.is_empty()) {
                (0, _) => ".",
                (_, true) => "/",
                _ => prefix.as_str(),
            };
            for name in probe.list_dir(Path::new(listing)) {
                let Some(m) = re.captures(&name) else { continue };
                let mut caps = caps.clone();
                caps.extend(m.iter().skip(1).flatten().map(|g| g.as_str().to_string()));
                let joined = if index == 0 {
                    name.clone()
                } else {
                    format!("{}/{}", prefix, name)
                };
                next.push((joined, caps));
            }
        }
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }

    let mut found: Vec<TemplateMatch> = frontier
        .into_iter()
        .filter(|(p, _)| probe.exists(Path::new(p)))
        .map(|(path, captures)| TemplateMatch { path, captures })
        .collect();
    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}

fn components(path: &str) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in path.char_indices() {
        if c == '/' || c == '\\' {
            out.push(start..i);
            start = i + 1;
        }
    }
    out.push(start..path.len());
    out
}

fn component_regex(path: &str, comp: Range<usize>, holes: &[&Hole]) -> Option<Regex> {
    let mut text = String::from("^");
    let mut last = comp.start;
    for hole in holes {
        text.push_str(&regex::escape(&path[last..hole.range.start]));
        text.push('(');
        text.push_str(&hole.pattern);
        text.push(')');
        last = hole.range.end;
    }
    text.push_str(&regex::escape(&path[last..comp.end]));
    text.push('$');
    Regex::new(&text).ok()
}
