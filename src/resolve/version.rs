//! Version tokens in paths.
//!
//! Canonical convention: a version is a `v` followed by digits, placed at
//! the start of a path component or right after `.`, `_` or `-`
//! (`/shots/v003/cube_v003.bgeo`). Every such token in the path is treated
//! as the same version and rewritten together. Alternatively a rule may
//! pick the n-th bare digit run of the file name ([`VersionPattern::NumericRun`]).
//!
//! Siblings are found by replacing each version token (and any frame or
//! tile token) with a wildcard and scanning the disk. A sibling only counts
//! when all of its version tokens carry the same number.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fs_op::FsProbe;
use crate::resolve::sequence::{self, Hole, HoleTag};

static PREFIXED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[/\\._\-])v(\d+)").expect("version regex"));
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digits regex"));

/// Where the version number lives in a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionPattern {
    /// `v` + digits after a separator, anywhere in the path.
    #[default]
    Prefixed,
    /// The n-th (0-based) run of digits in the file name, ignoring digits
    /// that belong to frame or tile tokens.
    NumericRun(usize),
}

/// The path carries no version token under the active pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no version token in `{0}`")]
pub struct NoVersionToken(pub String);

/// Byte ranges of the version digits in `path`.
pub fn version_spans(path: &str, pattern: VersionPattern) -> Vec<Range<usize>> {
    match pattern {
        VersionPattern::Prefixed => PREFIXED_RE
            .captures_iter(path)
            .filter_map(|c| c.get(1).map(|m| m.range()))
            .collect(),
        VersionPattern::NumericRun(index) => {
            let name_start = path.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
            let masked: Vec<Range<usize>> = sequence::sequence_holes(path)
                .into_iter()
                .map(|h| h.range)
                .collect();
            DIGITS_RE
                .find_iter(&path[name_start..])
                .map(|m| (m.start() + name_start)..(m.end() + name_start))
                .filter(|r| !masked.iter().any(|h| h.start < r.end && r.start < h.end))
                .nth(index)
                .into_iter()
                .collect()
        }
    }
}

/// Rewrite every version token of `path` to `n`, keeping each token's
/// digit width unless `n` needs more digits.
pub fn set_version_with(
    path: &str,
    n: u32,
    pattern: VersionPattern,
) -> Result<String, NoVersionToken> {
    let spans = version_spans(path, pattern);
    if spans.is_empty() {
        return Err(NoVersionToken(path.to_string()));
    }
    Ok(render(path, &spans, n, None))
}

/// [`set_version_with`] using the canonical `v###` convention.
pub fn set_version(path: &str, n: u32) -> Result<String, NoVersionToken> {
    set_version_with(path, n, VersionPattern::Prefixed)
}

fn render(path: &str, spans: &[Range<usize>], n: u32, width: Option<usize>) -> String {
    let mut out = path.to_string();
    for span in spans.iter().rev() {
        let w = width.unwrap_or(span.len());
        out.replace_range(span.clone(), &format!("{:0w$}", n, w = w));
    }
    out
}

/// Finds and applies versions, scanning siblings through a probe.
pub struct VersionResolver<'a> {
    probe: &'a dyn FsProbe,
    pattern: VersionPattern,
}

impl<'a> VersionResolver<'a> {
    pub fn new(probe: &'a dyn FsProbe, pattern: VersionPattern) -> Self {
        Self { probe, pattern }
    }

    /// The version number of `path` (its last version token).
    pub fn current(&self, path: &str) -> Result<u32, NoVersionToken> {
        version_spans(path, self.pattern)
            .last()
            .and_then(|r| path[r.clone()].parse().ok())
            .ok_or_else(|| NoVersionToken(path.to_string()))
    }

    /// Sibling versions found on disk as `(number, digit width)`, ascending.
    fn siblings(&self, path: &str) -> Result<Vec<(u32, usize)>, NoVersionToken> {
        let spans = version_spans(path, self.pattern);
        if spans.is_empty() {
            return Err(NoVersionToken(path.to_string()));
        }
        let mut holes: Vec<Hole> = spans
            .into_iter()
            .map(|range| Hole {
                range,
                pattern: r"\d+".to_string(),
                tag: HoleTag::Version,
            })
            .collect();
        holes.extend(sequence::sequence_holes(path));
        holes.sort_by_key(|h| h.range.start);

        let mut found: Vec<(u32, usize)> = sequence::scan(self.probe, path, &holes)
            .into_iter()
            .filter_map(|m| {
                let digits: Vec<&str> = holes
                    .iter()
                    .zip(&m.captures)
                    .filter(|(h, _)| h.tag == HoleTag::Version)
                    .map(|(_, c)| c.as_str())
                    .collect();
                let numbers: Vec<u32> = digits.iter().filter_map(|d| d.parse().ok()).collect();
                let first = *numbers.first()?;
                if numbers.len() != digits.len() || numbers.iter().any(|&n| n != first) {
                    return None;
                }
                let width = digits.iter().map(|d| d.len()).max().unwrap_or(0);
                Some((first, width))
            })
            .collect();
        found.sort_unstable();
        Ok(found)
    }

    /// All version numbers present on disk for `path`'s template, ascending.
    pub fn list_versions(&self, path: &str) -> Result<Vec<u32>, NoVersionToken> {
        let mut versions: Vec<u32> = self.siblings(path)?.into_iter().map(|(n, _)| n).collect();
        versions.dedup();
        Ok(versions)
    }

    /// Rewrite `path` to the highest version on disk, padded to the widest
    /// sibling's digit width. `Ok(None)` when no sibling exists.
    pub fn latest(&self, path: &str) -> Result<Option<String>, NoVersionToken> {
        let siblings = self.siblings(path)?;
        Ok(self.pick(path, &siblings, siblings.iter().map(|s| s.0).max()))
    }

    /// Like [`Self::latest`] but picks the lowest version.
    pub fn earliest(&self, path: &str) -> Result<Option<String>, NoVersionToken> {
        let siblings = self.siblings(path)?;
        Ok(self.pick(path, &siblings, siblings.iter().map(|s| s.0).min()))
    }

    /// Rewrite `path` to version `n`, keeping the original digit width.
    pub fn set_version(&self, path: &str, n: u32) -> Result<String, NoVersionToken> {
        set_version_with(path, n, self.pattern)
    }

    fn pick(&self, path: &str, siblings: &[(u32, usize)], n: Option<u32>) -> Option<String> {
        let n = n?;
        let widest = siblings.iter().map(|s| s.1).max().unwrap_or(0);
        let width = widest.max(n.to_string().len());
        Some(render(path, &version_spans(path, self.pattern), n, Some(width)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_is_preserved() {
        assert_eq!(set_version("shot_v003.exr", 7).unwrap(), "shot_v007.exr");
    }

    #[test]
    fn width_expands_but_never_truncates() {
        assert_eq!(set_version("shot_v003.exr", 12345).unwrap(), "shot_v12345.exr");
    }

    #[test]
    fn every_token_moves_together() {
        assert_eq!(
            set_version("/geo/v002/cube_v002.bgeo.sc", 10).unwrap(),
            "/geo/v010/cube_v010.bgeo.sc"
        );
    }

    #[test]
    fn missing_token_is_reported() {
        assert_eq!(
            set_version("/tex/wood.exr", 2),
            Err(NoVersionToken("/tex/wood.exr".to_string()))
        );
        // "dev1" is not a version: `v` must follow a separator.
        assert!(version_spans("/dev1/a.exr", VersionPattern::Prefixed).is_empty());
    }

    #[test]
    fn numeric_run_skips_frame_tokens() {
        let path = "/out/plate_012.$F4.exr";
        let spans = version_spans(path, VersionPattern::NumericRun(0));
        assert_eq!(spans.len(), 1);
        assert_eq!(&path[spans[0].clone()], "012");
        assert_eq!(
            set_version_with(path, 13, VersionPattern::NumericRun(0)).unwrap(),
            "/out/plate_013.$F4.exr"
        );
    }
}
