//! Regex and glob matching of paths.
//!
//! Both modes are compiled once per batch. Globs go through `globset`: a
//! glob *match* is anchored to the whole path, while a glob *replacement*
//! substitutes every occurrence of the glob's unanchored regex, with the
//! replacement taken literally.

use globset::{GlobBuilder, GlobMatcher};
use regex::{bytes, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::errors::RuleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    #[default]
    Regex,
    Glob,
}

/// Result of testing or rewriting a single path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchResult {
    pub matched: bool,
    /// Capture groups of the first match (regex mode only; group 0 excluded).
    pub groups: Vec<Option<String>>,
    /// The rewritten path, when a replacement was requested and matched.
    pub replaced: Option<String>,
}

/// A compiled pattern from a rewrite rule.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    compiled: Compiled,
}

#[derive(Debug, Clone)]
enum Compiled {
    Regex(Regex),
    Glob {
        /// Whole-path matcher, used for searches.
        whole: GlobMatcher,
        /// The glob's regex without its anchors, used for replacement.
        fragment: bytes::Regex,
    },
}

impl PatternMatcher {
    /// Compile `pattern`. `field` names the rule field in the error.
    pub fn new(
        kind: PatternKind,
        pattern: &str,
        match_case: bool,
        field: &'static str,
    ) -> Result<Self, RuleError> {
        let compiled = match kind {
            PatternKind::Regex => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(!match_case)
                    .build()
                    .map_err(|source| RuleError::InvalidPattern {
                        field,
                        pattern: pattern.to_string(),
                        source,
                    })?;
                Compiled::Regex(regex)
            }
            PatternKind::Glob => {
                let glob = GlobBuilder::new(pattern)
                    .case_insensitive(!match_case)
                    .build()
                    .map_err(|source| RuleError::InvalidGlob {
                        field,
                        pattern: pattern.to_string(),
                        source,
                    })?;
                let fragment = bytes::Regex::new(&unanchored(glob.regex())).map_err(|source| {
                    RuleError::InvalidPattern {
                        field,
                        pattern: pattern.to_string(),
                        source,
                    }
                })?;
                Compiled::Glob {
                    whole: glob.compile_matcher(),
                    fragment,
                }
            }
        };
        Ok(Self { compiled })
    }

    pub fn kind(&self) -> PatternKind {
        match self.compiled {
            Compiled::Regex(_) => PatternKind::Regex,
            Compiled::Glob { .. } => PatternKind::Glob,
        }
    }

    /// Test `path` without rewriting it. Regexes search anywhere in the
    /// path, globs must match the whole path.
    pub fn is_match(&self, path: &str) -> bool {
        match &self.compiled {
            Compiled::Regex(regex) => regex.is_match(path),
            Compiled::Glob { whole, .. } => whole.is_match(path),
        }
    }

    /// Search mode: report whether `path` matches, with capture groups.
    pub fn search(&self, path: &str) -> MatchResult {
        if !self.is_match(path) {
            return MatchResult::default();
        }
        let groups = match &self.compiled {
            Compiled::Regex(regex) => regex
                .captures(path)
                .map(|caps| {
                    caps.iter()
                        .skip(1)
                        .map(|m| m.map(|m| m.as_str().to_string()))
                        .collect()
                })
                .unwrap_or_default(),
            Compiled::Glob { .. } => Vec::new(),
        };
        MatchResult {
            matched: true,
            groups,
            replaced: None,
        }
    }

    /// Replace every occurrence in `path`. Regex replacements may refer to
    /// groups as `$1` or `${name}`; glob replacements are literal.
    pub fn replace(&self, path: &str, replacement: &str) -> MatchResult {
        let replaced = match &self.compiled {
            Compiled::Regex(regex) => {
                if !regex.is_match(path) {
                    return MatchResult::default();
                }
                regex.replace_all(path, replacement).into_owned()
            }
            Compiled::Glob { fragment, .. } => {
                if !fragment.is_match(path.as_bytes()) {
                    return MatchResult::default();
                }
                let out = fragment.replace_all(path.as_bytes(), bytes::NoExpand(replacement.as_bytes()));
                String::from_utf8_lossy(&out).into_owned()
            }
        };
        MatchResult {
            matched: true,
            groups: Vec::new(),
            replaced: Some(replaced),
        }
    }
}

/// Drop the `^`/`$` anchors of a `globset` regex, keeping its leading
/// flag groups.
fn unanchored(regex: &str) -> String {
    let body = regex.strip_suffix('$').unwrap_or(regex);
    match body.find('^') {
        Some(at) => format!("{}{}", &body[..at], &body[at + 1..]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_replace_with_groups() {
        let m = PatternMatcher::new(PatternKind::Regex, r"tex/(\w+)_v1", true, "pattern").unwrap();
        let r = m.replace("/p/tex/wood_v1.exr", "maps/${1}_v2");
        assert!(r.matched);
        assert_eq!(r.replaced.as_deref(), Some("/p/maps/wood_v2.exr"));
    }

    #[test]
    fn regex_respects_match_case() {
        let sensitive = PatternMatcher::new(PatternKind::Regex, "TEX", true, "pattern").unwrap();
        assert!(!sensitive.is_match("/p/tex/a.exr"));
        let folded = PatternMatcher::new(PatternKind::Regex, "TEX", false, "pattern").unwrap();
        assert!(folded.is_match("/p/tex/a.exr"));
    }

    #[test]
    fn unmatched_path_is_not_rewritten() {
        let m = PatternMatcher::new(PatternKind::Regex, "nomatch", true, "pattern").unwrap();
        let r = m.replace("/p/a.exr", "x");
        assert!(!r.matched);
        assert!(r.replaced.is_none());
    }

    #[test]
    fn glob_search_is_anchored() {
        let m = PatternMatcher::new(PatternKind::Glob, "*.exr", true, "pattern").unwrap();
        assert!(m.is_match("/p/tex/a.exr"));
        assert!(!m.is_match("/p/tex/a.exr.bak"));
        let m =
            PatternMatcher::new(PatternKind::Glob, "/p/tex/[ab]?.EXR", false, "pattern").unwrap();
        assert!(m.is_match("/p/tex/a1.exr"));
        assert!(!m.is_match("/p/tex/c1.exr"));
    }

    #[test]
    fn glob_replacement_is_literal() {
        let m = PatternMatcher::new(PatternKind::Glob, "textures", true, "pattern").unwrap();
        let r = m.replace("$HIP/textures/a.exr", "maps$1");
        assert_eq!(r.replaced.as_deref(), Some("$HIP/maps$1/a.exr"));
    }

    #[test]
    fn glob_literals_are_not_regex_syntax() {
        let m = PatternMatcher::new(PatternKind::Glob, "v1.(a)+", true, "pattern").unwrap();
        let r = m.replace("/p/v1.(a)+/x.exr", "v2");
        assert_eq!(r.replaced.as_deref(), Some("/p/v2/x.exr"));
        assert!(!m.replace("/p/v1x(a)/x.exr", "v2").matched);
    }

    #[test]
    fn glob_replacement_respects_wildcards_and_case() {
        let m = PatternMatcher::new(PatternKind::Glob, "v[!0]?", false, "pattern").unwrap();
        let r = m.replace("/p/V12/shot_v30.exr", "vXX");
        assert_eq!(r.replaced.as_deref(), Some("/p/vXX/shot_vXX.exr"));
    }

    #[test]
    fn search_returns_groups() {
        let m = PatternMatcher::new(PatternKind::Regex, r"_v(\d+)", true, "pattern").unwrap();
        let r = m.search("/p/shot_v012.exr");
        assert!(r.matched);
        assert_eq!(r.groups, vec![Some("012".to_string())]);
    }

    #[test]
    fn invalid_regex_names_the_field() {
        let err = PatternMatcher::new(PatternKind::Regex, "(", true, "pattern").unwrap_err();
        match err {
            RuleError::InvalidPattern { field, pattern, .. } => {
                assert_eq!(field, "pattern");
                assert_eq!(pattern, "(");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_glob_is_rejected_by_the_glob_parser() {
        for bad in ["[z-a]", "a[b"] {
            let err = PatternMatcher::new(PatternKind::Glob, bad, true, "pattern").unwrap_err();
            assert!(
                matches!(err, RuleError::InvalidGlob { field: "pattern", .. }),
                "{bad}: {err}"
            );
        }
    }
}
