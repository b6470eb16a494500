//! Recognition, expansion and collapsing of path tokens.
//!
//! Recognized forms:
//! - `$NAME` / `${NAME}`: a variable looked up in the [`Context`].
//! - `$F`, `$F4`, `${F}`, `${F4}`: the current frame, optionally zero padded.
//! - `<UDIM>` and `%(UDIM)d`: a texture tile.
//!
//! Anything else is literal text. Unknown variables are left as written.

use std::collections::BTreeMap;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)|<UDIM>|%\(UDIM\)d")
        .expect("token regex")
});

static FRAME_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^F(\d*)$").expect("frame regex"));

/// What to do with UDIM tokens on expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UdimPolicy {
    /// Leave `<UDIM>` in place (the path stays a tile template).
    #[default]
    Keep,
    /// Substitute a concrete tile number, e.g. `1001`.
    Tile(u32),
}

/// Snapshot of the variable state a batch resolves against.
///
/// Captured once per batch so every reference sees the same values even if
/// the host changes its current file or frame mid-way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    vars: BTreeMap<String, String>,
    frame: Option<i64>,
    udim: UdimPolicy,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_var(name, value);
        self
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn with_frame(mut self, frame: i64) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn frame(&self) -> Option<i64> {
        self.frame
    }

    pub fn with_udim(mut self, udim: UdimPolicy) -> Self {
        self.udim = udim;
        self
    }

    pub fn udim(&self) -> UdimPolicy {
        self.udim
    }

    /// The same snapshot with frame and tile tokens left in place. Rewrites
    /// operate on this form so sequences keep their tokens.
    pub fn template(&self) -> Context {
        Context {
            vars: self.vars.clone(),
            frame: None,
            udim: UdimPolicy::Keep,
        }
    }
}

/// Kind of a recognized token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Variable(String),
    /// Frame number; `padding` 0 means unpadded.
    Frame { padding: usize },
    Udim,
}

/// A token and its byte range in the scanned string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    pub range: Range<usize>,
    pub kind: TokenKind,
}

/// Find every recognized token in `raw`, in order.
pub fn scan(raw: &str) -> Vec<TokenSpan> {
    TOKEN_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let kind = match caps.get(1).or_else(|| caps.get(2)) {
                Some(name) => match FRAME_NAME_RE.captures(name.as_str()) {
                    Some(f) => TokenKind::Frame {
                        padding: f[1].parse().unwrap_or(0),
                    },
                    None => TokenKind::Variable(name.as_str().to_string()),
                },
                None => TokenKind::Udim,
            };
            Some(TokenSpan {
                range: whole.range(),
                kind,
            })
        })
        .collect()
}

/// Substitute tokens in `raw` using `context`.
///
/// Frame tokens without a frame in the context, `<UDIM>` under
/// [`UdimPolicy::Keep`] and unknown variables pass through unchanged.
pub fn expand(raw: &str, context: &Context) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for span in scan(raw) {
        out.push_str(&raw[last..span.range.start]);
        let text = &raw[span.range.clone()];
        match &span.kind {
            TokenKind::Variable(name) => match context.var(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(text),
            },
            TokenKind::Frame { padding } => match context.frame() {
                Some(frame) => out.push_str(&format_frame(frame, *padding)),
                None => out.push_str(text),
            },
            TokenKind::Udim => match context.udim() {
                UdimPolicy::Keep => out.push_str(text),
                UdimPolicy::Tile(tile) => out.push_str(&tile.to_string()),
            },
        }
        last = span.range.end;
    }
    out.push_str(&raw[last..]);
    out
}

fn format_frame(frame: i64, padding: usize) -> String {
    if frame < 0 {
        format!("-{:0width$}", frame.unsigned_abs(), width = padding)
    } else {
        format!("{:0width$}", frame, width = padding)
    }
}

/// Names of variables in `raw` that `context` cannot resolve.
pub fn unresolved(raw: &str, context: &Context) -> Vec<String> {
    scan(raw)
        .into_iter()
        .filter_map(|span| match span.kind {
            TokenKind::Variable(name) if context.var(&name).is_none() => Some(name),
            _ => None,
        })
        .collect()
}

/// `true` if `raw` references at least one variable.
pub fn has_variables(raw: &str) -> bool {
    scan(raw)
        .iter()
        .any(|span| matches!(span.kind, TokenKind::Variable(_)))
}

/// Replace the longest variable value that prefixes `concrete` with its
/// token. The prefix must end on a path boundary; equally long values are
/// resolved by variable name so the result is deterministic.
///
/// A value ending in a separator leaves a remainder that starts with a name
/// character, so the token is braced there (`${HIP}tex`, not `$HIPtex`).
pub fn collapse(concrete: &str, context: &Context) -> String {
    let best = context
        .vars()
        .filter(|(_, value)| is_path_prefix(value, concrete))
        .max_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| b.0.cmp(a.0)));
    match best {
        Some((name, value)) => {
            let rest = &concrete[value.len()..];
            match rest.chars().next() {
                Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                    format!("${{{}}}{}", name, rest)
                }
                _ => format!("${}{}", name, rest),
            }
        }
        None => concrete.to_string(),
    }
}

fn is_path_prefix(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() || !path.starts_with(prefix) {
        return false;
    }
    if prefix.ends_with('/') || prefix.ends_with('\\') {
        return true;
    }
    matches!(path[prefix.len()..].chars().next(), None | Some('/') | Some('\\'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new()
            .with_var("HIP", "/proj/shot010")
            .with_var("JOB", "/proj")
    }

    #[test]
    fn expands_variables_in_both_spellings() {
        assert_eq!(expand("$HIP/tex/a.exr", &ctx()), "/proj/shot010/tex/a.exr");
        assert_eq!(expand("${JOB}/lib", &ctx()), "/proj/lib");
    }

    #[test]
    fn frame_tokens_need_a_frame() {
        assert_eq!(expand("$HIP/r.$F4.exr", &ctx()), "/proj/shot010/r.$F4.exr");
        let framed = ctx().with_frame(12);
        assert_eq!(expand("$HIP/r.$F4.exr", &framed), "/proj/shot010/r.0012.exr");
        assert_eq!(expand("r.$F.exr", &framed), "r.12.exr");
        assert_eq!(expand("r.${F3}.exr", &framed), "r.012.exr");
    }

    #[test]
    fn frame_like_variable_names_are_variables() {
        let spans = scan("$FOO/$F2");
        assert_eq!(spans[0].kind, TokenKind::Variable("FOO".into()));
        assert_eq!(spans[1].kind, TokenKind::Frame { padding: 2 });
    }

    #[test]
    fn udim_policy() {
        assert_eq!(expand("t.<UDIM>.tx", &ctx()), "t.<UDIM>.tx");
        let tiled = ctx().with_udim(UdimPolicy::Tile(1001));
        assert_eq!(expand("t.<UDIM>.tx", &tiled), "t.1001.tx");
        assert_eq!(expand("t.%(UDIM)d.tx", &tiled), "t.1001.tx");
    }

    #[test]
    fn unknown_tokens_pass_through() {
        assert_eq!(expand("$NOPE/a.exr", &ctx()), "$NOPE/a.exr");
        assert_eq!(unresolved("$NOPE/$HIP/$F4", &ctx()), vec!["NOPE".to_string()]);
        assert_eq!(expand("cost$5.exr", &ctx()), "cost$5.exr");
    }

    #[test]
    fn collapse_prefers_longest_value() {
        assert_eq!(collapse("/proj/shot010/tex/a.exr", &ctx()), "$HIP/tex/a.exr");
        assert_eq!(collapse("/proj/lib/a.exr", &ctx()), "$JOB/lib/a.exr");
        assert_eq!(collapse("/other/a.exr", &ctx()), "/other/a.exr");
    }

    #[test]
    fn collapse_respects_path_boundaries() {
        assert_eq!(collapse("/project/a.exr", &ctx()), "/project/a.exr");
        assert_eq!(collapse("/proj", &ctx()), "$JOB");
    }

    #[test]
    fn expand_then_collapse_round_trips() {
        for raw in ["$HIP/tex/a.<UDIM>.tx", "$JOB/geo/cube.$F4.bgeo.sc", "$HIP"] {
            assert_eq!(collapse(&expand(raw, &ctx()), &ctx()), raw);
        }
    }

    #[test]
    fn trailing_separator_values_keep_the_token_delimited() {
        let ctx = Context::new().with_var("HIP", "/proj/");
        let raw = "${HIP}tex/a.exr";
        assert_eq!(expand(raw, &ctx), "/proj/tex/a.exr");
        assert_eq!(collapse(&expand(raw, &ctx), &ctx), raw);
        assert_eq!(collapse("/proj/lib/a.exr", &ctx), "${HIP}lib/a.exr");
        assert_eq!(expand(&collapse("/proj/lib/a.exr", &ctx), &ctx), "/proj/lib/a.exr");
    }
}
