//! Rewrite rules: what the user asked for, and its validated form.

use serde::{Deserialize, Serialize};

use crate::errors::RuleError;
use crate::resolve::pattern::{PatternKind, PatternMatcher};
use crate::resolve::version::VersionPattern;

/// Transformation applied to every reference of a batch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    ReplaceRegex,
    ReplaceGlob,
    Copy,
    Move,
    #[default]
    Search,
    SetVersionLatest,
    SetVersionEarliest,
    SetVersion,
    SetDirectory,
    FindMissing,
    MakeRelative,
    MakeAbsolute,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::ReplaceRegex => "replace-regex",
            Method::ReplaceGlob => "replace-glob",
            Method::Copy => "copy",
            Method::Move => "move",
            Method::Search => "search",
            Method::SetVersionLatest => "set-version-latest",
            Method::SetVersionEarliest => "set-version-earliest",
            Method::SetVersion => "set-version",
            Method::SetDirectory => "set-directory",
            Method::FindMissing => "find-missing",
            Method::MakeRelative => "make-relative",
            Method::MakeAbsolute => "make-absolute",
        }
    }

    /// `true` for methods whose point is to change the stored spelling of a
    /// path rather than where it points.
    pub fn rewrites_spelling(self) -> bool {
        matches!(self, Method::MakeRelative | Method::MakeAbsolute)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-specified rewrite intent. Fields that the active method does not
/// use are ignored and never validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteRule {
    pub method: Method,
    pub pattern: String,
    pub replacement: String,
    pub match_case: bool,
    /// `search` only: treat `pattern` as a glob instead of a regex.
    pub glob: bool,
    /// Match and replace against the stored raw value instead of the
    /// resolved path.
    pub match_raw: bool,
    pub target_version: Option<u32>,
    pub version_pattern: VersionPattern,
    pub destination_root: Option<String>,
    pub preserve_relative_structure: bool,
    pub relative_root: Option<String>,
    pub overwrite: bool,
    pub search_root: Option<String>,
    pub anchor_variable: String,
    pub max_parents: usize,
}

impl Default for RewriteRule {
    fn default() -> Self {
        Self {
            method: Method::default(),
            pattern: String::new(),
            replacement: String::new(),
            match_case: false,
            glob: false,
            match_raw: false,
            target_version: None,
            version_pattern: VersionPattern::default(),
            destination_root: None,
            preserve_relative_structure: false,
            relative_root: None,
            overwrite: false,
            search_root: None,
            anchor_variable: "HIP".to_string(),
            max_parents: 0,
        }
    }
}

impl RewriteRule {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Check the parameters the active method needs and compile its
    /// pattern. Nothing is touched before this succeeds.
    pub fn validate(&self) -> Result<CompiledRule, RuleError> {
        let method = self.method.as_str();
        let require = |present: bool, field: &'static str| {
            if present {
                Ok(())
            } else {
                Err(RuleError::MissingParameter { method, field })
            }
        };

        let matcher = match self.method {
            Method::ReplaceRegex | Method::ReplaceGlob | Method::Search => {
                require(!self.pattern.is_empty(), "pattern")?;
                let kind = match self.method {
                    Method::ReplaceGlob => PatternKind::Glob,
                    Method::Search if self.glob => PatternKind::Glob,
                    _ => PatternKind::Regex,
                };
                Some(PatternMatcher::new(kind, &self.pattern, self.match_case, "pattern")?)
            }
            _ => None,
        };

        match self.method {
            Method::SetVersion => require(self.target_version.is_some(), "target_version")?,
            Method::Copy | Method::Move | Method::SetDirectory => {
                require(is_set(&self.destination_root), "destination_root")?;
                if self.preserve_relative_structure && self.method != Method::SetDirectory {
                    require(is_set(&self.relative_root), "relative_root")?;
                }
            }
            Method::FindMissing => require(is_set(&self.search_root), "search_root")?,
            Method::MakeRelative => require(!self.anchor_variable.is_empty(), "anchor_variable")?,
            _ => {}
        }

        Ok(CompiledRule {
            rule: self.clone(),
            matcher,
        })
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// A rule that passed validation, with its pattern compiled once for the
/// whole batch.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: RewriteRule,
    matcher: Option<PatternMatcher>,
}

impl CompiledRule {
    pub fn rule(&self) -> &RewriteRule {
        &self.rule
    }

    pub fn method(&self) -> Method {
        self.rule.method
    }

    pub fn matcher(&self) -> Option<&PatternMatcher> {
        self.matcher.as_ref()
    }
}
