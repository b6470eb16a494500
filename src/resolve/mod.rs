//! The rewrite engine: tokens, patterns, versions and sequences, and the
//! per-reference rewriter built from them.

pub mod change;
pub mod pattern;
pub mod rewrite;
pub mod rule;
pub mod sequence;
pub mod token;
pub mod version;

pub use change::{ChangeDescriptor, ChangeNote, ChangeStatus, FileOp};
pub use pattern::{MatchResult, PatternKind, PatternMatcher};
pub use rewrite::PathRewriter;
pub use rule::{CompiledRule, Method, RewriteRule};
pub use token::{Context, UdimPolicy};
pub use version::{NoVersionToken, VersionPattern, VersionResolver};
