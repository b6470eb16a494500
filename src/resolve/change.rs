use serde::Serialize;

/// Filesystem work a change needs before its parameter can be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileOp {
    None,
    Copy,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeStatus {
    Pending,
    NoOp,
    Conflict,
    WouldOverwrite,
}

impl ChangeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeStatus::Pending => "pending",
            ChangeStatus::NoOp => "no-op",
            ChangeStatus::Conflict => "conflict",
            ChangeStatus::WouldOverwrite => "would-overwrite",
        }
    }
}

/// Why a change is unchanged, excluded or flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "detail")]
pub enum ChangeNote {
    EmptyValue,
    Expression,
    NoMatch,
    SearchHit,
    NoVersionToken,
    NoVersionsFound,
    SourceMissing,
    NotMissing,
    NotFound,
    OutsideAnchor,
    UnresolvedToken(String),
    /// Another source resolves to the same destination.
    SharedDestination,
    DestinationExists,
    /// Part of a chain of moves that loops back on itself.
    MoveCycle,
}

impl std::fmt::Display for ChangeNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeNote::EmptyValue => f.write_str("empty value"),
            ChangeNote::Expression => f.write_str("expression"),
            ChangeNote::NoMatch => f.write_str("no match"),
            ChangeNote::SearchHit => f.write_str("search hit"),
            ChangeNote::NoVersionToken => f.write_str("no version token"),
            ChangeNote::NoVersionsFound => f.write_str("no versions on disk"),
            ChangeNote::SourceMissing => f.write_str("source missing"),
            ChangeNote::NotMissing => f.write_str("file exists"),
            ChangeNote::NotFound => f.write_str("not found under search root"),
            ChangeNote::OutsideAnchor => f.write_str("too many parent hops"),
            ChangeNote::UnresolvedToken(name) => write!(f, "unresolved ${}", name),
            ChangeNote::SharedDestination => f.write_str("shared destination"),
            ChangeNote::DestinationExists => f.write_str("destination exists"),
            ChangeNote::MoveCycle => f.write_str("move cycle"),
        }
    }
}

/// Outcome of applying a rule to one reference. Never omitted: a rule that
/// does not apply yields a `NoOp` descriptor with a note saying why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeDescriptor {
    /// Index of the reference in its collection pass.
    pub reference: usize,
    pub node: String,
    pub parm: String,
    pub old_raw: String,
    pub new_raw: String,
    /// Resolved paths, with frame and tile tokens kept.
    pub old_path: String,
    pub new_path: String,
    pub file_op: FileOp,
    pub status: ChangeStatus,
    pub notes: Vec<ChangeNote>,
    /// Matched a `search` rule; for display only.
    pub highlighted: bool,
    /// Set by the caller to execute a `Conflict`/`WouldOverwrite` change.
    pub forced: bool,
}

impl ChangeDescriptor {
    pub fn is_noop(&self) -> bool {
        self.status == ChangeStatus::NoOp
    }

    /// Flagged changes can be forced, except members of a move cycle:
    /// running those would destroy one of the files.
    pub fn can_force(&self) -> bool {
        matches!(self.status, ChangeStatus::Conflict | ChangeStatus::WouldOverwrite)
            && !self.notes.contains(&ChangeNote::MoveCycle)
    }

    /// `true` when the executor should run this change.
    pub fn is_executable(&self) -> bool {
        match self.status {
            ChangeStatus::Pending => true,
            ChangeStatus::NoOp => false,
            ChangeStatus::Conflict | ChangeStatus::WouldOverwrite => {
                self.forced && self.can_force()
            }
        }
    }

    pub(crate) fn flag(&mut self, status: ChangeStatus, note: ChangeNote) {
        self.status = status;
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }
}
