use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by filesystem collaborators and the transfer helpers.
#[derive(Error, Debug)]
pub enum FsOpError {
    /// Wrapper for underlying IO errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context message.
    #[error("Filesystem operation failed: {0}")]
    Message(String),

    /// Contextual error that includes source and destination paths.
    #[error("Operation failed from `{src}` to `{dst}`: {msg}")]
    PathContext {
        src: PathBuf,
        dst: PathBuf,
        msg: String,
    },

    /// The destination exists and overwriting was not requested.
    #[error("Destination already exists: `{0}`")]
    DestinationExists(PathBuf),

    /// Nothing on disk matched a source path or sequence template.
    #[error("No files match `{0}`")]
    SourceMissing(String),
}

impl FsOpError {
    /// Attach `src`/`dst` to an error that lacks them.
    pub fn with_paths(self, src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Self {
        match self {
            FsOpError::Io(e) => FsOpError::PathContext {
                src: src.into(),
                dst: dst.into(),
                msg: e.to_string(),
            },
            FsOpError::Message(msg) => FsOpError::PathContext {
                src: src.into(),
                dst: dst.into(),
                msg,
            },
            other => other,
        }
    }
}

impl From<String> for FsOpError {
    fn from(s: String) -> Self {
        FsOpError::Message(s)
    }
}
