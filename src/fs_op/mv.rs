use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::fs_op::helpers::{atomic_copy_file, atomic_rename_or_copy, ensure_parent_exists};

/// Errors returned by the copy/move helpers.
#[derive(Debug)]
pub enum MvError {
    Io(std::io::Error),
    SourceMissing(PathBuf),
    DestinationExists(PathBuf),
}

impl fmt::Display for MvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MvError::Io(e) => write!(f, "IO error: {}", e),
            MvError::SourceMissing(p) => write!(f, "source does not exist: {}", p.display()),
            MvError::DestinationExists(p) => write!(f, "destination exists: {}", p.display()),
        }
    }
}

impl std::error::Error for MvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MvError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MvError {
    fn from(e: std::io::Error) -> Self {
        MvError::Io(e)
    }
}

impl From<MvError> for crate::fs_op::error::FsOpError {
    fn from(e: MvError) -> Self {
        use crate::fs_op::error::FsOpError;
        match e {
            MvError::Io(e) => FsOpError::Io(e),
            MvError::SourceMissing(p) => FsOpError::SourceMissing(p.display().to_string()),
            MvError::DestinationExists(p) => FsOpError::DestinationExists(p),
        }
    }
}

/// Copy `src` to exactly `dest`. Directories are mirrored recursively,
/// regular files go through the atomic copy helper. Unlike a shell `cp`,
/// an existing directory at `dest` is not copied *into*.
pub fn copy_path<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dest: Q) -> Result<(), MvError> {
    let s = src.as_ref();
    let d = dest.as_ref();
    if !s.exists() {
        return Err(MvError::SourceMissing(s.to_path_buf()));
    }

    if s.is_dir() {
        fs::create_dir_all(d)?;
        for entry in WalkDir::new(s).min_depth(1).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| MvError::Io(io::Error::other(e)))?;
            let from = entry.path();
            let rel = from
                .strip_prefix(s)
                .map_err(|e| MvError::Io(io::Error::other(e)))?;
            let target = d.join(rel);
            let ft = entry.file_type();
            if ft.is_dir() {
                fs::create_dir_all(&target)?;
            } else if ft.is_file() {
                ensure_parent_exists(&target)?;
                atomic_copy_file(from, &target)?;
            }
            // Other file types (symlinks, device nodes) are skipped.
        }
        crate::fs_op::metadata::preserve_all_metadata(s, d)?;
    } else {
        ensure_parent_exists(d)?;
        atomic_copy_file(s, d)?;
    }
    Ok(())
}

/// Move `src` to exactly `dest`, falling back to copy+remove when a plain
/// rename is not possible (cross-device moves).
pub fn move_path<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dest: Q) -> Result<(), MvError> {
    let s = src.as_ref();
    let d = dest.as_ref();
    if !s.exists() {
        return Err(MvError::SourceMissing(s.to_path_buf()));
    }
    ensure_parent_exists(d)?;
    atomic_rename_or_copy(s, d).map_err(|e| {
        MvError::Io(io::Error::other(format!(
            "moving {} -> {}: {}",
            s.display(),
            d.display(),
            e
        )))
    })
}
