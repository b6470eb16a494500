pub mod error;
pub mod helpers;
pub(crate) mod metadata;
pub mod mv;
pub mod stat;
pub mod test_helpers;
pub mod transfer;

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub use error::FsOpError;
pub use transfer::{transfer, TransferKind, Transferred};

/// Read-only queries against the filesystem. Planning and rewriting only
/// ever see this half, so building a preview cannot mutate anything.
pub trait FsProbe {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Entry names of `dir`, sorted. Unreadable or missing directories
    /// yield an empty list.
    fn list_dir(&self, dir: &Path) -> Vec<String>;

    /// Every regular file below `root`, depth first, sorted by file name.
    fn walk_files(&self, root: &Path) -> Vec<PathBuf>;
}

/// The mutating half of the filesystem collaborator, used by the executor.
pub trait Filesystem: FsProbe {
    fn create_dir_all(&self, dir: &Path) -> Result<(), FsOpError>;

    fn copy_file(&self, src: &Path, dst: &Path, overwrite: bool) -> Result<(), FsOpError>;

    fn move_file(&self, src: &Path, dst: &Path, overwrite: bool) -> Result<(), FsOpError>;

    /// Remove a file, or a directory with its contents.
    fn remove_path(&self, path: &Path) -> Result<(), FsOpError>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    fn check_destination(dst: &Path, overwrite: bool) -> Result<(), FsOpError> {
        if !overwrite && stat::exists(dst) {
            return Err(FsOpError::DestinationExists(dst.to_path_buf()));
        }
        Ok(())
    }
}

impl FsProbe for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        stat::exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        stat::is_dir(path)
    }

    fn list_dir(&self, dir: &Path) -> Vec<String> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    fn walk_files(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }
}

impl Filesystem for LocalFs {
    fn create_dir_all(&self, dir: &Path) -> Result<(), FsOpError> {
        fs::create_dir_all(dir).map_err(|e| FsOpError::from(e).with_paths(dir, dir))
    }

    fn copy_file(&self, src: &Path, dst: &Path, overwrite: bool) -> Result<(), FsOpError> {
        Self::check_destination(dst, overwrite)?;
        mv::copy_path(src, dst).map_err(|e| FsOpError::from(e).with_paths(src, dst))
    }

    fn move_file(&self, src: &Path, dst: &Path, overwrite: bool) -> Result<(), FsOpError> {
        Self::check_destination(dst, overwrite)?;
        mv::move_path(src, dst).map_err(|e| FsOpError::from(e).with_paths(src, dst))
    }

    fn remove_path(&self, path: &Path) -> Result<(), FsOpError> {
        let result = if stat::is_dir(path) {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|e| FsOpError::from(e).with_paths(path, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    #[test]
    fn list_dir_is_sorted_and_tolerates_missing_dirs() {
        let tmp = TempDir::new().unwrap();
        tmp.child("b.exr").touch().unwrap();
        tmp.child("a.exr").touch().unwrap();
        tmp.child("c").create_dir_all().unwrap();
        assert_eq!(LocalFs.list_dir(tmp.path()), vec!["a.exr", "b.exr", "c"]);
        assert!(LocalFs.list_dir(&tmp.path().join("nope")).is_empty());
    }

    #[test]
    fn walk_files_skips_directories() {
        let tmp = TempDir::new().unwrap();
        tmp.child("x/2.txt").touch().unwrap();
        tmp.child("x/1.txt").touch().unwrap();
        tmp.child("0.txt").touch().unwrap();
        let names: Vec<String> = LocalFs
            .walk_files(tmp.path())
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["0.txt", "x/1.txt", "x/2.txt"]);
    }

    #[test]
    fn copy_refuses_existing_destination_without_overwrite() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.child("src.txt");
        src.write_str("new").unwrap();
        let dst = tmp.child("dst.txt");
        dst.write_str("old").unwrap();

        let err = LocalFs.copy_file(src.path(), dst.path(), false).unwrap_err();
        assert!(matches!(err, FsOpError::DestinationExists(_)));
        dst.assert("old");

        LocalFs.copy_file(src.path(), dst.path(), true).unwrap();
        dst.assert("new");
        src.assert("new");
    }

    #[test]
    fn move_creates_parents_and_removes_source() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.child("a/src.txt");
        src.write_str("data").unwrap();
        let dst = tmp.child("b/c/dst.txt");
        LocalFs.move_file(src.path(), dst.path(), false).unwrap();
        dst.assert("data");
        src.assert(predicates::path::missing());
    }
}
