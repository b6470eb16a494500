use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use fs_extra::file::{copy as fs_extra_copy, CopyOptions};

use crate::fs_op::test_helpers;

/// Buffer size used for file copies (64 KiB).
const COPY_BUFFER: usize = 64 * 1024;

/// Ensure parent directory exists for a path.
pub fn ensure_parent_exists(p: &Path) -> io::Result<()> {
    if let Some(parent) = p.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Build a hidden temp path next to `target` named `<prefix>.<suffix>`.
///
/// The suffix mixes pid, time, a hash of the thread id and a global
/// sequence number so rapid or concurrent calls never collide.
fn temp_sibling(dir: &Path, prefix: &str) -> PathBuf {
    static NEXT_ID: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    format!("{:?}", std::thread::current().id()).hash(&mut hasher);
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let raw = format!(
        "{:x}{:x}{:x}{:x}",
        std::process::id(),
        nanos,
        hasher.finish(),
        seq
    );
    let suffix = &raw[raw.len().saturating_sub(12)..];
    dir.join(format!("{}.{}", prefix, suffix))
}

/// Check that [`atomic_write`] to `target` can succeed: its directory is
/// created if missing and must accept new files.
pub fn check_writable(target: &Path) -> io::Result<()> {
    let dir = match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let probe = temp_sibling(dir, ".tmp_write_check");
    fs::write(&probe, b"")?;
    fs::remove_file(&probe)
}

/// Write `data` to `target` atomically by writing to a temporary file in the
/// same directory and then renaming into place.
pub fn atomic_write(target: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => return fs::write(target, data),
    };
    fs::create_dir_all(dir)?;
    let tmp = temp_sibling(dir, ".tmp_atomic_write");
    if let Err(e) = fs::write(&tmp, data) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if test_helpers::should_force_rename_fail_in_write() {
        let _ = fs::remove_file(&tmp);
        return Err(io::Error::other("forced rename failure (write)"));
    }
    fs::rename(&tmp, target).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

/// Copy a single file atomically: copy into a temp file in the destination
/// directory then rename into place. Permissions and timestamps of `src`
/// are carried over on a best-effort basis.
pub fn atomic_copy_file(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut options = CopyOptions::new();
    options.overwrite = false;
    options.buffer_size = COPY_BUFFER;

    let dir = match dst.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => {
            let n = fs_extra_copy(src, dst, &options).map_err(io::Error::other)?;
            let _ = crate::fs_op::metadata::preserve_all_metadata(src, dst);
            return Ok(n);
        }
    };
    fs::create_dir_all(dir)?;
    let tmp = temp_sibling(dir, ".tmp_atomic_copy");

    let copied = match fs_extra_copy(src, &tmp, &options) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(io::Error::other(e));
        }
    };
    if test_helpers::should_force_rename_fail_in_copy() {
        let _ = fs::remove_file(&tmp);
        return Err(io::Error::other("forced rename failure (copy)"));
    }
    match fs::rename(&tmp, dst) {
        Ok(()) => {
            let _ = crate::fs_op::metadata::preserve_all_metadata(src, dst);
            Ok(copied)
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Try to rename `src` to `dst`. When `rename` fails (typically a
/// cross-device move) fall back to copy then remove.
pub fn atomic_rename_or_copy(src: &Path, dst: &Path) -> io::Result<()> {
    if test_helpers::should_force_rename_fail_in_rename_or_copy() {
        return copy_then_remove(src, dst);
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(
                "rename {} -> {} failed ({}), falling back to copy",
                src.display(),
                dst.display(),
                e
            );
            copy_then_remove(src, dst)
        }
    }
}

fn copy_then_remove(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        crate::fs_op::mv::copy_path(src, dst).map_err(io::Error::other)?;
        fs::remove_dir_all(src)
    } else {
        atomic_copy_file(src, dst)?;
        fs::remove_file(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::tempdir;

    fn leftovers(dir: &Path, prefix: &str) -> usize {
        stdfs::read_dir(dir)
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
            .count()
    }

    #[test]
    fn atomic_write_replaces_target_without_temp_files() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("scene.json");
        atomic_write(&target, b"{}").expect("first write");
        atomic_write(&target, b"{\"nodes\":[]}").expect("second write");
        assert_eq!(stdfs::read_to_string(&target).unwrap(), "{\"nodes\":[]}");
        assert_eq!(leftovers(dir.path(), ".tmp_atomic_write."), 0);
    }

    #[test]
    fn atomic_copy_file_creates_parent_dirs() {
        let sdir = tempdir().expect("temp src");
        let ddir = tempdir().expect("temp dst");
        let src = sdir.path().join("tex.exr");
        stdfs::write(&src, "pixels").expect("write src");

        let dst = ddir.path().join("maps/deep/tex.exr");
        atomic_copy_file(&src, &dst).expect("copy");
        assert_eq!(stdfs::read_to_string(&dst).unwrap(), "pixels");
        assert!(src.exists(), "copy must keep the source");
        assert_eq!(leftovers(dst.parent().unwrap(), ".tmp_atomic_copy."), 0);
    }

    #[test]
    fn atomic_copy_file_concurrent_no_temp_collision() {
        let sdir = tempdir().expect("temp src");
        let ddir = tempdir().expect("temp dst");
        let n = 32;
        for i in 0..n {
            stdfs::write(sdir.path().join(format!("file_{}.txt", i)), format!("hello {}", i))
                .expect("write src");
        }

        std::thread::scope(|s| {
            for i in 0..n {
                let src = sdir.path().join(format!("file_{}.txt", i));
                let dst = ddir.path().join(format!("file_{}.txt", i));
                s.spawn(move || atomic_copy_file(&src, &dst).expect("copy"));
            }
        });

        let found = stdfs::read_dir(ddir.path()).unwrap().count();
        assert_eq!(found, n);
        assert_eq!(leftovers(ddir.path(), ".tmp_atomic_copy."), 0);
    }

    #[test]
    fn rename_or_copy_moves_file() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("a.exr");
        let dst = dir.path().join("b.exr");
        stdfs::write(&src, "a").unwrap();
        atomic_rename_or_copy(&src, &dst).expect("move");
        assert!(!src.exists());
        assert_eq!(stdfs::read_to_string(&dst).unwrap(), "a");
    }

    #[cfg(feature = "test-helpers")]
    #[test]
    fn rename_or_copy_falls_back_when_rename_forced_to_fail() {
        test_helpers::set_force_rename_fail_in_rename_or_copy(true);

        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("mv_force.exr");
        let dst = dir.path().join("out/mv_force.exr");
        stdfs::write(&src, "content").unwrap();
        ensure_parent_exists(&dst).unwrap();

        let res = atomic_rename_or_copy(&src, &dst);
        test_helpers::set_force_rename_fail_in_rename_or_copy(false);

        res.expect("fallback move");
        assert!(dst.exists());
        assert!(!src.exists());
    }

    #[cfg(feature = "test-helpers")]
    #[test]
    fn failed_copy_rename_cleans_temp_file() {
        test_helpers::set_force_rename_fail_in_copy(true);

        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("a.exr");
        let dst = dir.path().join("b.exr");
        stdfs::write(&src, "a").unwrap();

        let res = atomic_copy_file(&src, &dst);
        test_helpers::set_force_rename_fail_in_copy(false);

        assert!(res.is_err());
        assert!(!dst.exists());
        assert_eq!(leftovers(dir.path(), ".tmp_atomic_copy."), 0);
    }

    #[cfg(feature = "test-helpers")]
    #[test]
    fn failed_write_rename_keeps_target_and_cleans_temp_file() {
        test_helpers::set_force_rename_fail_in_write(true);

        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("scene.json");
        stdfs::write(&target, "old").unwrap();

        let res = atomic_write(&target, b"new");
        test_helpers::set_force_rename_fail_in_write(false);

        assert!(res.is_err());
        assert_eq!(stdfs::read_to_string(&target).unwrap(), "old");
        assert_eq!(leftovers(dir.path(), ".tmp_atomic_write."), 0);
    }

    #[test]
    fn check_writable_leaves_nothing_behind() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("out/scene.json");
        check_writable(&target).expect("writable");
        assert!(dir.path().join("out").is_dir());
        assert_eq!(leftovers(&dir.path().join("out"), ".tmp_write_check."), 0);
        assert!(!target.exists());

        stdfs::write(dir.path().join("file"), "x").unwrap();
        assert!(check_writable(&dir.path().join("file/scene.json")).is_err());
    }
}
