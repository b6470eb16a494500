//! Carry file metadata (permissions, timestamps, ownership, xattrs) over to
//! copied files so a relocated texture or cache looks like the original.
//!
//! Permissions and timestamps of a single file are treated as part of the
//! copy and their errors propagate. Ownership and extended attributes are
//! best-effort since they usually need elevated privileges. Directory trees
//! are walked sequentially and every failure inside them is ignored.

use std::fs;
use std::io;
use std::path::Path;

use filetime::{set_file_times, FileTime};
use walkdir::WalkDir;

#[cfg(unix)]
mod unix_extra {
    use std::fs;
    use std::os::unix::fs::MetadataExt;
    use std::path::Path;

    use nix::unistd::{chown, Gid, Uid};

    pub(crate) fn copy_unix_extras(src: &Path, dst: &Path) {
        if let Ok(meta) = fs::metadata(src) {
            let _ = chown(
                dst,
                Some(Uid::from_raw(meta.uid())),
                Some(Gid::from_raw(meta.gid())),
            );
        }

        if let Ok(names) = xattr::list(src) {
            for name in names {
                if let Ok(Some(val)) = xattr::get(src, &name) {
                    let _ = xattr::set(dst, &name, &val);
                }
            }
        }
    }
}

fn copy_times(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::metadata(src)?;
    let mtime = FileTime::from_system_time(meta.modified()?);
    let atime = FileTime::from_system_time(meta.accessed()?);
    set_file_times(dst, atime, mtime)
}

/// Preserve metadata from `src` onto `dst`. Missing paths are a no-op.
pub(crate) fn preserve_all_metadata(src: &Path, dst: &Path) -> io::Result<()> {
    if !src.exists() || !dst.exists() {
        return Ok(());
    }

    if src.is_file() {
        fs::set_permissions(dst, fs::metadata(src)?.permissions())?;
        copy_times(src, dst)?;
        #[cfg(unix)]
        unix_extra::copy_unix_extras(src, dst);
        return Ok(());
    }

    for entry in WalkDir::new(src).follow_links(false).into_iter().filter_map(Result::ok) {
        let rel = match entry.path().strip_prefix(src) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let target = dst.join(rel);
        if !target.exists() {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            let _ = fs::set_permissions(&target, meta.permissions());
        }
        let _ = copy_times(entry.path(), &target);
        #[cfg(unix)]
        unix_extra::copy_unix_extras(entry.path(), &target);
    }
    Ok(())
}
