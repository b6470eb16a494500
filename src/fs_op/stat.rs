use std::path::Path;

/// Lightweight classification of a filesystem path's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// Nothing exists at the path (a dangling symlink counts as `Other`).
    NotFound,
    /// The path exists and is a directory.
    Directory,
    /// The path exists and is a regular file.
    File,
    /// The path exists but is neither a regular file nor a directory
    /// (socket, FIFO, device, dangling symlink).
    Other,
}

impl PathType {
    /// Classify `path`. Symlinks are followed; a link whose target is
    /// gone still reports as present so it is never silently overwritten.
    pub fn of<P: AsRef<Path>>(path: P) -> Self {
        let p = path.as_ref();
        match p.metadata() {
            Ok(md) if md.is_dir() => PathType::Directory,
            Ok(md) if md.is_file() => PathType::File,
            Ok(_) => PathType::Other,
            Err(_) if p.symlink_metadata().is_ok() => PathType::Other,
            Err(_) => PathType::NotFound,
        }
    }
}

/// Return `true` if anything exists at `path`.
pub fn exists<P: AsRef<Path>>(path: P) -> bool {
    PathType::of(path) != PathType::NotFound
}

/// Return `true` if the provided `path` is a directory.
pub fn is_dir<P: AsRef<Path>>(path: P) -> bool {
    PathType::of(path) == PathType::Directory
}
