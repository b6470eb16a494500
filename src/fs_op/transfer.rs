//! Copy or move the file(s) behind a path, which may be a frame/tile
//! template standing for many files.

use std::path::{Path, PathBuf};

use crate::fs_op::{Filesystem, FsOpError};
use crate::resolve::sequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Copy,
    Move,
}

/// One file put in place by a transfer.
#[derive(Debug)]
struct Placed {
    from: PathBuf,
    to: PathBuf,
    /// The file that was at `to` before an overwrite, set aside.
    backup: Option<PathBuf>,
}

/// The files placed by a successful [`transfer`]. The caller either
/// commits them, which drops any overwritten files, or rolls the whole
/// transfer back.
#[derive(Debug)]
#[must_use = "a transfer must be committed or rolled back"]
pub struct Transferred {
    kind: TransferKind,
    placed: Vec<Placed>,
}

impl Transferred {
    pub fn files(&self) -> usize {
        self.placed.len()
    }

    /// Make the transfer final.
    pub fn commit(self, fs: &dyn Filesystem) {
        for placed in self.placed {
            let Some(backup) = placed.backup else { continue };
            if let Err(e) = fs.remove_path(&backup) {
                tracing::warn!(
                    backup = %backup.display(),
                    error = %e,
                    "could not remove overwritten file"
                );
            }
        }
    }

    /// Undo the transfer: moved files go back to their source, copies are
    /// removed, overwritten files are restored.
    pub fn rollback(self, fs: &dyn Filesystem) -> Result<(), FsOpError> {
        undo(fs, self.kind, self.placed)
    }
}

/// Transfer `src` to `dst`. For templates every member on disk is
/// transferred, with its frame/tile values rendered into `dst`.
///
/// All destinations are checked before the first file is touched, so a
/// refused overwrite never leaves a half-transferred sequence behind. A
/// member failing midway undoes the members already placed.
pub fn transfer(
    fs: &dyn Filesystem,
    kind: TransferKind,
    src: &str,
    dst: &str,
    overwrite: bool,
) -> Result<Transferred, FsOpError> {
    let pairs = if sequence::is_sequence(src) {
        let members = sequence::find_files(fs, src);
        if members.is_empty() {
            return Err(FsOpError::SourceMissing(src.to_string()));
        }
        let dst_holes = sequence::sequence_holes(dst);
        members
            .into_iter()
            .map(|m| {
                sequence::render(dst, &dst_holes, &m.captures)
                    .map(|target| (m.path, target))
                    .ok_or_else(|| {
                        FsOpError::Message(format!(
                            "`{}` and `{}` do not have the same frame/tile tokens",
                            src, dst
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?
    } else {
        if !fs.exists(Path::new(src)) {
            return Err(FsOpError::SourceMissing(src.to_string()));
        }
        vec![(src.to_string(), dst.to_string())]
    };

    if !overwrite {
        if let Some((_, taken)) = pairs.iter().find(|(_, d)| fs.exists(Path::new(d))) {
            return Err(FsOpError::DestinationExists(taken.into()));
        }
    }

    let mut placed = Vec::with_capacity(pairs.len());
    for (from, to) in &pairs {
        match place(fs, kind, Path::new(from), Path::new(to)) {
            Ok(p) => placed.push(p),
            Err(e) => {
                tracing::warn!(
                    ?kind,
                    from = %from,
                    error = %e,
                    undone = placed.len(),
                    "transfer failed, undoing placed files"
                );
                if let Err(undo_err) = undo(fs, kind, placed) {
                    return Err(FsOpError::Message(format!(
                        "{}; undoing the transfer also failed: {}",
                        e, undo_err
                    )));
                }
                return Err(e);
            }
        }
    }
    Ok(Transferred { kind, placed })
}

fn place(
    fs: &dyn Filesystem,
    kind: TransferKind,
    from: &Path,
    to: &Path,
) -> Result<Placed, FsOpError> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs.create_dir_all(parent)?;
    }
    let backup = if fs.exists(to) {
        let backup = backup_path(fs, to);
        fs.move_file(to, &backup, false)?;
        Some(backup)
    } else {
        None
    };
    let result = match kind {
        TransferKind::Copy => fs.copy_file(from, to, false),
        TransferKind::Move => fs.move_file(from, to, false),
    };
    if let Err(e) = result {
        if let Some(backup) = &backup {
            fs.move_file(backup, to, true)?;
        }
        return Err(e);
    }
    tracing::debug!(?kind, from = %from.display(), to = %to.display(), "transferred");
    Ok(Placed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        backup,
    })
}

/// Undo `placed`, newest first. Every file is attempted; the first error
/// is returned.
fn undo(fs: &dyn Filesystem, kind: TransferKind, placed: Vec<Placed>) -> Result<(), FsOpError> {
    let mut first_err = None;
    for p in placed.into_iter().rev() {
        let result = match kind {
            TransferKind::Copy => fs.remove_path(&p.to),
            TransferKind::Move => fs.move_file(&p.to, &p.from, false),
        }
        .and_then(|()| match &p.backup {
            Some(backup) => fs.move_file(backup, &p.to, false),
            None => Ok(()),
        });
        if let Err(e) = result {
            tracing::error!(to = %p.to.display(), error = %e, "could not undo transfer");
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

/// A free hidden name next to `to` for setting an overwritten file aside.
fn backup_path(fs: &dyn Filesystem, to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 0;
    loop {
        let candidate = to.with_file_name(format!(".{}.pathzoom-{}", name, n));
        if !fs.exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
