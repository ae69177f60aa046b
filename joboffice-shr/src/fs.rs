//  FS.rs
//    by Ray Plante
//
//  Description:
//!   Implements the filesystem primitives the persisting blackboard queues
//!   build on: atomic whole-file writes and a directory listing that skips
//!   the dotfiles and sidecar files a queue directory uses for its own
//!   bookkeeping.

use std::fmt::{Display, Formatter, Result as FResult};
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};


/***** ERRORS *****/
/// Defines errors that relate to the filesystem helpers in this module.
#[derive(Debug)]
pub enum Error {
    /// Failed to write the staging file ahead of the atomic rename.
    StageWriteError { path: PathBuf, err: io::Error },
    /// Failed to rename the staging file into place.
    RenameError { from: PathBuf, to: PathBuf, err: io::Error },
    /// Failed to remove a file.
    RemoveError { path: PathBuf, err: io::Error },
    /// Failed to list a directory.
    ReadDirError { path: PathBuf, err: io::Error },
    /// Failed to read one entry while listing a directory.
    DirEntryError { path: PathBuf, err: io::Error },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use Error::*;
        match self {
            StageWriteError { path, err }   => write!(f, "failed to write staging file '{}': {}", path.display(), err),
            RenameError { from, to, err }   => write!(f, "failed to rename '{}' to '{}': {}", from.display(), to.display(), err),
            RemoveError { path, err }       => write!(f, "failed to remove '{}': {}", path.display(), err),
            ReadDirError { path, err }      => write!(f, "failed to list directory '{}': {}", path.display(), err),
            DirEntryError { path, err }     => write!(f, "failed to read an entry in directory '{}': {}", path.display(), err),
        }
    }
}
impl std::error::Error for Error {}


/***** LIBRARY *****/
/// Writes `contents` to `path` atomically: the bytes land in a sibling
/// staging file first (named `.add.<file-name>`), then that staging file is
/// renamed over `path`. A reader can never observe a partially-written
/// file, because `rename(2)` within a directory is atomic on the
/// filesystems the job office runs on.
///
/// # Errors
/// Returns an [`Error`] if either the staging write or the rename fails.
pub fn write_atomic(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<(), Error> {
    let path = path.as_ref();
    let stage_path = stage_path_for(path, "add");

    fs::write(&stage_path, contents).map_err(|err| Error::StageWriteError { path: stage_path.clone(), err })?;
    fs::rename(&stage_path, path).map_err(|err| Error::RenameError { from: stage_path, to: path.to_path_buf(), err })
}

/// Removes `path`, first renaming it to a sibling `.del.<file-name>` marker
/// so a crash between the two steps leaves a clearly-named orphan behind
/// rather than a file that looks live. The marker is then unlinked.
///
/// # Errors
/// Returns an [`Error`] if the rename or the final removal fails.
pub fn remove_atomic(path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    let marker_path = stage_path_for(path, "del");

    fs::rename(path, &marker_path).map_err(|err| Error::RenameError { from: path.to_path_buf(), to: marker_path.clone(), err })?;
    fs::remove_file(&marker_path).map_err(|err| Error::RemoveError { path: marker_path, err })
}

/// Builds the staging/marker path for `path`: the same parent directory,
/// with the file name prefixed `.<verb>.`.
fn stage_path_for(path: &Path, verb: &str) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    parent.join(format!(".{}.{}", verb, name))
}

/// Lists the entries of `dir`, skipping dotfiles (including the `.add.*`
/// and `.del.*` staging markers [`write_atomic`] and [`remove_atomic`]
/// leave behind on a crash) and any file whose name starts with an
/// underscore (the convention a queue directory uses for its own sidecar
/// bookkeeping files, such as an order list).
///
/// # Errors
/// Returns an [`Error`] if the directory or one of its entries can't be read.
pub fn list_dir_filtered(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, Error> {
    let dir = dir.as_ref();
    let read_dir = fs::read_dir(dir).map_err(|err| Error::ReadDirError { path: dir.to_path_buf(), err })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry: DirEntry = entry.map_err(|err| Error::DirEntryError { path: dir.to_path_buf(), err })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') { continue; }
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_leaves_no_staging_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("item.rec");
        write_atomic(&path, b"hello").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
        let stage = stage_path_for(&path, "add");
        assert!(!stage.exists());
    }

    #[test]
    fn remove_atomic_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("item.rec");
        write_atomic(&path, b"hello").unwrap();
        remove_atomic(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn list_dir_filtered_skips_dotfiles_and_underscore_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("item1.rec"), b"a").unwrap();
        fs::write(dir.path().join("item2.rec"), b"b").unwrap();
        fs::write(dir.path().join(".add.item3.rec"), b"c").unwrap();
        fs::write(dir.path().join("_order.list"), b"item1.rec\nitem2.rec\n").unwrap();

        let entries = list_dir_filtered(dir.path()).unwrap();
        let names: Vec<String> = entries.iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["item1.rec".to_string(), "item2.rec".to_string()]);
    }
}
