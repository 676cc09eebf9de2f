//! Filesystem helpers for cache and output paths, built on `cap-std` and
//! `camino`. Windows drive prefixes are not handled; paths are either
//! Unix-style absolute or relative to the current directory.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Resolve an ambient directory for `path` and return it with the file name.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Ensure the parent directory of `path` exists, creating it when absent.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let (base, relative) = if parent.is_absolute() {
        let relative = parent
            .strip_prefix("/")
            .map_err(|_| io::Error::other("failed to strip root from absolute path"))?;
        (Utf8PathBuf::from("/"), relative.to_path_buf())
    } else {
        (Utf8PathBuf::from("."), parent.to_path_buf())
    };
    if relative.as_str().is_empty() {
        return Ok(());
    }
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    dir.create_dir_all(&relative)?;
    Ok(())
}

/// Whether `path` names an existing regular file.
///
/// A missing file or missing parent directory reports `false` rather than
/// an error; other probe failures propagate.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(pair) => pair,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    match dir.metadata(name.as_str()) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Remove a stale file at `path`, succeeding when it does not exist.
pub fn remove_file_if_exists(path: &Utf8Path) -> io::Result<()> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(pair) => pair,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    match dir.remove_file(name.as_str()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp directory")
    }

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("temp paths are UTF-8")
    }

    #[rstest]
    fn ensure_parent_dir_creates_nested_directories(temp_dir: TempDir) {
        let target = utf8(temp_dir.path()).join("a/b/c/output.gpkg");
        ensure_parent_dir(&target).expect("create parents");
        assert!(target.parent().expect("has parent").is_dir());
    }

    #[rstest]
    fn file_is_file_reports_missing_files(temp_dir: TempDir) {
        let missing = utf8(temp_dir.path()).join("absent/archive.geojson");
        assert!(!file_is_file(&missing).expect("probe succeeds"));
    }

    #[rstest]
    fn file_is_file_reports_existing_files(temp_dir: TempDir) {
        let path = utf8(temp_dir.path()).join("archive.geojson");
        std::fs::write(path.as_std_path(), b"{}").expect("write file");
        assert!(file_is_file(&path).expect("probe succeeds"));
    }

    #[rstest]
    fn remove_file_if_exists_is_idempotent(temp_dir: TempDir) {
        let path = utf8(temp_dir.path()).join("stale.gpkg");
        std::fs::write(path.as_std_path(), b"old").expect("write file");
        remove_file_if_exists(&path).expect("first removal");
        remove_file_if_exists(&path).expect("second removal");
        assert!(!file_is_file(&path).expect("probe succeeds"));
    }
}
