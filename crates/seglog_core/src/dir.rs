//! Data directory management.
//!
//! This module handles the file system layout of a log:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK                          # Advisory lock for single-process access
//! ├─ 00000000000000000000.store    # Segment with base offset 0
//! ├─ 00000000000000000000.index
//! ├─ 00000000000000000016.store    # Segment with base offset 16
//! └─ 00000000000000000016.index
//! ```
//!
//! Segment files are keyed by their base offset, so listing the directory
//! and parsing file names reconstructs segment order on reopen.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";

/// Extension of segment store files.
pub const STORE_EXTENSION: &str = "store";

/// Extension of segment index files.
pub const INDEX_EXTENSION: &str = "index";

/// An opened, exclusively locked log data directory.
///
/// Only one `DataDir` can exist per directory at a time, across processes.
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    _lock_file: File,
}

impl DataDir {
    /// Opens or creates a data directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists but is not a directory
    /// - Another `DataDir` holds the lock ([`CoreError::DataDirLocked`])
    /// - I/O errors occur
    pub fn open(path: &Path) -> CoreResult<Self> {
        fs::create_dir_all(path)?;

        if !path.is_dir() {
            return Err(CoreError::invalid_config(format!(
                "data path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DataDirLocked {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the store file path for a segment.
    #[must_use]
    pub fn store_path(&self, base_offset: u64) -> PathBuf {
        segment_file(&self.path, base_offset, STORE_EXTENSION)
    }

    /// Returns the index file path for a segment.
    #[must_use]
    pub fn index_path(&self, base_offset: u64) -> PathBuf {
        segment_file(&self.path, base_offset, INDEX_EXTENSION)
    }

    /// Lists the base offsets of every segment in the directory, ascending.
    ///
    /// A base offset counts if either its store or index file is present.
    /// Files that do not parse as segment files are ignored.
    pub fn segment_base_offsets(&self) -> CoreResult<Vec<u64>> {
        let mut offsets = BTreeSet::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if let Some(base_offset) = parse_segment_file(&entry.path()) {
                offsets.insert(base_offset);
            }
        }
        Ok(offsets.into_iter().collect())
    }

    /// Syncs the directory so file creation and removal are durable.
    #[cfg(unix)]
    pub fn sync(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Syncs the directory so file creation and removal are durable.
    #[cfg(not(unix))]
    pub fn sync(&self) -> CoreResult<()> {
        Ok(())
    }
}

fn segment_file(dir: &Path, base_offset: u64, extension: &str) -> PathBuf {
    dir.join(format!("{base_offset:020}.{extension}"))
}

/// Parses the base offset out of a segment file name.
///
/// Returns `None` for anything that is not `<digits>.store` or `<digits>.index`.
pub fn parse_segment_file(path: &Path) -> Option<u64> {
    let extension = path.extension()?.to_str()?;
    if extension != STORE_EXTENSION && extension != INDEX_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("log");

        assert!(!path.exists());
        let dir = DataDir::open(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(dir.path(), path);
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("locked");

        let _dir = DataDir::open(&path).unwrap();
        let result = DataDir::open(&path);
        assert!(matches!(result, Err(CoreError::DataDirLocked { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("reopen");

        {
            let _dir = DataDir::open(&path).unwrap();
        }
        assert!(DataDir::open(&path).is_ok());
    }

    #[test]
    fn segment_paths_sort_by_offset() {
        let temp = tempdir().unwrap();
        let dir = DataDir::open(temp.path()).unwrap();

        let store = dir.store_path(16);
        assert_eq!(
            store.file_name().unwrap().to_str().unwrap(),
            "00000000000000000016.store"
        );
        assert_eq!(parse_segment_file(&store), Some(16));
        assert_eq!(parse_segment_file(&dir.index_path(3)), Some(3));
    }

    #[test]
    fn lists_base_offsets() {
        let temp = tempdir().unwrap();
        let dir = DataDir::open(temp.path()).unwrap();

        for base in [32u64, 0, 16] {
            File::create(dir.store_path(base)).unwrap();
            File::create(dir.index_path(base)).unwrap();
        }
        File::create(temp.path().join("notes.txt")).unwrap();
        File::create(temp.path().join("abc.store")).unwrap();

        assert_eq!(dir.segment_base_offsets().unwrap(), vec![0, 16, 32]);
    }

    #[test]
    fn parse_rejects_foreign_files() {
        assert_eq!(parse_segment_file(Path::new("LOCK")), None);
        assert_eq!(parse_segment_file(Path::new("12.log")), None);
        assert_eq!(parse_segment_file(Path::new("-1.store")), None);
        assert_eq!(parse_segment_file(Path::new("7.index")), Some(7));
    }
}
