//! Append-only record store.

use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Width of the big-endian length prefix written before every record.
pub const LEN_WIDTH: u64 = 8;

/// An append-only file of length-prefixed records.
///
/// Every append is framed as:
///
/// ```text
/// | len (8, big-endian) | payload (len) |
/// ```
///
/// Writes go through a buffered writer. Reads flush the buffer first so
/// a record is readable as soon as `append` returns.
///
/// # Thread Safety
///
/// A single mutex serialises appends and reads. Reads seek the shared
/// file handle, which is why they also take the lock exclusively.
///
/// # Example
///
/// ```no_run
/// use seglog_storage::Store;
/// use std::path::Path;
///
/// let store = Store::open(Path::new("00000000000000000000.store")).unwrap();
/// let (_, position) = store.append(b"hello").unwrap();
/// assert_eq!(store.read(position).unwrap(), b"hello");
/// ```
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    /// `None` once the store is closed.
    writer: Option<BufWriter<File>>,
    size: u64,
}

impl Store {
    /// Opens or creates a store file at the given path.
    ///
    /// Existing contents are kept; new records are appended after them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(StoreInner {
                writer: Some(BufWriter::new(file)),
                size,
            }),
        })
    }

    /// Appends one record.
    ///
    /// Returns `(bytes_written, position)` where `position` is the offset of
    /// the record's length prefix. That position is what the index stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the write fails.
    pub fn append(&self, payload: &[u8]) -> StorageResult<(u64, u64)> {
        let mut inner = self.inner.lock();
        let position = inner.size;
        let writer = inner.writer.as_mut().ok_or(StorageError::Closed)?;

        writer.write_all(&(payload.len() as u64).to_be_bytes())?;
        writer.write_all(payload)?;

        let written = LEN_WIDTH + payload.len() as u64;
        inner.size += written;
        Ok((written, position))
    }

    /// Reads the record whose length prefix starts at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`] if no prefix fits at `position`,
    /// and [`StorageError::Corrupted`] if the prefix points past the end.
    pub fn read(&self, position: u64) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.size;
        let writer = inner.writer.as_mut().ok_or(StorageError::Closed)?;

        if position.saturating_add(LEN_WIDTH) > size {
            return Err(StorageError::ReadPastEnd { position, size });
        }

        writer.flush()?;
        let file = writer.get_mut();
        file.seek(SeekFrom::Start(position))?;

        let mut len_bytes = [0u8; LEN_WIDTH as usize];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_be_bytes(len_bytes);

        let end = position
            .checked_add(LEN_WIDTH)
            .and_then(|start| start.checked_add(len));
        if end.map_or(true, |end| end > size) {
            return Err(StorageError::Corrupted(format!(
                "record at {position} claims {len} bytes, store holds {size}"
            )));
        }

        let len = usize::try_from(len)
            .map_err(|_| StorageError::Corrupted(format!("record length {len} too large")))?;
        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Copies raw store bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied, `0` at the end of the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the read fails.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<usize> {
        let mut inner = self.inner.lock();
        let size = inner.size;
        let writer = inner.writer.as_mut().ok_or(StorageError::Closed)?;

        if offset >= size || buf.is_empty() {
            return Ok(0);
        }

        writer.flush()?;
        let remaining = usize::try_from(size - offset).unwrap_or(usize::MAX);
        let n = buf.len().min(remaining);

        let file = writer.get_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf[..n])?;
        Ok(n)
    }

    /// Flushes buffered writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the flush fails.
    pub fn flush(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        let writer = inner.writer.as_mut().ok_or(StorageError::Closed)?;
        writer.flush()?;
        Ok(())
    }

    /// Flushes and syncs data and metadata to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the sync fails.
    pub fn sync(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        let writer = inner.writer.as_mut().ok_or(StorageError::Closed)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Cuts the store down to `size` bytes. A size at or beyond the current
    /// size leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the file cannot be
    /// resized.
    pub fn truncate(&self, size: u64) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        let current = inner.size;
        let writer = inner.writer.as_mut().ok_or(StorageError::Closed)?;
        if size >= current {
            return Ok(());
        }

        writer.flush()?;
        let file = writer.get_ref();
        file.set_len(size)?;
        file.sync_all()?;
        inner.size = size;
        Ok(())
    }

    /// Returns the store size in bytes, including buffered writes.
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once [`Store::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().writer.is_none()
    }

    /// Flushes, syncs and closes the file. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered data cannot be flushed or synced.
    pub fn close(&self) -> StorageResult<()> {
        let Some(writer) = self.inner.lock().writer.take() else {
            return Ok(());
        };
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}
