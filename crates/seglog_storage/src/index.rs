//! Memory-mapped offset index.

use crate::error::{StorageError, StorageResult};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Width of the relative offset field.
pub const OFFSET_WIDTH: u64 = 4;
/// Width of the store position field.
pub const POSITION_WIDTH: u64 = 8;
/// Width of one index entry.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

/// A fixed-width table mapping relative record offsets to store positions.
///
/// ## Entry Format
///
/// ```text
/// | relative_offset (4, big-endian) | position (8, big-endian) |
/// ```
///
/// Entry `n` lives at byte `n * ENTRY_WIDTH` and always carries relative
/// offset `n`, so lookups never scan.
///
/// The file is grown to its maximum size when opened and mapped into
/// memory. [`Index::close`] truncates it back to the bytes actually used so
/// that a reopen sees the real entry count.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    file: File,
    /// `None` once the index is closed.
    mmap: Option<MmapMut>,
    size: u64,
    capacity: u64,
}

impl Index {
    /// Opens or creates an index file, pre-allocating `max_bytes`.
    ///
    /// The entry count is derived from the file size. A file left at its
    /// pre-allocated size by a crash is trimmed to the leading run of
    /// well-formed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, resized or mapped.
    pub fn open(path: &Path, max_bytes: u64) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_size = file.metadata()?.len();
        let capacity = max_bytes.max(file_size);
        file.set_len(capacity)?;

        let mmap = map(&file, path)?;
        let size = recover_size(&mmap, file_size);
        if size != file_size - file_size % ENTRY_WIDTH {
            tracing::warn!(
                path = %path.display(),
                file_size,
                recovered = size,
                "index trimmed to well-formed entries"
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap: Some(mmap),
            size,
            capacity,
        })
    }

    /// Appends an entry.
    ///
    /// `relative_offset` must equal the current entry count.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::IndexFull`] once the mapped region is
    /// exhausted, and [`StorageError::Corrupted`] for out-of-order entries.
    pub fn write(&mut self, relative_offset: u32, position: u64) -> StorageResult<()> {
        let entries = self.entries();
        let mmap = self.mmap.as_mut().ok_or(StorageError::Closed)?;

        if self.size + ENTRY_WIDTH > mmap.len() as u64 {
            return Err(StorageError::IndexFull {
                capacity: self.capacity,
            });
        }
        if u64::from(relative_offset) != entries {
            return Err(StorageError::Corrupted(format!(
                "index entry {relative_offset} written out of order, expected {entries}"
            )));
        }

        let start = self.size as usize;
        let mid = start + OFFSET_WIDTH as usize;
        let end = start + ENTRY_WIDTH as usize;
        mmap[start..mid].copy_from_slice(&relative_offset.to_be_bytes());
        mmap[mid..end].copy_from_slice(&position.to_be_bytes());

        self.size += ENTRY_WIDTH;
        Ok(())
    }

    /// Reads the entry for `relative_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::EntryNotFound`] if the entry was never written.
    pub fn read(&self, relative_offset: u32) -> StorageResult<(u32, u64)> {
        self.read_slot(u64::from(relative_offset))
    }

    /// Reads the most recently written entry.
    ///
    /// Used to recover a segment's next offset after a restart.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::EntryNotFound`] if the index is empty.
    pub fn last_entry(&self) -> StorageResult<(u32, u64)> {
        match self.entries() {
            0 => Err(StorageError::EntryNotFound {
                entry: 0,
                entries: 0,
            }),
            n => self.read_slot(n - 1),
        }
    }

    fn read_slot(&self, slot: u64) -> StorageResult<(u32, u64)> {
        let mmap = self.mmap.as_ref().ok_or(StorageError::Closed)?;
        let entries = self.entries();
        if slot >= entries {
            return Err(StorageError::EntryNotFound {
                entry: slot,
                entries,
            });
        }
        Ok(decode_entry(mmap, slot))
    }

    /// Drops every entry from `entries` onwards.
    ///
    /// Used when the store turns out to be shorter than the index claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is closed.
    pub fn truncate_entries(&mut self, entries: u64) -> StorageResult<()> {
        let mmap = self.mmap.as_mut().ok_or(StorageError::Closed)?;
        let new_size = (entries * ENTRY_WIDTH).min(self.size);
        mmap[new_size as usize..self.size as usize].fill(0);
        self.size = new_size;
        Ok(())
    }

    /// Returns the number of bytes used by entries.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the number of entries.
    pub fn entries(&self) -> u64 {
        self.size / ENTRY_WIDTH
    }

    /// Returns the pre-allocated size in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns true if another entry would not fit.
    pub fn is_full(&self) -> bool {
        self.size + ENTRY_WIDTH > self.capacity
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes dirty pages of the mapping to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is closed or the flush fails.
    pub fn sync(&self) -> StorageResult<()> {
        let mmap = self.mmap.as_ref().ok_or(StorageError::Closed)?;
        mmap.flush()?;
        Ok(())
    }

    /// Flushes the mapping, truncates the file to the used size and syncs.
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush, truncate or sync fails.
    pub fn close(&mut self) -> StorageResult<()> {
        let Some(mmap) = self.mmap.take() else {
            return Ok(());
        };
        mmap.flush()?;
        drop(mmap);

        self.file.set_len(self.size)?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to close index");
        }
    }
}

#[allow(unsafe_code)]
fn map(file: &File, path: &Path) -> StorageResult<MmapMut> {
    // SAFETY: the file stays open for the lifetime of the mapping and the
    // data directory lock keeps other processes from resizing it.
    unsafe { MmapMut::map_mut(file) }.map_err(|source| StorageError::Map {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_entry(mmap: &[u8], slot: u64) -> (u32, u64) {
    let start = (slot * ENTRY_WIDTH) as usize;
    let mid = start + OFFSET_WIDTH as usize;
    let end = start + ENTRY_WIDTH as usize;

    let mut offset = [0u8; OFFSET_WIDTH as usize];
    offset.copy_from_slice(&mmap[start..mid]);
    let mut position = [0u8; POSITION_WIDTH as usize];
    position.copy_from_slice(&mmap[mid..end]);

    (u32::from_be_bytes(offset), u64::from_be_bytes(position))
}

/// Length in bytes of the leading run of entries where entry `n` carries
/// relative offset `n` and positions strictly increase.
fn recover_size(mmap: &[u8], file_size: u64) -> u64 {
    let slots = file_size / ENTRY_WIDTH;
    let mut previous: Option<u64> = None;

    for slot in 0..slots {
        let (offset, position) = decode_entry(mmap, slot);
        let in_order = u64::from(offset) == slot && previous.map_or(true, |p| position > p);
        if !in_order {
            return slot * ENTRY_WIDTH;
        }
        previous = Some(position);
    }
    slots * ENTRY_WIDTH
}
