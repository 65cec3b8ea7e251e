//! A store and index pair covering a contiguous range of offsets.

use crate::config::Config;
use crate::dir::DataDir;
use crate::error::{CoreError, CoreResult};
use seglog_storage::{Index, Store, LEN_WIDTH};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// One segment of the log.
///
/// A segment covers `[base_offset, next_offset)`. Record `o` is the
/// `o - base_offset`-th index entry, which points at its frame in the
/// store. Only the active (last) segment of a log is appended to.
#[derive(Debug)]
pub struct Segment {
    store: Arc<Store>,
    index: Index,
    base_offset: u64,
    next_offset: u64,
    max_store_bytes: u64,
    /// Set once a store write succeeded but its index entry did not.
    poisoned: bool,
}

impl Segment {
    /// Opens the segment starting at `base_offset`, creating its files if
    /// they do not exist yet.
    ///
    /// The next offset is recovered from the last index entry. Entries
    /// pointing at frames the store does not fully hold are dropped, and
    /// the store is cut back to the end of the last indexed frame.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be opened.
    pub fn new(dir: &DataDir, base_offset: u64, config: &Config) -> CoreResult<Self> {
        let store = Store::open(&dir.store_path(base_offset))?;
        let mut index = Index::open(&dir.index_path(base_offset), config.max_index_bytes)?;

        let store_size = store.size();
        let mut dropped = 0u64;
        let mut valid_end = 0u64;
        while let Ok((_, position)) = index.last_entry() {
            if let Some(end) = frame_end(&store, position, store_size)? {
                valid_end = end;
                break;
            }
            index.truncate_entries(index.entries() - 1)?;
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!(
                base_offset,
                dropped,
                store_size,
                "dropped index entries for incomplete records"
            );
        }
        if store_size > valid_end {
            store.truncate(valid_end)?;
            tracing::warn!(
                base_offset,
                store_size,
                valid_end,
                "dropped unindexed bytes at end of store"
            );
        }

        let next_offset = match index.last_entry() {
            Ok((relative, _)) => base_offset + u64::from(relative) + 1,
            Err(_) => base_offset,
        };

        tracing::debug!(base_offset, next_offset, store_size = store.size(), "segment opened");

        Ok(Self {
            store: Arc::new(store),
            index,
            base_offset,
            next_offset,
            max_store_bytes: config.max_store_bytes,
            poisoned: false,
        })
    }

    /// Appends a record and returns its absolute offset.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IndexFull`] if the index has no room. Nothing is
    ///   written in that case.
    /// - [`CoreError::SegmentCorruption`] if the store accepted the record
    ///   but the index did not. The segment refuses appends afterwards.
    pub fn append(&mut self, payload: &[u8]) -> CoreResult<u64> {
        if self.poisoned {
            return Err(CoreError::segment_corruption(format!(
                "segment {} has an unindexed record",
                self.base_offset
            )));
        }

        let full = CoreError::IndexFull {
            base_offset: self.base_offset,
        };
        if self.index.is_full() {
            return Err(full);
        }
        let relative = u32::try_from(self.next_offset - self.base_offset).map_err(|_| full)?;

        let (_, position) = self.store.append(payload)?;
        if let Err(e) = self.index.write(relative, position) {
            self.poisoned = true;
            return Err(CoreError::segment_corruption(format!(
                "record stored at {position} in segment {} but not indexed: {e}",
                self.base_offset
            )));
        }

        let offset = self.next_offset;
        self.next_offset += 1;
        Ok(offset)
    }

    /// Reads the record at an absolute offset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OffsetOutOfRange`] if the segment does not
    /// hold `offset`.
    pub fn read(&self, offset: u64) -> CoreResult<Vec<u8>> {
        if !self.contains(offset) {
            return Err(CoreError::OffsetOutOfRange { offset });
        }
        let relative = u32::try_from(offset - self.base_offset)
            .map_err(|_| CoreError::OffsetOutOfRange { offset })?;
        let (_, position) = self.index.read(relative)?;
        Ok(self.store.read(position)?)
    }

    /// Returns true if the store or the index reached its limit.
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.max_store_bytes || self.index.is_full()
    }

    /// Returns true if the segment holds no records.
    pub fn is_empty(&self) -> bool {
        self.next_offset == self.base_offset
    }

    /// Returns true if `offset` lies in `[base_offset, next_offset)`.
    pub fn contains(&self, offset: u64) -> bool {
        self.base_offset <= offset && offset < self.next_offset
    }

    /// Offset of the first record.
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Offset the next append will receive.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Store size in bytes.
    pub fn store_size(&self) -> u64 {
        self.store.size()
    }

    /// Bytes of index actually used.
    pub fn index_size(&self) -> u64 {
        self.index.size()
    }

    /// Shared handle to the store, for raw readers.
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// Closes both files. Both are attempted even if the first fails.
    ///
    /// # Errors
    ///
    /// Returns the first close failure.
    pub fn close(&mut self) -> CoreResult<()> {
        let store = self.store.close();
        let index = self.index.close();
        store?;
        index?;
        Ok(())
    }

    /// Closes the segment and deletes its files.
    ///
    /// # Errors
    ///
    /// Returns an error if closing or deleting fails.
    pub fn remove(mut self) -> CoreResult<()> {
        self.close()?;
        let paths: [PathBuf; 2] = [
            self.store.path().to_path_buf(),
            self.index.path().to_path_buf(),
        ];
        for path in &paths {
            fs::remove_file(path)?;
        }
        tracing::debug!(base_offset = self.base_offset, "segment removed");
        Ok(())
    }
}

/// End of the frame starting at `position`, if the store holds all of it.
fn frame_end(store: &Store, position: u64, store_size: u64) -> CoreResult<Option<u64>> {
    let mut len = [0u8; LEN_WIDTH as usize];
    if position.saturating_add(LEN_WIDTH) > store_size
        || store.read_at(&mut len, position)? < len.len()
    {
        return Ok(None);
    }
    Ok(position
        .checked_add(LEN_WIDTH)
        .and_then(|start| start.checked_add(u64::from_be_bytes(len)))
        .filter(|end| *end <= store_size))
}
