//! The segmented commit log.

use crate::config::Config;
use crate::dir::DataDir;
use crate::error::{CoreError, CoreResult};
use crate::follower::LogFollower;
use crate::reader::LogReader;
use crate::segment::Segment;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot published to followers after every append and on close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tip {
    pub(crate) next_offset: u64,
    pub(crate) closed: bool,
}

/// Size and range of one segment, as reported by [`Log::segments`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Offset of the first record.
    pub base_offset: u64,
    /// Offset the next append to this segment would receive.
    pub next_offset: u64,
    /// Store size in bytes.
    pub store_size: u64,
    /// Used index bytes.
    pub index_size: u64,
    /// Whether the segment reached its limits.
    pub maxed: bool,
    /// Whether this is the segment receiving appends.
    pub active: bool,
}

#[derive(Debug)]
struct LogState {
    /// Sorted by base offset. Never empty while open; the last is active.
    segments: Vec<Segment>,
    closed: bool,
}

impl LogState {
    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed {
            Err(CoreError::LogClosed)
        } else {
            Ok(())
        }
    }

    fn active(&self) -> CoreResult<&Segment> {
        self.segments
            .last()
            .ok_or_else(|| CoreError::segment_corruption("log has no active segment"))
    }

    fn active_mut(&mut self) -> CoreResult<&mut Segment> {
        self.segments
            .last_mut()
            .ok_or_else(|| CoreError::segment_corruption("log has no active segment"))
    }
}

/// An append-only log of records split into segments on disk.
///
/// Offsets are assigned on append, start at the configured initial offset
/// and never repeat, even across truncation and restarts.
///
/// # Concurrency
///
/// Appends and truncation take the segment list exclusively. Reads share
/// it. Every method takes `&self`, so a log is usually held in an `Arc`.
///
/// # Example
///
/// ```no_run
/// use seglog_core::{Config, Log};
///
/// let log = Log::open("/tmp/seglog", Config::default()).unwrap();
/// let offset = log.append(b"hello world").unwrap();
/// assert_eq!(log.read(offset).unwrap(), b"hello world");
/// log.close().unwrap();
/// ```
pub struct Log {
    dir: DataDir,
    config: Config,
    state: RwLock<LogState>,
    tip: watch::Sender<Tip>,
}

impl Log {
    /// Opens the log in `path`, creating the directory if needed.
    ///
    /// Existing segments are reopened in base offset order. A brand-new
    /// directory gets one empty segment at `config.initial_offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the directory is
    /// locked by another log, or a segment cannot be opened.
    pub fn open(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        config.validate()?;
        let dir = DataDir::open(path.as_ref())?;

        let mut segments = Vec::new();
        for base_offset in dir.segment_base_offsets()? {
            segments.push(Segment::new(&dir, base_offset, &config)?);
        }

        let rollover = match segments.last() {
            None => Some(config.initial_offset),
            Some(active) if active.is_maxed() => Some(active.next_offset()),
            Some(_) => None,
        };
        if let Some(base_offset) = rollover {
            segments.push(Segment::new(&dir, base_offset, &config)?);
            dir.sync()?;
        }

        let state = LogState {
            segments,
            closed: false,
        };
        let next_offset = state.active()?.next_offset();
        let (tip, _) = watch::channel(Tip {
            next_offset,
            closed: false,
        });

        tracing::info!(
            path = %dir.path().display(),
            segments = state.segments.len(),
            next_offset,
            "log opened"
        );

        Ok(Self {
            dir,
            config,
            state: RwLock::new(state),
            tip,
        })
    }

    /// Appends a record and returns its offset.
    ///
    /// A maxed active segment is rolled over before the write, and a full
    /// index rolls over and retries once. A segment that reaches its limits
    /// after the write is sealed immediately. If that rollover fails the
    /// record still counts as appended and the next append retries it.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is closed, the write fails or a pending
    /// rollover cannot be completed. Nothing is appended in those cases.
    pub fn append(&self, payload: &[u8]) -> CoreResult<u64> {
        let mut state = self.state.write();
        state.ensure_open()?;

        if state.active()?.is_maxed() {
            self.roll(&mut state)?;
        }

        let offset = match state.active_mut()?.append(payload) {
            Err(CoreError::IndexFull { base_offset }) => {
                tracing::debug!(base_offset, "index full, rolling over");
                self.roll(&mut state)?;
                state.active_mut()?.append(payload)?
            }
            result => result?,
        };

        // Published under the write lock so followers never see the tip
        // move backwards.
        self.tip.send_replace(Tip {
            next_offset: offset + 1,
            closed: false,
        });

        if state.active()?.is_maxed() {
            if let Err(e) = self.roll(&mut state) {
                tracing::warn!(offset, error = %e, "rollover failed, retrying on next append");
            }
        }
        Ok(offset)
    }

    /// Starts a new active segment at the current active's next offset.
    fn roll(&self, state: &mut LogState) -> CoreResult<()> {
        let base_offset = state.active()?.next_offset();
        let segment = Segment::new(&self.dir, base_offset, &self.config)?;
        state.segments.push(segment);
        self.dir.sync()?;
        tracing::debug!(base_offset, "new active segment");
        Ok(())
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OffsetOutOfRange`] if no segment holds the
    /// offset, or [`CoreError::LogClosed`] after close.
    pub fn read(&self, offset: u64) -> CoreResult<Vec<u8>> {
        let state = self.state.read();
        state.ensure_open()?;

        let after = state
            .segments
            .partition_point(|s| s.base_offset() <= offset);
        match after.checked_sub(1).map(|i| &state.segments[i]) {
            Some(segment) if segment.contains(offset) => segment.read(offset),
            _ => Err(CoreError::OffsetOutOfRange { offset }),
        }
    }

    /// Removes every segment whose records all lie below `lowest`.
    ///
    /// A segment straddling `lowest` is kept whole. If the active segment
    /// goes, an empty one starting at its next offset replaces it so
    /// offsets are not handed out twice.
    ///
    /// # Errors
    ///
    /// Returns the first failure to remove a segment. Every selected
    /// segment is still attempted.
    pub fn truncate(&self, lowest: u64) -> CoreResult<()> {
        let mut state = self.state.write();
        state.ensure_open()?;

        let mut cut = state
            .segments
            .partition_point(|s| s.next_offset() <= lowest);
        if cut == state.segments.len() {
            let active = state.active()?;
            if active.is_empty() {
                cut -= 1;
            } else {
                let segment = Segment::new(&self.dir, active.next_offset(), &self.config)?;
                state.segments.push(segment);
            }
        }
        if cut == 0 {
            return Ok(());
        }

        let removed: Vec<Segment> = state.segments.drain(..cut).collect();
        let mut first_error = None;
        for segment in removed {
            let base_offset = segment.base_offset();
            if let Err(e) = segment.remove() {
                tracing::warn!(base_offset, error = %e, "failed to remove segment");
                first_error.get_or_insert(e);
            }
        }
        self.dir.sync()?;

        tracing::info!(lowest, removed = cut, "log truncated");
        first_error.map_or(Ok(()), Err)
    }

    /// Returns the offset of the oldest retained record position.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LogClosed`] after close.
    pub fn lowest_offset(&self) -> CoreResult<u64> {
        let state = self.state.read();
        state.ensure_open()?;
        state
            .segments
            .first()
            .map(Segment::base_offset)
            .ok_or_else(|| CoreError::segment_corruption("log has no segments"))
    }

    /// Returns the offset of the newest record, or `None` if the log holds
    /// no records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LogClosed`] after close.
    pub fn highest_offset(&self) -> CoreResult<Option<u64>> {
        let state = self.state.read();
        state.ensure_open()?;
        let next_offset = state.active()?.next_offset();
        let lowest = state
            .segments
            .first()
            .map_or(next_offset, Segment::base_offset);
        Ok((next_offset > lowest).then(|| next_offset - 1))
    }

    /// Returns a reader over the raw store bytes of every segment.
    ///
    /// The reader sees the segments that exist now. Each call starts from
    /// the beginning of the log.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LogClosed`] after close.
    pub fn reader(&self) -> CoreResult<LogReader> {
        let state = self.state.read();
        state.ensure_open()?;
        let stores = state.segments.iter().map(Segment::store).collect();
        Ok(LogReader::new(stores))
    }

    /// Returns a follower that yields records from `from` onwards and waits
    /// for new appends once it catches up.
    pub fn follow(self: &Arc<Self>, from: u64) -> LogFollower {
        LogFollower::new(Arc::clone(self), from, self.tip.subscribe())
    }

    /// Describes every segment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LogClosed`] after close.
    pub fn segments(&self) -> CoreResult<Vec<SegmentInfo>> {
        let state = self.state.read();
        state.ensure_open()?;
        let last = state.segments.len().saturating_sub(1);
        Ok(state
            .segments
            .iter()
            .enumerate()
            .map(|(i, s)| SegmentInfo {
                base_offset: s.base_offset(),
                next_offset: s.next_offset(),
                store_size: s.store_size(),
                index_size: s.index_size(),
                maxed: s.is_maxed(),
                active: i == last,
            })
            .collect())
    }

    /// Closes every segment and wakes all followers.
    ///
    /// Every segment is closed even if an earlier one fails. Closing twice
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first segment close failure.
    pub fn close(&self) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        let mut first_error = None;
        for segment in &mut state.segments {
            if let Err(e) = segment.close() {
                tracing::warn!(
                    base_offset = segment.base_offset(),
                    error = %e,
                    "failed to close segment"
                );
                first_error.get_or_insert(e);
            }
        }
        drop(state);

        self.tip.send_modify(|tip| tip.closed = true);
        tracing::info!(path = %self.dir.path().display(), "log closed");
        first_error.map_or(Ok(()), Err)
    }

    /// Checks if the log is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Returns the data directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the log configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log")
            .field("path", &self.path())
            .field("is_closed", &self.is_closed())
            .field("next_offset", &self.tip.borrow().next_offset)
            .finish_non_exhaustive()
    }
}

impl Drop for Log {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Read;
    use tempfile::tempdir;

    const WRITE: &[u8] = b"hello world";

    fn small_config() -> Config {
        Config::new().max_store_bytes(32).max_records_per_segment(3)
    }

    #[test]
    fn append_and_read() {
        let dir = tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();

        let offset = log.append(WRITE).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(log.read(offset).unwrap(), WRITE);
    }

    #[test]
    fn read_out_of_range() {
        let dir = tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();

        let err = log.read(1).unwrap_err();
        assert!(matches!(err, CoreError::OffsetOutOfRange { offset: 1 }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn empty_log_has_no_highest_offset() {
        let dir = tempdir().unwrap();
        let log = Log::open(dir.path(), Config::new().initial_offset(7)).unwrap();

        assert_eq!(log.lowest_offset().unwrap(), 7);
        assert_eq!(log.highest_offset().unwrap(), None);
        assert_eq!(log.append(WRITE).unwrap(), 7);
        assert_eq!(log.highest_offset().unwrap(), Some(7));
    }

    #[test]
    fn init_with_existing_segments() {
        let dir = tempdir().unwrap();

        {
            let log = Log::open(dir.path(), small_config()).unwrap();
            for _ in 0..3 {
                log.append(WRITE).unwrap();
            }
            log.close().unwrap();
        }

        let log = Log::open(dir.path(), small_config()).unwrap();
        assert_eq!(log.lowest_offset().unwrap(), 0);
        assert_eq!(log.highest_offset().unwrap(), Some(2));
        assert_eq!(log.append(WRITE).unwrap(), 3);
    }

    #[test]
    fn rolls_over_when_store_fills() {
        let dir = tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();

        // 19-byte frames: the second one pushes the store past 32 bytes.
        log.append(WRITE).unwrap();
        log.append(WRITE).unwrap();
        log.append(WRITE).unwrap();

        let segments = log.segments().unwrap();
        let bases: Vec<u64> = segments.iter().map(|s| s.base_offset).collect();
        assert_eq!(bases, vec![0, 2]);
        assert!(segments[0].maxed);
        assert!(!segments[0].active);
        assert!(segments[1].active);
        assert_eq!(segments[1].next_offset, 3);

        for offset in 0..3 {
            assert_eq!(log.read(offset).unwrap(), WRITE);
        }
    }

    #[test]
    fn truncate_removes_old_segments() {
        let dir = tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();
        for _ in 0..3 {
            log.append(WRITE).unwrap();
        }

        log.truncate(1).unwrap();
        assert_eq!(log.lowest_offset().unwrap(), 0);

        log.truncate(2).unwrap();
        assert_eq!(log.lowest_offset().unwrap(), 2);
        assert!(log.read(0).unwrap_err().is_not_found());
        assert_eq!(log.read(2).unwrap(), WRITE);
    }

    #[test]
    fn truncate_past_end_keeps_offsets_unique() {
        let dir = tempdir().unwrap();
        let log = Log::open(dir.path(), Config::default()).unwrap();
        for _ in 0..3 {
            log.append(WRITE).unwrap();
        }

        log.truncate(100).unwrap();
        assert_eq!(log.lowest_offset().unwrap(), 3);
        assert_eq!(log.highest_offset().unwrap(), None);
        assert_eq!(log.append(WRITE).unwrap(), 3);

        // An empty active segment survives truncation.
        let dir = tempdir().unwrap();
        let empty = Log::open(dir.path(), Config::default()).unwrap();
        empty.truncate(100).unwrap();
        assert_eq!(empty.segments().unwrap().len(), 1);
        assert_eq!(empty.append(WRITE).unwrap(), 0);
    }

    #[test]
    fn reader_streams_raw_frames() {
        let dir = tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();
        log.append(WRITE).unwrap();
        log.append(b"second").unwrap();

        let mut bytes = Vec::new();
        log.reader().unwrap().read_to_end(&mut bytes).unwrap();

        let mut expected = Vec::new();
        for payload in [WRITE, b"second".as_slice()] {
            expected.extend_from_slice(&(payload.len() as u64).to_be_bytes());
            expected.extend_from_slice(payload);
        }
        assert_eq!(bytes, expected);
    }

    #[test]
    fn close_is_idempotent_and_blocks_operations() {
        let dir = tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();
        log.append(WRITE).unwrap();

        log.close().unwrap();
        log.close().unwrap();
        assert!(log.is_closed());
        assert!(matches!(log.append(WRITE), Err(CoreError::LogClosed)));
        assert_eq!(log.read(0).unwrap_err().kind(), ErrorKind::Closed);
    }

    #[test]
    fn second_open_is_locked_out() {
        let dir = tempdir().unwrap();
        let _log = Log::open(dir.path(), Config::default()).unwrap();

        let result = Log::open(dir.path(), Config::default());
        assert!(matches!(result, Err(CoreError::DataDirLocked { .. })));
    }

    #[test]
    fn invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let result = Log::open(dir.path(), Config::new().max_index_bytes(0));
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }
}
