//! Tailing a log as it grows.

use crate::error::{CoreError, CoreResult};
use crate::log::{Log, Tip};
use std::sync::Arc;
use tokio::sync::watch;

/// A record read back from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Offset assigned at append time.
    pub offset: u64,
    /// Payload as appended.
    pub value: Vec<u8>,
}

/// Yields records in offset order and waits for appends once caught up.
///
/// Created by [`Log::follow`]. If truncation removes the record the
/// follower is positioned at, it skips ahead to the lowest remaining one.
#[derive(Debug)]
pub struct LogFollower {
    log: Arc<Log>,
    next: u64,
    tip: watch::Receiver<Tip>,
}

impl LogFollower {
    pub(crate) fn new(log: Arc<Log>, from: u64, tip: watch::Receiver<Tip>) -> Self {
        Self {
            log,
            next: from,
            tip,
        }
    }

    /// Offset of the record the next call will return.
    pub fn position(&self) -> u64 {
        self.next
    }

    /// Returns the next record, waiting for it to be appended if needed.
    ///
    /// Returns `Ok(None)` once the log is closed.
    ///
    /// # Errors
    ///
    /// Returns any read failure other than a missing offset.
    pub async fn next_record(&mut self) -> CoreResult<Option<Record>> {
        loop {
            match self.log.read(self.next) {
                Ok(value) => {
                    let record = Record {
                        offset: self.next,
                        value,
                    };
                    self.next += 1;
                    return Ok(Some(record));
                }
                Err(CoreError::LogClosed) => return Ok(None),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }

            let lowest = match self.log.lowest_offset() {
                Ok(lowest) => lowest,
                Err(CoreError::LogClosed) => return Ok(None),
                Err(e) => return Err(e),
            };
            if self.next < lowest {
                tracing::debug!(from = self.next, to = lowest, "follower skipped truncated records");
                self.next = lowest;
                continue;
            }

            let next = self.next;
            let woke = self
                .tip
                .wait_for(|tip| tip.closed || tip.next_offset > next)
                .await
                .map(|tip| tip.closed);
            match woke {
                Ok(false) => {}
                Ok(true) | Err(_) => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn follower_reads_existing_then_waits() {
        let dir = tempdir().unwrap();
        let log = Arc::new(Log::open(dir.path(), Config::default()).unwrap());
        log.append(b"a").unwrap();

        let mut follower = log.follow(0);
        let first = follower.next_record().await.unwrap().unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.value, b"a");

        let writer = Arc::clone(&log);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.append(b"b").unwrap();
        });

        let second = tokio::time::timeout(Duration::from_secs(5), follower.next_record())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(second, Record { offset: 1, value: b"b".to_vec() });
        assert_eq!(follower.position(), 2);
    }

    #[tokio::test]
    async fn follower_ends_on_close() {
        let dir = tempdir().unwrap();
        let log = Arc::new(Log::open(dir.path(), Config::default()).unwrap());
        let mut follower = log.follow(0);

        let closer = Arc::clone(&log);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close().unwrap();
        });

        let next = tokio::time::timeout(Duration::from_secs(5), follower.next_record())
            .await
            .unwrap()
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn follower_skips_truncated_records() {
        let dir = tempdir().unwrap();
        let config = Config::new().max_records_per_segment(2);
        let log = Arc::new(Log::open(dir.path(), config).unwrap());
        for value in [b"a", b"b", b"c"] {
            log.append(value).unwrap();
        }
        log.truncate(2).unwrap();

        let mut follower = log.follow(0);
        let record = follower.next_record().await.unwrap().unwrap();
        assert_eq!(record.offset, 2);
        assert_eq!(record.value, b"c");
    }
}
