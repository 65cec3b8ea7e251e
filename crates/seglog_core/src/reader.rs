//! Raw byte reader over a whole log.

use seglog_storage::Store;
use std::io::{self, Read};
use std::sync::Arc;

/// Reads the concatenated store files of a log, oldest segment first.
///
/// Bytes come out exactly as stored: every record is an 8-byte big-endian
/// length followed by its payload. The segment list is fixed when the
/// reader is created; each store is read up to its size at read time.
#[derive(Debug)]
pub struct LogReader {
    stores: Vec<Arc<Store>>,
    current: usize,
    position: u64,
}

impl LogReader {
    pub(crate) fn new(stores: Vec<Arc<Store>>) -> Self {
        Self {
            stores,
            current: 0,
            position: 0,
        }
    }
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while let Some(store) = self.stores.get(self.current) {
            let n = store
                .read_at(buf, self.position)
                .map_err(io::Error::other)?;
            if n > 0 {
                self.position += n as u64;
                return Ok(n);
            }
            self.current += 1;
            self.position = 0;
        }
        Ok(0)
    }
}
