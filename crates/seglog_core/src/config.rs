//! Log configuration.

use crate::error::{CoreError, CoreResult};
use seglog_storage::{ENTRY_WIDTH, LEN_WIDTH};

/// Default maximum store size per segment.
pub const DEFAULT_MAX_STORE_BYTES: u64 = 1024;

/// Default maximum index size per segment.
pub const DEFAULT_MAX_INDEX_BYTES: u64 = 1024;

/// Configuration for opening a log.
///
/// Unset values fall back to the documented defaults through
/// [`Config::default`]; builders override individual fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Store size at which a segment is considered full.
    pub max_store_bytes: u64,

    /// Index size pre-allocated per segment. A segment is full once the
    /// index cannot take another entry.
    pub max_index_bytes: u64,

    /// Offset assigned to the first record of a brand-new log.
    pub initial_offset: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_store_bytes: DEFAULT_MAX_STORE_BYTES,
            max_index_bytes: DEFAULT_MAX_INDEX_BYTES,
            initial_offset: 0,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum store size per segment.
    #[must_use]
    pub const fn max_store_bytes(mut self, size: u64) -> Self {
        self.max_store_bytes = size;
        self
    }

    /// Sets the maximum index size per segment.
    #[must_use]
    pub const fn max_index_bytes(mut self, size: u64) -> Self {
        self.max_index_bytes = size;
        self
    }

    /// Sets the offset of the first record in a new log.
    #[must_use]
    pub const fn initial_offset(mut self, offset: u64) -> Self {
        self.initial_offset = offset;
        self
    }

    /// Sets the index size to hold exactly `records` entries.
    #[must_use]
    pub const fn max_records_per_segment(mut self, records: u64) -> Self {
        self.max_index_bytes = records * ENTRY_WIDTH;
        self
    }

    /// Checks that a segment can hold at least one record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if either limit is too small.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_index_bytes < ENTRY_WIDTH {
            return Err(CoreError::invalid_config(format!(
                "max_index_bytes must be at least {ENTRY_WIDTH}, got {}",
                self.max_index_bytes
            )));
        }
        if self.max_store_bytes < LEN_WIDTH {
            return Err(CoreError::invalid_config(format!(
                "max_store_bytes must be at least {LEN_WIDTH}, got {}",
                self.max_store_bytes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.max_store_bytes, 1024);
        assert_eq!(config.max_index_bytes, 1024);
        assert_eq!(config.initial_offset, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .max_store_bytes(32)
            .max_records_per_segment(3)
            .initial_offset(16);

        assert_eq!(config.max_store_bytes, 32);
        assert_eq!(config.max_index_bytes, 36);
        assert_eq!(config.initial_offset, 16);
    }

    #[test]
    fn validate_rejects_tiny_limits() {
        assert!(Config::new().max_index_bytes(4).validate().is_err());
        assert!(Config::new().max_store_bytes(0).validate().is_err());
    }
}
