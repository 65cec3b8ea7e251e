//! # SegLog Core
//!
//! Segmented, offset-addressed commit log.
//!
//! This crate provides:
//! - [`Log`]: append, read by offset, truncate, raw reader
//! - [`Segment`]: a store and index pair for a contiguous offset range
//! - [`LogFollower`]: async tailing of a growing log
//! - [`ErrorKind`]: error classification shared by every SegLog crate
//!
//! # Layout
//!
//! A log owns one directory. Each segment is a `{base_offset:020}.store`
//! and `{base_offset:020}.index` pair; a `LOCK` file keeps a second process
//! from opening the same directory.
//!
//! # Example
//!
//! ```no_run
//! use seglog_core::{Config, Log};
//!
//! let config = Config::default().max_store_bytes(64 * 1024);
//! let log = Log::open("/var/lib/seglog", config).unwrap();
//!
//! let offset = log.append(b"record").unwrap();
//! assert_eq!(log.read(offset).unwrap(), b"record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod dir;
mod error;
mod follower;
mod log;
mod reader;
mod segment;

pub use config::{Config, DEFAULT_MAX_INDEX_BYTES, DEFAULT_MAX_STORE_BYTES};
pub use dir::{parse_segment_file, DataDir, INDEX_EXTENSION, STORE_EXTENSION};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use follower::{LogFollower, Record};
pub use log::{Log, SegmentInfo};
pub use reader::LogReader;
pub use segment::Segment;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
