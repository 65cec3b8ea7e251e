//! # SegLog Storage
//!
//! The two files behind every log segment.
//!
//! Both types are **opaque to record contents**: they know about length
//! prefixes and index entries, nothing about offsets assignment, rotation
//! or replication.
//!
//! ## Available Files
//!
//! - [`Store`] - Append-only, length-prefixed payloads behind a buffered writer
//! - [`Index`] - Pre-allocated, memory-mapped `(relative offset, position)` table
//!
//! ## Example
//!
//! ```no_run
//! use seglog_storage::{Index, Store};
//! use std::path::Path;
//!
//! let store = Store::open(Path::new("0.store")).unwrap();
//! let mut index = Index::open(Path::new("0.index"), 1024).unwrap();
//!
//! let (_, position) = store.append(b"hello world").unwrap();
//! index.write(0, position).unwrap();
//!
//! let (_, position) = index.read(0).unwrap();
//! assert_eq!(store.read(position).unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod index;
mod store;

pub use error::{StorageError, StorageResult};
pub use index::{Index, ENTRY_WIDTH, OFFSET_WIDTH, POSITION_WIDTH};
pub use store::{Store, LEN_WIDTH};
