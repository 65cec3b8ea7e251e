//! # SegLog Protocol
//!
//! Wire messages and framing for SegLog.
//!
//! This crate provides:
//! - [`Request`] / [`Response`] messages for produce, consume and streaming
//! - [`Status`] codes and their mapping from [`seglog_core::ErrorKind`]
//! - Length-prefixed CBOR frames over any `tokio` byte stream
//!
//! Payloads travel as [`bytes::Bytes`] and are never inspected.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod messages;

pub use error::{ProtocolError, ProtocolResult};
pub use frame::{decode, encode, read_frame, write_frame, MAX_FRAME_BYTES};
pub use messages::{Record, Request, Response, Status, PROTOCOL_VERSION};
