//! # SegLog Server
//!
//! TCP log service for SegLog.
//!
//! This crate provides:
//! - [`LogService`]: produce, consume and streaming consume over a shared log
//! - [`LogServer`]: tokio TCP listener with graceful shutdown
//! - [`LogClient`]: the matching client, used by replication
//! - Authentication (HMAC-SHA256 tokens) and pluggable authorization
//!
//! # Authorization
//!
//! Every produce and consume asks an [`Authorizer`] whether the
//! connection's subject may perform the `produce` or `consume` action on
//! object `*`:
//!
//! ```rust,ignore
//! use seglog_server::{AclAuthorizer, LogService};
//!
//! let acl = AclAuthorizer::parse("p, root, *, produce\np, root, *, consume")?;
//! let service = LogService::new(log, Arc::new(acl));
//! ```
//!
//! # Authentication
//!
//! Optional. When enabled, a connection must open with a hello carrying a
//! token issued by [`TokenValidator::create_token`]; the token's subject
//! replaces whatever the client claimed.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod client;
mod config;
mod error;
mod handler;
mod server;

pub use auth::{AclAuthorizer, AllowAll, AuthConfig, Authorizer, TokenValidator, WILDCARD};
pub use client::{ConsumeStream, LogClient};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{LogService, Session, ANONYMOUS, CONSUME_ACTION, PRODUCE_ACTION};
pub use server::LogServer;
