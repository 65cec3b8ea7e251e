//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod serve;
