//! SegLog CLI
//!
//! Runs a SegLog node and inspects log directories.
//!
//! # Commands
//!
//! - `serve` - Run a node until interrupted
//! - `inspect` - Display the segment table of a log directory
//! - `dump` - Print records by offset
//! - `version` - Show version information

mod commands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use seglog_core::{Config, DEFAULT_MAX_INDEX_BYTES, DEFAULT_MAX_STORE_BYTES};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SegLog distributed commit log.
#[derive(Parser)]
#[command(name = "seglog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a node until interrupted
    Serve {
        /// Directory holding the node's log
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Address the RPC server binds to
        #[arg(short, long, default_value = "127.0.0.1:8400")]
        bind: SocketAddr,

        /// Unique node name (random if omitted)
        #[arg(short, long)]
        node_name: Option<String>,

        /// Peer to replicate from, as name=addr (repeatable)
        #[arg(long = "peer", value_parser = commands::serve::parse_peer)]
        peers: Vec<(String, String)>,

        /// Access policy file
        #[arg(long)]
        acl_policy: Option<PathBuf>,

        /// Shared cluster secret enabling token authentication
        #[arg(long)]
        auth_secret: Option<String>,

        #[command(flatten)]
        limits: LogLimits,
    },

    /// Display the segment table of a stopped node's log
    ///
    /// Opening the log runs the same recovery a node does on start: an
    /// incomplete record at the end of a segment is dropped, a last segment
    /// that is full under the given limits gets a new empty successor, and
    /// index files are resized to --max-index-bytes.
    Inspect {
        /// Path to the log directory
        #[arg(short, long)]
        path: PathBuf,

        #[command(flatten)]
        limits: LogLimits,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print records of a stopped node's log
    ///
    /// Opening the log runs the same recovery a node does on start: an
    /// incomplete record at the end of a segment is dropped, a last segment
    /// that is full under the given limits gets a new empty successor, and
    /// index files are resized to --max-index-bytes.
    Dump {
        /// Path to the log directory
        #[arg(short, long)]
        path: PathBuf,

        /// Start from this offset (lowest offset if omitted)
        #[arg(short, long)]
        offset: Option<u64>,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        #[command(flatten)]
        limits: LogLimits,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Show version information
    Version,
}

/// Segment limits. Use the values the node runs with: opening a log whose
/// last segment is full under these limits starts a new segment.
#[derive(Args)]
struct LogLimits {
    /// Maximum store file size per segment
    #[arg(long, default_value_t = DEFAULT_MAX_STORE_BYTES)]
    max_store_bytes: u64,

    /// Maximum index file size per segment
    #[arg(long, default_value_t = DEFAULT_MAX_INDEX_BYTES)]
    max_index_bytes: u64,
}

impl LogLimits {
    fn config(&self) -> Config {
        Config::new()
            .max_store_bytes(self.max_store_bytes)
            .max_index_bytes(self.max_index_bytes)
    }
}

/// Output format for inspection commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            data_dir,
            bind,
            node_name,
            peers,
            acl_policy,
            auth_secret,
            limits,
        } => {
            let node_name = node_name.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let options = commands::serve::ServeOptions {
                data_dir,
                bind,
                node_name,
                peers,
                acl_policy,
                auth_secret,
                log: limits.config(),
            };
            commands::serve::run(options)?;
        }
        Commands::Inspect {
            path,
            limits,
            format,
        } => {
            commands::inspect::run(&path, limits.config(), format)?;
        }
        Commands::Dump {
            path,
            offset,
            limit,
            limits,
            format,
        } => {
            commands::dump::run(&path, limits.config(), offset, limit, format)?;
        }
        Commands::Version => {
            println!("SegLog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("SegLog Core v{}", seglog_core::VERSION);
            println!("Protocol version {}", seglog_protocol::PROTOCOL_VERSION);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn inspection_help_describes_recovery() {
        let cli = Cli::command();
        for name in ["inspect", "dump"] {
            let help = cli
                .find_subcommand(name)
                .and_then(|c| c.get_long_about())
                .map(ToString::to_string)
                .unwrap();
            assert!(help.contains("incomplete record"), "{name}: {help}");
            assert!(help.contains("new empty successor"), "{name}: {help}");
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
