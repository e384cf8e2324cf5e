//! Binlog CLI
//!
//! Command-line tools for blob store binlogs.
//!
//! # Commands
//!
//! - `inspect` - Display header, size and recovery information
//! - `dump` - Dump records for debugging
//! - `verify` - Check that every record reads back and the log ends cleanly
//! - `append` - Append a single record

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Blob store binlog tools.
#[derive(Parser)]
#[command(name = "binlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the binlog file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display header, size and recovery information
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump records for debugging
    Dump {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Start from this LSN (default: first record)
        #[arg(short, long)]
        offset: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that every record reads back and the log ends cleanly
    Verify,

    /// Append a single record, creating the log if needed
    Append {
        /// Record type
        #[arg(short = 't', long = "type", value_enum)]
        record_type: commands::append::TypeArg,

        /// Blob key as hex, zero-padded to 64 bytes
        #[arg(short, long)]
        key: String,

        /// Record metadata
        #[arg(short, long)]
        meta: Option<String>,

        /// Record payload
        #[arg(short = 'd', long)]
        payload: Option<String>,

        /// Open with forced-synchronous writes
        #[arg(long)]
        sync: bool,

        /// Preallocation step for a new log, in bytes (0 disables)
        #[arg(long)]
        prealloc_step: Option<u64>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Binlog path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Dump {
            limit,
            offset,
            format,
        } => {
            let path = cli.path.ok_or("Binlog path required for dump")?;
            commands::dump::run(&path, limit, offset, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Binlog path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Append {
            record_type,
            key,
            meta,
            payload,
            sync,
            prealloc_step,
        } => {
            let path = cli.path.ok_or("Binlog path required for append")?;
            let request = commands::append::AppendRequest {
                record_type,
                key,
                meta: meta.unwrap_or_default(),
                payload: payload.unwrap_or_default(),
                sync,
                prealloc_step,
            };
            commands::append::run(&path, &request)?;
        }
        Commands::Version => {
            println!("Binlog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Binlog Core v{}", binlog_core::VERSION);
            println!("On-disk format v{}", binlog_core::BINLOG_VERSION);
        }
    }

    Ok(())
}
