//! CLI argument parsing for the `fts` tool.
//!
//! CLI flags override the config file and environment.

use clap::{Parser, Subcommand};

/// Full-text search bridge
///
/// Rewrites `fts:` markers in record filters and keeps search documents in
/// sync with records.
#[derive(Parser, Debug)]
#[command(name = "fts")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/fts-bridge/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Bridge commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rewrite the markers of a where filter into primary-key predicates
    Rewrite {
        /// Entity the filter applies to
        #[arg(short, long)]
        entity: String,

        /// Filter as a JSON object
        #[arg(short, long)]
        filter: String,
    },

    /// Upsert a record's searchable columns into its destinations
    Sync {
        /// Entity the record belongs to
        #[arg(short, long)]
        entity: String,

        /// Record as a JSON object
        #[arg(short, long)]
        record: String,
    },

    /// Delete a record's documents from its destinations
    Delete {
        /// Entity the record belongs to
        #[arg(short, long)]
        entity: String,

        /// Record as a JSON object (only the primary key is needed)
        #[arg(short, long)]
        record: String,
    },

    /// Print the effective configuration
    Config,
}
