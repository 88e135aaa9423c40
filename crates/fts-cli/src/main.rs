//! fts: full-text search bridge CLI
//!
//! Rewrites `fts:` markers in record filters into primary-key predicates and
//! keeps external search documents in sync with records.
//!
//! # Usage
//!
//! ```bash
//! fts rewrite --entity post --filter '{"content":"fts:alpha"}'
//! fts sync --entity post --record '{"id":1,"title":"T","content":"C"}'
//! fts delete --entity post --record '{"id":1}'
//! fts config
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/fts-bridge/config.toml)
//! 3. CLI config file (--config)
//! 4. Environment variables (FTS_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use fts_cli::{init_logging, load_settings, run_delete, run_rewrite, run_sync, show_config, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Rewrite { entity, filter } => {
            println!("{}", run_rewrite(&settings, &entity, &filter).await?);
        }
        Commands::Sync { entity, record } => {
            run_sync(&settings, &entity, &record).await?;
        }
        Commands::Delete { entity, record } => {
            run_delete(&settings, &entity, &record).await?;
        }
        Commands::Config => {
            print!("{}", show_config(&settings)?);
        }
    }

    Ok(())
}
