//! Tally CLI - Finance dashboard transactions in the terminal
//!
//! Usage:
//!   tally list --page 2 --sort amount    Show one page of transactions
//!   tally stats --period yearly          Show category statistics
//!   tally browse                         Interactive session with undo
//!   tally --backend mock browse          Same, against built-in demo data

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(
        cli.config.as_deref(),
        cli.api_url.as_deref(),
        cli.backend.as_deref(),
    )?;

    match cli.command {
        Commands::List {
            page,
            sort,
            desc,
            asc,
            json,
        } => {
            let sort = commands::resolve_sort(&config, sort.as_deref(), desc, asc)?;
            commands::cmd_list(&config, page, sort, json).await
        }
        Commands::Stats { period, date, json } => {
            let query = commands::resolve_statistics_query(
                &config,
                period.as_deref(),
                date.as_deref(),
            )?;
            commands::cmd_stats(&config, query, json).await
        }
        Commands::Browse => commands::cmd_browse(&config).await,
    }
}
