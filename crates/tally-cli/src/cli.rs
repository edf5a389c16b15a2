//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Browse, recategorize and undo dashboard transactions
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Terminal client for the finance dashboard API", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ~/.config/tally/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the dashboard API (overrides config and TALLY_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Backend to use: http or mock (mock serves built-in demo data)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List one page of transactions
    List {
        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Sort field: date, description, amount, type
        #[arg(short, long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long, conflicts_with = "asc")]
        desc: bool,

        /// Sort ascending
        #[arg(long)]
        asc: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show category statistics
    Stats {
        /// Period: monthly, yearly, all_time
        #[arg(short, long)]
        period: Option<String>,

        /// Target date (YYYY-MM-DD); defaults to the latest month on the server
        #[arg(short, long)]
        date: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive session: page, sort, filter, recategorize, delete, undo
    ///
    /// Reads one command per line from stdin. Type `help` for the list.
    Browse,
}
