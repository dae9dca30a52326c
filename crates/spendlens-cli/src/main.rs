//! Spendlens CLI - Spending insights and subscription reports
//!
//! Usage:
//!   spendlens insights --file transactions.csv        Ranked spending insights
//!   spendlens subscriptions --file transactions.csv   Recurring charge report

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
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

    match cli.command {
        Commands::Insights { file, top, json } => commands::cmd_insights(&file, top, json),
        Commands::Subscriptions { file, json } => commands::cmd_subscriptions(&file, json),
    }
}
