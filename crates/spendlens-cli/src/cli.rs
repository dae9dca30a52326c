//! CLI argument definitions using clap
//!
//! This module contains the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Spendlens - Understand where the money goes
#[derive(Parser)]
#[command(name = "spendlens")]
#[command(about = "Spending insights and subscription detection", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a transaction history and print ranked spending insights
    Insights {
        /// Transaction CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum number of insights to report
        #[arg(short, long, default_value_t = 7)]
        top: usize,

        /// Emit the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Detect recurring subscriptions in a transaction history
    Subscriptions {
        /// Transaction CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Emit the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}
