//! CLI module - command-line interface for miru
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// miru - watch-session companion for torrented anime
#[derive(Parser)]
#[command(name = "miru")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pick a downloaded episode and walk through the watch flow (default)
    #[command(alias = "w")]
    Watch,

    /// Authorize with AniList and store the access token
    #[command(alias = "a")]
    Auth,

    /// Force a refresh of the ID crosswalk dataset
    #[command(alias = "r")]
    Refresh,

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Create a default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
