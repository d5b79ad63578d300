//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line arguments,
//! and a `Commands` enum that represents the available subcommands and their
//! options.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use semantic_path::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Commands::Path { start, end, .. } => println!("{start} -> {end}"),
//!     _ => {}
//! }
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::index::IndexBackend;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// Path to the YAML config file (defaults to the per-user config directory).
    #[arg(long, global = true, env = "SPATH_CONFIG")]
    pub config: Option<PathBuf>,

    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Compute a semantic path between two labels.
    #[clap(name = "path", alias = "p")]
    Path {
        /// Label to start from.
        start: String,

        /// Label to end at.
        end: String,

        /// Neighbours considered at each hop.
        #[arg(short = 'k', long)]
        k: Option<usize>,

        /// Maximum length of the returned path.
        #[arg(short = 'm', long = "max-steps")]
        max_steps: Option<usize>,

        /// Print the path as JSON instead of a timeline.
        #[arg(long)]
        json: bool,
    },

    /// Embed a JSON Lines catalog and write a vector store.
    #[clap(name = "ingest")]
    Ingest {
        /// JSON Lines file of `{code, label, description, source_tag}` records.
        input: PathBuf,

        /// Where to write the store (defaults to `store_path` from the config).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Serve the path API over HTTP.
    #[clap(name = "serve", alias = "s")]
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        /// Override the configured index backend.
        #[arg(long, value_enum)]
        backend: Option<IndexBackend>,
    },

    /// Write a default configuration file.
    Init,
}
