//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "deepsearch",
    version,
    author = "neur0map",
    about = "Query decomposition and fan-out retrieval over a knowledge base",
    long_about = "deepsearch rewrites a query into focused sub-queries with a fine-tuned model, \
                  searches a remote knowledge-base collection for each of them concurrently, \
                  and merges the passages into one deduplicated ranking."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/deepsearch/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the search HTTP API
    Serve {
        /// Address to bind (overrides server.bind_address)
        #[arg(short, long)]
        bind: Option<String>,

        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a single knowledge-base search
    Search {
        /// Search query text
        query: String,

        /// Maximum number of results to return
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Decompose the query, search every sub-query and merge the results
    DeepSearch {
        /// Search query text
        query: String,

        /// Maximum number of results to return
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the sub-queries the decomposition model produces
    Decompose {
        /// Query to decompose
        query: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
