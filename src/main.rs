//! # Shop Compare CLI (`shopc`)
//!
//! The `shopc` binary runs the comparison pipeline from the terminal and
//! starts the HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! shopc --config ./config/shopc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shopc serve` | Start the HTTP API server |
//! | `shopc search "<query>"` | Search both retailers and print ranked results |
//! | `shopc interpret "<query>"` | Print the facets extracted from a query |
//! | `shopc sources` | List retailer adapters and their status |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use shop_compare::{config, search, server, sources};

/// Shop Compare CLI: live price and relevance comparison across retailers.
///
/// Commands that need configuration read the TOML file given by
/// `--config`. When that file does not exist the built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "shopc",
    about = "Shop Compare: search Amazon and Nike at once and rank the results",
    version,
    long_about = "Shop Compare interprets a shopping query, scrapes two retailers concurrently, \
    scores every listing for relevance with a hard category gate, and merges the results into \
    a first page and a load-more page. Available as a CLI and as a JSON HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/shopc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,

    /// Search both retailers and print the ranked results.
    Search {
        /// Free-text shopping query.
        query: String,

        /// Print the API-shaped JSON response instead of a listing.
        #[arg(long)]
        json: bool,
    },

    /// Show how a query is interpreted (words, brands, categories, flags).
    Interpret {
        query: String,
    },

    /// List the retailer adapters and their status.
    Sources,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_or_default(path: &std::path::Path) -> anyhow::Result<config::Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::warn!(path = %path.display(), "config file not found; using defaults");
        Ok(config::Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let cfg = load_or_default(&cli.config)?;
            server::run_server(&cfg).await?;
        }
        Commands::Search { query, json } => {
            let cfg = load_or_default(&cli.config)?;
            search::run_search(&cfg, &query, json).await?;
        }
        Commands::Interpret { query } => {
            search::run_interpret(&query)?;
        }
        Commands::Sources => {
            let cfg = load_or_default(&cli.config)?;
            sources::list_sources(&cfg)?;
        }
    }

    Ok(())
}
