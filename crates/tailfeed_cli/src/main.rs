//! tailfeed CLI
//!
//! Command-line tools for the tailfeed change feed.
//!
//! # Commands
//!
//! - `serve` - Serve the SSE change feed over an in-memory oplog
//! - `cursor decode` - Decode a resumption cursor
//! - `cursor now` - Print the current wall-clock cursor
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// tailfeed change-feed tools.
#[derive(Parser)]
#[command(name = "tailfeed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the change feed over an in-memory oplog
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Comma-separated resource names
        #[arg(short, long)]
        resources: String,

        /// Comma-separated verbs (create, update, delete)
        #[arg(long, default_value = "create")]
        verbs: String,

        /// Keepalive period in seconds
        #[arg(long, default_value = "3")]
        ticker_secs: u64,

        /// Insert a demo document into each resource every N seconds
        #[arg(long)]
        demo_interval: Option<u64>,

        /// Maximum number of oplog entries kept in memory
        #[arg(long, default_value = "10000")]
        retain: usize,
    },

    /// Cursor utilities
    Cursor {
        #[command(subcommand)]
        action: CursorAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum CursorAction {
    /// Decode a cursor into its timestamp pair
    Decode {
        /// Cursor in `{high}_{low}` form
        cursor: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the cursor for the current wall-clock time
    Now {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            resources,
            verbs,
            ticker_secs,
            demo_interval,
            retain,
        } => {
            let options = commands::serve::ServeOptions {
                bind,
                resources,
                verbs,
                ticker_secs,
                demo_interval,
                retain,
            };
            commands::serve::run(options).await?;
        }
        Commands::Cursor { action } => match action {
            CursorAction::Decode { cursor, format } => {
                commands::cursor::decode(&cursor, &format)?;
            }
            CursorAction::Now { format } => {
                commands::cursor::now(&format)?;
            }
        },
        Commands::Version => {
            println!("tailfeed CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
