//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// clickflow - click-event pipeline for shortened links
#[derive(Parser)]
#[command(name = "clickflow")]
#[command(version)]
#[command(about = "Queue consumer that enriches, deduplicates and stores link clicks", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Consume click events from the queue (default)
    Worker,

    /// Serve the HTTP ingest, stats and health endpoints
    #[cfg(feature = "server")]
    Serve,

    /// Push a single click event onto the queue
    Enqueue {
        /// Short link id
        #[arg(long)]
        url_id: String,

        /// Visitor IP address
        #[arg(long)]
        ip: String,

        #[arg(long)]
        user_agent: Option<String>,

        #[arg(long)]
        referrer: Option<String>,

        /// RFC 3339 or epoch milliseconds (default: now)
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Show queue depth per state
    QueueStatus,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: stdout)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
