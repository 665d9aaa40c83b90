//! Command-line interface for strictly_bulls.

use clap::{Parser, Subcommand};

/// Strictly Bulls - Bulls and Cows game server
#[derive(Parser, Debug)]
#[command(name = "strictly_bulls")]
#[command(about = "Bulls and Cows game server with two-player sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP and WebSocket game server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Path to the database file (overrides config and DATABASE_URL)
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Apply pending database migrations and exit
    Migrate {
        /// Path to the database file (created if it doesn't exist)
        #[arg(long, default_value = "strictly_bulls.db")]
        db_path: String,
    },
}
