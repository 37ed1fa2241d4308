//! CLI module for the user token API
//!
//! - `serve`: run the HTTP API
//! - `migrate`: apply PostgreSQL migrations and exit

pub mod migrate;
pub mod serve;

use clap::{Args, Parser, Subcommand};

/// User registration and JWT issuance service
#[derive(Parser)]
#[command(name = "user-token-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve(ServeArgs),

    /// Apply database migrations and exit
    Migrate,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the configured storage backend (memory or postgres)
    #[arg(long)]
    pub storage: Option<String>,

    /// Override the configured listen port
    #[arg(long)]
    pub port: Option<u16>,
}
