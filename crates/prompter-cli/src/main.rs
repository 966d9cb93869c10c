//! Prompter CLI — serve the script engine over MCP stdio, replay recorded
//! cassettes, and list the available scripts.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Prompter CLI — suspendable script engine for coding agents
#[derive(Parser)]
#[command(name = "prompter", version, about = "Suspendable script engine for coding agents")]
pub struct Cli {
    /// Record the session into this cassette file (serve mode)
    #[arg(long, env = "PROMPTER_CASSETTE")]
    cassette: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the script engine as an MCP server over stdio
    Serve {
        /// Working directory scripts run in (defaults to the current one)
        #[arg(long)]
        working_dir: Option<PathBuf>,
    },

    /// Replay a recorded cassette and verify every response matches
    Replay {
        /// Path to the cassette file
        cassette: PathBuf,
    },

    /// List the registered scripts
    Scripts,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prompter_core=warn,prompter_cli=info".into()),
        )
        // stdout carries the MCP protocol in serve mode
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve { working_dir } => commands::serve::run(working_dir, cli.cassette).await,
        Commands::Replay { cassette } => commands::replay::run(&cassette).await,
        Commands::Scripts => commands::scripts::run().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
