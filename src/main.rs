//! Entry point for tether, a local-first LLM harness for the terminal.
//!
//! This binary loads environment variables, parses CLI arguments via
//! [`cli`], and dispatches to the appropriate subcommand handler.

mod agents;
mod chat;
mod cli;
mod compression;
mod config;
mod constants;
mod executor;
mod injector;
mod message;
mod orchestrator;
mod output;
mod permissions;
mod provider;
mod tokens;
mod tools;
mod tracker;
mod vectors;

use anyhow::Result;

/// Runs the tether CLI.
///
/// Loads `.env` files (silently ignored if absent), initializes logging,
/// parses command-line arguments into a [`cli::Cli`] struct, and
/// dispatches the chosen subcommand via [`cli::run`].
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = cli::parse();
    cli::run(cli).await
}
