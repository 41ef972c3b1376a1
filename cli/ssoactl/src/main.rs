//! ssoactl - drive identity-center workflows against a local sandbox.
//!
//! Each `invoke` runs exactly one handler invocation against a file-backed
//! in-memory backend, the way the orchestration driver would, and prints the
//! resulting progress event. Feeding the printed callback context back in
//! continues the workflow.

use anyhow::Result;
use clap::Parser;

mod commands;
mod config;
mod error;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
