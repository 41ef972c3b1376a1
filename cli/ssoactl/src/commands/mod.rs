//! CLI commands.

mod invoke;
mod plan;
mod sandbox;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ssoa_handlers::{init_tracing, HandlerConfig, LogFormat};
use ssoa_testing::MemoryBackend;

use crate::config::default_sandbox_path;
use crate::output::OutputFormat;

/// ssoactl - Run identity-center reconciliation workflows against a local sandbox.
#[derive(Debug, Parser)]
#[command(name = "ssoactl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Sandbox state file.
    #[arg(long, global = true, env = "SSOA_SANDBOX")]
    sandbox: Option<PathBuf>,

    /// Log format on stderr (json or pretty).
    #[arg(long, global = true, env = "SSOA_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one handler invocation and print the progress event.
    Invoke(invoke::InvokeCommand),

    /// Show the tag changes that turn one tag document into another.
    PlanTags(plan::PlanTagsCommand),

    /// Inspect or change the sandbox backend.
    Sandbox(sandbox::SandboxCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = match self.format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        };

        // Everything except the log format comes from SSOA_* variables.
        let mut handler_config =
            HandlerConfig::from_env().context("Invalid handler configuration")?;
        handler_config.log_format = self.log_format;
        init_tracing(&handler_config.log_level, handler_config.log_format);

        let sandbox_path = match self.sandbox {
            Some(path) => path,
            None => default_sandbox_path()?,
        };

        let ctx = CommandContext {
            format,
            sandbox_path,
            handler_config,
        };

        match self.command {
            Commands::Invoke(cmd) => cmd.run(ctx).await,
            Commands::PlanTags(cmd) => cmd.run(ctx),
            Commands::Sandbox(cmd) => cmd.run(ctx),
            Commands::Version => {
                println!("ssoactl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub format: OutputFormat,
    pub sandbox_path: PathBuf,
    pub handler_config: HandlerConfig,
}

impl CommandContext {
    /// Loads the sandbox backend from its state file.
    pub fn open_sandbox(&self) -> Result<MemoryBackend> {
        Ok(MemoryBackend::open(&self.sandbox_path).map_err(crate::error::CliError::from)?)
    }

    /// Persists the sandbox backend.
    pub fn save_sandbox(&self, backend: &MemoryBackend) -> Result<()> {
        backend
            .save(&self.sandbox_path)
            .map_err(crate::error::CliError::from)?;
        Ok(())
    }
}
