//! Sandbox management.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use ssoa_id::{PermissionSetArn, PermissionSetName};
use ssoa_testing::{MemoryBackend, SandboxSettings, SandboxState};
use tabled::Tabled;

use crate::output::{print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Inspect or change the sandbox backend.
#[derive(Debug, Args)]
pub struct SandboxCommand {
    #[command(subcommand)]
    command: SandboxSubcommand,
}

#[derive(Debug, Subcommand)]
enum SandboxSubcommand {
    /// Show what the sandbox holds.
    Show,

    /// Replace the sandbox with an empty one.
    Reset {
        /// Items per listing page.
        #[arg(long, default_value_t = 100)]
        page_size: usize,

        /// Status checks an asynchronous request stays in progress.
        #[arg(long, default_value_t = 1)]
        pending_polls: u32,
    },

    /// Make the next submitted asynchronous request settle as failed.
    FailNextRequest {
        /// Failure reason the status check reports.
        reason: String,
    },

    /// Seed an empty permission set with a known ARN.
    SeedPermissionSet {
        /// Permission set ARN.
        #[arg(long)]
        arn: String,

        /// Permission set name.
        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
struct SandboxSummary {
    #[tabled(rename = "PATH")]
    path: String,
    #[tabled(rename = "PAGE SIZE")]
    page_size: usize,
    #[tabled(rename = "PENDING POLLS")]
    pending_polls: u32,
    #[tabled(rename = "ASSIGNMENTS")]
    assignments: usize,
    #[tabled(rename = "PERMISSION SETS")]
    permission_sets: usize,
}

impl SandboxCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            SandboxSubcommand::Show => show(&ctx),
            SandboxSubcommand::Reset {
                page_size,
                pending_polls,
            } => reset(
                &ctx,
                SandboxSettings {
                    page_size,
                    pending_polls,
                },
            ),
            SandboxSubcommand::FailNextRequest { reason } => {
                let backend = ctx.open_sandbox()?;
                backend.fail_next_request(reason);
                ctx.save_sandbox(&backend)?;
                print_success("The next asynchronous request will fail");
                Ok(())
            }
            SandboxSubcommand::SeedPermissionSet { arn, name } => seed(&ctx, &arn, &name),
        }
    }
}

fn summarize(ctx: &CommandContext, state: &SandboxState) -> SandboxSummary {
    SandboxSummary {
        path: ctx.sandbox_path.display().to_string(),
        page_size: state.settings().page_size,
        pending_polls: state.settings().pending_polls,
        assignments: state.assignment_count(),
        permission_sets: state.permission_set_count(),
    }
}

fn show(ctx: &CommandContext) -> Result<()> {
    let state = ctx.open_sandbox()?.snapshot();
    match ctx.format {
        OutputFormat::Json => print_single(&state),
        OutputFormat::Table => print_output(&[summarize(ctx, &state)], ctx.format),
    }
    Ok(())
}

fn reset(ctx: &CommandContext, settings: SandboxSettings) -> Result<()> {
    let backend = MemoryBackend::with_settings(settings);
    ctx.save_sandbox(&backend)?;
    match ctx.format {
        OutputFormat::Json => print_single(&summarize(ctx, &backend.snapshot())),
        OutputFormat::Table => print_success(&format!(
            "Reset sandbox at {}",
            ctx.sandbox_path.display()
        )),
    }
    Ok(())
}

fn seed(ctx: &CommandContext, arn: &str, name: &str) -> Result<()> {
    let arn = PermissionSetArn::parse(arn).context("Invalid permission set ARN")?;
    let name = PermissionSetName::parse(name).context("Invalid permission set name")?;

    let backend = ctx.open_sandbox()?;
    backend.insert_permission_set(arn, name);
    ctx.save_sandbox(&backend)?;
    print_success("Permission set seeded");
    Ok(())
}
