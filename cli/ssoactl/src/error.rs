//! Error handling and display for the CLI.

use colored::Colorize;
use ssoa_testing::SandboxError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid fault '{0}', expected OPERATION:EXCEPTION[:MESSAGE]")]
    InvalidFault(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Workflow did not finish after {0} invocations")]
    DidNotFinish(usize),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::InvalidFault(_) | CliError::UnknownOperation(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: operations use their API names, e.g. ListAccountAssignments:ThrottlingException"
                        .yellow()
                );
            }
            CliError::Sandbox(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Run `ssoactl sandbox reset` to start from an empty sandbox.".yellow()
                );
            }
            CliError::DidNotFinish(_) => {}
        }
    }

    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".dimmed(), cause);
    }
}
