//! Single handler invocations against the sandbox.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use ssoa_api::ApiError;
use ssoa_events::{Action, HandlerRequest, ProgressEvent};
use ssoa_handlers::Dispatcher;
use ssoa_reconcile::WorkflowContext;
use ssoa_testing::{MemoryBackend, Operation};
use tracing::debug;

use crate::config::{read_json, write_json};
use crate::error::CliError;
use crate::output::{print_event, print_info, OutputFormat};

use super::CommandContext;

/// Upper bound on invocations with `--follow`.
const MAX_FOLLOW_INVOCATIONS: usize = 100;

/// Run one invocation of a resource handler.
#[derive(Debug, Args)]
pub struct InvokeCommand {
    /// Action to run (create, read, update, delete, list).
    action: Action,

    /// Resource type name, e.g. AWS::SSO::PermissionSet.
    #[arg(long = "type", short = 't')]
    type_name: String,

    /// Desired model as a JSON file, or `-` for stdin.
    #[arg(long, short = 'm')]
    model: PathBuf,

    /// Previous model for updates.
    #[arg(long)]
    previous: Option<PathBuf>,

    /// Callback context returned by the previous invocation.
    #[arg(long, short = 'c')]
    context: Option<PathBuf>,

    /// Write the returned callback context to this file.
    #[arg(long)]
    save_context: Option<PathBuf>,

    /// Pagination token for list actions.
    #[arg(long)]
    next_token: Option<String>,

    /// Make the next call of an operation fail, as OPERATION:EXCEPTION[:MESSAGE].
    /// May be repeated.
    #[arg(long = "fail")]
    faults: Vec<String>,

    /// Keep invoking with the returned context until the workflow ends.
    /// Callback delays are not waited out.
    #[arg(long)]
    follow: bool,
}

/// A scripted backend failure.
#[derive(Debug, Clone, PartialEq)]
struct Fault {
    operation: Operation,
    error: ApiError,
}

fn parse_fault(raw: &str) -> Result<Fault, CliError> {
    let mut parts = raw.splitn(3, ':');
    let (Some(operation), Some(code)) = (parts.next(), parts.next()) else {
        return Err(CliError::InvalidFault(raw.to_string()));
    };
    if code.is_empty() {
        return Err(CliError::InvalidFault(raw.to_string()));
    }
    let operation: Operation = operation
        .parse()
        .map_err(|_| CliError::UnknownOperation(operation.to_string()))?;
    let message = parts.next().unwrap_or("Injected by ssoactl");
    Ok(Fault {
        operation,
        error: ApiError::from_service(code, message),
    })
}

impl InvokeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let faults = self
            .faults
            .iter()
            .map(|f| parse_fault(f))
            .collect::<Result<Vec<_>, _>>()?;

        let desired: Value = read_json(&self.model)?;
        let previous: Option<Value> = self.previous.as_deref().map(read_json).transpose()?;
        let context: Option<WorkflowContext> =
            self.context.as_deref().map(read_json).transpose()?;

        let backend = Arc::new(ctx.open_sandbox()?);
        for fault in faults {
            debug!(operation = %fault.operation, error = %fault.error, "Fault scripted");
            backend.fail_next(fault.operation, fault.error);
        }
        let dispatcher = Dispatcher::new(backend.clone(), ctx.handler_config.clone());

        let mut request = HandlerRequest::new(self.action, self.type_name, desired)
            .with_context(context)
            .with_next_token(self.next_token);
        if let Some(previous) = previous {
            request = request.with_previous(previous);
        }

        let result = if self.follow {
            follow(&dispatcher, &backend, request, ctx.format).await
        } else {
            let event = dispatcher.handle(request).await;
            print_event(&event, ctx.format);
            Ok(event)
        };
        // Whatever happened on the backend stays, even if the workflow failed.
        ctx.save_sandbox(&backend)?;
        let event = result?;

        if let Some(path) = &self.save_context {
            match &event.callback_context {
                Some(context) => write_json(path, context)?,
                None => {
                    if path.exists() {
                        std::fs::remove_file(path)
                            .with_context(|| format!("Failed to remove {:?}", path))?;
                    }
                }
            }
        }
        Ok(())
    }
}

async fn follow(
    dispatcher: &Dispatcher,
    backend: &MemoryBackend,
    request: HandlerRequest<Value, WorkflowContext>,
    format: OutputFormat,
) -> Result<ProgressEvent<Value, WorkflowContext>> {
    let mut context = request.callback_context.clone();
    for invocation in 1..=MAX_FOLLOW_INVOCATIONS {
        let event = dispatcher
            .handle(request.clone().with_context(context))
            .await;
        if format == OutputFormat::Table {
            print_info(&format!(
                "Invocation {invocation} ({} backend calls so far)",
                backend.calls().len()
            ));
        }
        print_event(&event, format);
        if event.is_terminal() {
            return Ok(event);
        }
        context = event.callback_context.clone();
    }
    Err(CliError::DidNotFinish(MAX_FOLLOW_INVOCATIONS).into())
}
