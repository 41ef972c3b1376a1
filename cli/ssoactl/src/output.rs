//! Output formatting for CLI commands.

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use ssoa_events::{OperationStatus, ProgressEvent};
use ssoa_reconcile::WorkflowContext;
use tabled::{Table, Tabled};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

/// Print data in the specified format.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No items found.".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => println!("{}", format_json(data, "[]")),
    }
}

/// Print a single item as JSON.
pub fn print_single<T: Serialize>(data: &T) {
    println!("{}", format_json(data, "{}"));
}

pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

fn format_json<T: Serialize + ?Sized>(data: &T, fallback: &str) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| fallback.to_string())
}

fn colored_status(status: OperationStatus) -> String {
    let text = status.to_string();
    match status {
        OperationStatus::Success => text.green().bold().to_string(),
        OperationStatus::InProgress => text.yellow().bold().to_string(),
        OperationStatus::Failed => text.red().bold().to_string(),
    }
}

/// Print one progress event.
///
/// JSON output is the event exactly as a driver would receive it.
pub fn print_event(event: &ProgressEvent<Value, WorkflowContext>, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_single(event);
        return;
    }

    println!("{} {}", "Status:".bold(), colored_status(event.status));
    if event.status == OperationStatus::InProgress {
        println!("{} {}s", "Callback delay:".bold(), event.callback_delay_seconds);
    }
    if let Some(code) = &event.error_code {
        println!("{} {}", "Error code:".bold(), code.to_string().red());
    }
    if let Some(message) = &event.message {
        println!("{} {}", "Message:".bold(), message);
    }
    if let Some(ctx) = &event.callback_context {
        let completed: Vec<&str> = ctx.completed_stages().iter().map(|s| s.as_str()).collect();
        println!(
            "{} {}",
            "Completed stages:".bold(),
            if completed.is_empty() { "-".to_string() } else { completed.join(", ") }
        );
        println!("{} {}", "Retry budget:".bold(), ctx.retry_budget());
    }
    if let Some(model) = &event.resource_model {
        println!("{}", "Resource model:".bold());
        print_single(model);
    }
    if let Some(models) = &event.resource_models {
        println!("{} {}", "Resource models:".bold(), models.len());
        print_single(models);
    }
    if let Some(token) = &event.next_token {
        println!("{} {}", "Next token:".bold(), token);
    }
}
