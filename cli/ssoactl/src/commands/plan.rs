//! Tag reconciliation preview.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use ssoa_api::Tag;
use ssoa_reconcile::ReconciliationPlan;
use tabled::Tabled;

use crate::config::read_json;
use crate::output::{print_output, print_success, OutputFormat};

use super::CommandContext;

/// Show the untag and tag calls that turn the observed tags into the desired
/// tags.
///
/// Each document is either an object of key/value pairs or a list of
/// `{"Key": .., "Value": ..}` entries.
#[derive(Debug, Args)]
pub struct PlanTagsCommand {
    /// Tags currently on the resource.
    observed: PathBuf,

    /// Tags the resource should end up with.
    desired: PathBuf,
}

#[derive(Debug, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
struct TagChange {
    #[tabled(rename = "CHANGE")]
    change: String,
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

impl PlanTagsCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let observed = parse_tags(read_json(&self.observed)?)?;
        let desired = parse_tags(read_json(&self.desired)?)?;
        let plan = ReconciliationPlan::compute(&observed, &desired);

        if plan.is_empty() && ctx.format == OutputFormat::Table {
            print_success("Tags already match");
            return Ok(());
        }

        print_output(&changes(&plan, ctx.format), ctx.format);
        Ok(())
    }
}

fn changes(plan: &ReconciliationPlan<Tag>, format: OutputFormat) -> Vec<TagChange> {
    let label = |text: &str, add: bool| match format {
        OutputFormat::Json => text.to_string(),
        OutputFormat::Table if add => text.green().to_string(),
        OutputFormat::Table => text.red().to_string(),
    };

    // Removals are issued first.
    plan.to_remove
        .iter()
        .map(|t| (t, label("remove", false)))
        .chain(plan.to_add.iter().map(|t| (t, label("add", true))))
        .map(|(tag, change)| TagChange {
            change,
            key: tag.key.clone(),
            value: tag.value.clone(),
        })
        .collect()
}

fn parse_tags(doc: Value) -> Result<BTreeSet<Tag>> {
    match doc {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(value) => Ok(Tag::new(key, value)),
                other => bail!("Tag {key} must have a string value, got {other}"),
            })
            .collect(),
        Value::Array(_) => {
            let tags: Vec<Tag> = serde_json::from_value(doc)?;
            let count = tags.len();
            let set: BTreeSet<Tag> = tags.into_iter().collect();
            let keys: BTreeSet<&str> = set.iter().map(|t| t.key.as_str()).collect();
            if keys.len() != count {
                bail!("Tag document repeats a key");
            }
            Ok(set)
        }
        other => bail!("Tag document must be an object or a list, got {other}"),
    }
}
