//! The persisted workflow context.
//!
//! The context is the only state that survives between invocations of a
//! workflow. It is a flat record of booleans, an integer and two strings so
//! the driver can round-trip it opaquely. Stage flags can only be set, never
//! cleared.

use serde::{Deserialize, Serialize};

/// Identity of an idempotent stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    /// Existence precondition checked.
    Precondition,
    /// Primary create/update/delete issued and, where asynchronous, stabilized.
    PrimaryMutation,
    Tags,
    ManagedPolicies,
    CustomerManagedPolicies,
    PermissionsBoundary,
    InlinePolicy,
    /// Provisioning to accounts issued and stabilized.
    Provisioning,
}

impl StageId {
    /// All stage identifiers in canonical order.
    pub const ALL: [StageId; 8] = [
        StageId::Precondition,
        StageId::PrimaryMutation,
        StageId::Tags,
        StageId::ManagedPolicies,
        StageId::CustomerManagedPolicies,
        StageId::PermissionsBoundary,
        StageId::InlinePolicy,
        StageId::Provisioning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Precondition => "precondition",
            StageId::PrimaryMutation => "primary_mutation",
            StageId::Tags => "tags",
            StageId::ManagedPolicies => "managed_policies",
            StageId::CustomerManagedPolicies => "customer_managed_policies",
            StageId::PermissionsBoundary => "permissions_boundary",
            StageId::InlinePolicy => "inline_policy",
            StageId::Provisioning => "provisioning",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Continuation state passed between invocations of one workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowContext {
    started: bool,
    precondition_checked: bool,
    primary_mutation_done: bool,
    tags_done: bool,
    managed_policies_done: bool,
    customer_managed_policies_done: bool,
    permissions_boundary_done: bool,
    inline_policy_done: bool,
    provisioning_done: bool,
    retry_budget: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_id: Option<String>,
}

impl WorkflowContext {
    /// A fresh context for the first invocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the first invocation initialized the budget.
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn start(&mut self, budget: u32) {
        self.started = true;
        self.retry_budget = budget;
    }

    fn flag(&self, stage: StageId) -> bool {
        match stage {
            StageId::Precondition => self.precondition_checked,
            StageId::PrimaryMutation => self.primary_mutation_done,
            StageId::Tags => self.tags_done,
            StageId::ManagedPolicies => self.managed_policies_done,
            StageId::CustomerManagedPolicies => self.customer_managed_policies_done,
            StageId::PermissionsBoundary => self.permissions_boundary_done,
            StageId::InlinePolicy => self.inline_policy_done,
            StageId::Provisioning => self.provisioning_done,
        }
    }

    fn flag_mut(&mut self, stage: StageId) -> &mut bool {
        match stage {
            StageId::Precondition => &mut self.precondition_checked,
            StageId::PrimaryMutation => &mut self.primary_mutation_done,
            StageId::Tags => &mut self.tags_done,
            StageId::ManagedPolicies => &mut self.managed_policies_done,
            StageId::CustomerManagedPolicies => &mut self.customer_managed_policies_done,
            StageId::PermissionsBoundary => &mut self.permissions_boundary_done,
            StageId::InlinePolicy => &mut self.inline_policy_done,
            StageId::Provisioning => &mut self.provisioning_done,
        }
    }

    /// Returns true if the stage finished in an earlier attempt.
    pub fn is_completed(&self, stage: StageId) -> bool {
        self.flag(stage)
    }

    /// Marks a stage completed and drops its tracking token.
    pub fn complete_stage(&mut self, stage: StageId) {
        *self.flag_mut(stage) = true;
        self.tracking_token = None;
    }

    /// Stages that have completed, in canonical order.
    pub fn completed_stages(&self) -> Vec<StageId> {
        StageId::ALL
            .into_iter()
            .filter(|s| self.is_completed(*s))
            .collect()
    }

    /// Remaining retryable-failure allowance for the current stage.
    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    pub(crate) fn set_retry_budget(&mut self, budget: u32) {
        self.retry_budget = budget;
    }

    /// Tracking token of the current stage's pending backend operation.
    pub fn tracking_token(&self) -> Option<&str> {
        self.tracking_token.as_deref()
    }

    pub fn set_tracking_token(&mut self, token: impl Into<String>) {
        self.tracking_token = Some(token.into());
    }

    /// Backend-assigned identifier learned during the workflow.
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    pub fn set_resource_id(&mut self, id: impl Into<String>) {
        self.resource_id = Some(id.into());
    }

    /// Encodes the context as JSON.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Decodes a context previously produced by [`WorkflowContext::to_json`].
    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_nothing_completed() {
        let ctx = WorkflowContext::new();
        assert!(!ctx.is_started());
        assert!(ctx.completed_stages().is_empty());
        assert_eq!(ctx.retry_budget(), 0);
    }

    #[test]
    fn test_complete_stage_clears_token() {
        let mut ctx = WorkflowContext::new();
        ctx.set_tracking_token("req-1");
        ctx.complete_stage(StageId::PrimaryMutation);
        assert!(ctx.is_completed(StageId::PrimaryMutation));
        assert!(!ctx.is_completed(StageId::Tags));
        assert_eq!(ctx.tracking_token(), None);
    }

    #[test]
    fn test_wire_shape_is_flat() {
        let mut ctx = WorkflowContext::new();
        ctx.start(5);
        ctx.complete_stage(StageId::Tags);
        ctx.set_resource_id("arn:aws:sso:::permissionSet/ssoins-1234567890abcdef/ps-1234567890abcdef");
        let value = ctx.to_json().unwrap();

        assert_eq!(value["started"], true);
        assert_eq!(value["tagsDone"], true);
        assert_eq!(value["retryBudget"], 5);
        assert!(value.get("trackingToken").is_none());
        assert!(value
            .as_object()
            .unwrap()
            .values()
            .all(|v| v.is_boolean() || v.is_number() || v.is_string()));
    }

    #[test]
    fn test_roundtrip_and_missing_fields() {
        let mut ctx = WorkflowContext::new();
        ctx.start(3);
        ctx.complete_stage(StageId::Precondition);
        ctx.set_tracking_token("b0d9c1a4-0000-4000-8000-000000000000");
        let back = WorkflowContext::from_json(ctx.to_json().unwrap()).unwrap();
        assert_eq!(ctx, back);

        let sparse = WorkflowContext::from_json(serde_json::json!({"started": true})).unwrap();
        assert!(sparse.is_started());
        assert!(!sparse.is_completed(StageId::Precondition));
    }
}
