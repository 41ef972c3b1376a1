//! Permission set workflow stages.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use ssoa_api::{PermissionSetApi, ProvisionTarget};
use ssoa_events::HandlerErrorCode;
use ssoa_id::{InstanceArn, PermissionSetArn, RequestId};
use ssoa_reconcile::{
    reconcile_set, ApiError, Finalizer, PollStatus, StabilizationPoller, Stage, StageError,
    StageId, StageOutcome, StageStatus, StatusSource, WorkflowContext,
};
use tracing::{debug, info};

use super::children::{CustomerManagedPolicies, ManagedPolicies, Tags, Target};
use super::{parse_policy, read_full, PermissionSetModel};

/// The permission set a stage works on: the model's ARN, else the one
/// learned during creation.
pub(super) fn resolve_arn(
    desired: &PermissionSetModel,
    ctx: &WorkflowContext,
) -> Result<PermissionSetArn, StageError> {
    if let Some(arn) = &desired.permission_set_arn {
        return Ok(arn.clone());
    }
    match ctx.resource_id() {
        Some(id) => PermissionSetArn::parse(id).map_err(|e| {
            StageError::rejected(
                HandlerErrorCode::InternalFailure,
                format!("Stored permission set ARN is invalid: {e}"),
            )
        }),
        None => Err(StageError::rejected(
            HandlerErrorCode::NotFound,
            "Permission set ARN is not known",
        )),
    }
}

/// Creates the permission set with its initial tags and records its ARN.
pub(super) struct CreatePermissionSet {
    pub api: Arc<dyn PermissionSetApi>,
}

#[async_trait]
impl Stage<PermissionSetModel> for CreatePermissionSet {
    fn id(&self) -> StageId {
        StageId::PrimaryMutation
    }

    async fn execute(&self, desired: &PermissionSetModel, ctx: &mut WorkflowContext) -> StageOutcome {
        if ctx.resource_id().is_some() {
            return Ok(StageStatus::Complete);
        }
        let created = self
            .api
            .create_permission_set(
                &desired.instance_arn,
                &desired.name,
                &desired.settings(),
                &desired.tags,
            )
            .await?;
        info!(permission_set_arn = %created.permission_set_arn, name = %desired.name, "Permission set created");
        ctx.set_resource_id(created.permission_set_arn.as_str());
        Ok(StageStatus::Complete)
    }
}

/// Applies description, session duration and relay state.
pub(super) struct UpdateSettings {
    pub api: Arc<dyn PermissionSetApi>,
}

#[async_trait]
impl Stage<PermissionSetModel> for UpdateSettings {
    fn id(&self) -> StageId {
        StageId::PrimaryMutation
    }

    async fn execute(&self, desired: &PermissionSetModel, ctx: &mut WorkflowContext) -> StageOutcome {
        let arn = resolve_arn(desired, ctx)?;
        let current = self
            .api
            .describe_permission_set(&desired.instance_arn, &arn)
            .await?;
        if current.name != desired.name {
            return Err(StageError::rejected(
                HandlerErrorCode::NotUpdatable,
                format!(
                    "Name of permission set {arn} cannot change from {} to {}",
                    current.name, desired.name
                ),
            ));
        }

        let settings = desired.settings();
        if current.settings == settings {
            debug!(permission_set_arn = %arn, "Settings unchanged");
            return Ok(StageStatus::Complete);
        }
        self.api
            .update_permission_set(&desired.instance_arn, &arn, &settings)
            .await?;
        Ok(StageStatus::Complete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChildKind {
    Tags,
    ManagedPolicies,
    CustomerManagedPolicies,
}

/// Converges one set-valued sub-resource to the model.
pub(super) struct SyncChildren {
    pub api: Arc<dyn PermissionSetApi>,
    pub kind: ChildKind,
}

#[async_trait]
impl Stage<PermissionSetModel> for SyncChildren {
    fn id(&self) -> StageId {
        match self.kind {
            ChildKind::Tags => StageId::Tags,
            ChildKind::ManagedPolicies => StageId::ManagedPolicies,
            ChildKind::CustomerManagedPolicies => StageId::CustomerManagedPolicies,
        }
    }

    async fn execute(&self, desired: &PermissionSetModel, ctx: &mut WorkflowContext) -> StageOutcome {
        let arn = resolve_arn(desired, ctx)?;
        let target = Target {
            api: self.api.as_ref(),
            instance_arn: &desired.instance_arn,
            permission_set_arn: &arn,
        };

        match self.kind {
            ChildKind::Tags => {
                let wanted: BTreeSet<_> = desired.tags.iter().cloned().collect();
                reconcile_set(&Tags(target), &wanted).await?;
            }
            ChildKind::ManagedPolicies => {
                let wanted: BTreeSet<_> = desired.managed_policies.iter().cloned().collect();
                reconcile_set(&ManagedPolicies(target), &wanted).await?;
            }
            ChildKind::CustomerManagedPolicies => {
                let wanted: BTreeSet<_> = desired
                    .customer_managed_policy_references
                    .iter()
                    .cloned()
                    .collect();
                reconcile_set(&CustomerManagedPolicies(target), &wanted).await?;
            }
        }
        Ok(StageStatus::Complete)
    }
}

pub(super) struct SyncPermissionsBoundary {
    pub api: Arc<dyn PermissionSetApi>,
}

#[async_trait]
impl Stage<PermissionSetModel> for SyncPermissionsBoundary {
    fn id(&self) -> StageId {
        StageId::PermissionsBoundary
    }

    async fn execute(&self, desired: &PermissionSetModel, ctx: &mut WorkflowContext) -> StageOutcome {
        let arn = resolve_arn(desired, ctx)?;
        let instance_arn = &desired.instance_arn;
        let current = self
            .api
            .get_permissions_boundary_for_permission_set(instance_arn, &arn)
            .await?;

        match (&desired.permissions_boundary, current) {
            (Some(wanted), Some(current)) if *wanted == current => {}
            (Some(wanted), _) => {
                self.api
                    .put_permissions_boundary_to_permission_set(instance_arn, &arn, wanted)
                    .await?
            }
            (None, Some(_)) => {
                self.api
                    .delete_permissions_boundary_from_permission_set(instance_arn, &arn)
                    .await?
            }
            (None, None) => {}
        }
        Ok(StageStatus::Complete)
    }
}

/// Inline policies are compared as parsed JSON, so formatting differences
/// never cause a put.
pub(super) struct SyncInlinePolicy {
    pub api: Arc<dyn PermissionSetApi>,
}

#[async_trait]
impl Stage<PermissionSetModel> for SyncInlinePolicy {
    fn id(&self) -> StageId {
        StageId::InlinePolicy
    }

    async fn execute(&self, desired: &PermissionSetModel, ctx: &mut WorkflowContext) -> StageOutcome {
        let arn = resolve_arn(desired, ctx)?;
        let instance_arn = &desired.instance_arn;
        let wanted = desired
            .inline_policy_document()
            .map_err(|e| StageError::rejected(HandlerErrorCode::InvalidRequest, e))?;
        let current = self
            .api
            .get_inline_policy_for_permission_set(instance_arn, &arn)
            .await?
            .map(|text| parse_policy(&text));

        match (wanted, current) {
            (Some(wanted), Some(Ok(current))) if wanted == current => {}
            (Some(wanted), _) => {
                self.api
                    .put_inline_policy_to_permission_set(instance_arn, &arn, &wanted.to_string())
                    .await?
            }
            (None, Some(_)) => {
                self.api
                    .delete_inline_policy_from_permission_set(instance_arn, &arn)
                    .await?
            }
            (None, None) => {}
        }
        Ok(StageStatus::Complete)
    }
}

struct ProvisioningTracker<'a> {
    api: &'a dyn PermissionSetApi,
    instance_arn: &'a InstanceArn,
}

#[async_trait]
impl StatusSource for ProvisioningTracker<'_> {
    type State = ();

    async fn describe_status(&self, token: &str) -> Result<PollStatus, ApiError> {
        let request_id =
            RequestId::parse(token).map_err(|e| ApiError::validation(e.to_string()))?;
        let status = self
            .api
            .describe_permission_set_provisioning_status(self.instance_arn, &request_id)
            .await?;
        Ok(status.poll_status())
    }
}

/// Pushes the permission set to every account it is provisioned to and
/// waits for the push to finish.
pub(super) struct Provision {
    pub api: Arc<dyn PermissionSetApi>,
    pub poller: StabilizationPoller,
}

#[async_trait]
impl Stage<PermissionSetModel> for Provision {
    fn id(&self) -> StageId {
        StageId::Provisioning
    }

    async fn execute(&self, desired: &PermissionSetModel, ctx: &mut WorkflowContext) -> StageOutcome {
        let token = match ctx.tracking_token() {
            Some(token) => token.to_string(),
            None => {
                let arn = resolve_arn(desired, ctx)?;
                let status = self
                    .api
                    .provision_permission_set(
                        &desired.instance_arn,
                        &arn,
                        ProvisionTarget::AllProvisionedAccounts,
                    )
                    .await?;
                debug!(permission_set_arn = %arn, request_id = %status.request_id, "Provisioning submitted");
                ctx.set_tracking_token(status.request_id.as_str());
                status.request_id.into_inner()
            }
        };

        let tracker = ProvisioningTracker {
            api: self.api.as_ref(),
            instance_arn: &desired.instance_arn,
        };
        Ok(self.poller.poll(&tracker, &token).await?.into_status())
    }
}

pub(super) struct DeletePermissionSet {
    pub api: Arc<dyn PermissionSetApi>,
}

#[async_trait]
impl Stage<PermissionSetModel> for DeletePermissionSet {
    fn id(&self) -> StageId {
        StageId::PrimaryMutation
    }

    async fn execute(&self, desired: &PermissionSetModel, ctx: &mut WorkflowContext) -> StageOutcome {
        let arn = resolve_arn(desired, ctx)?;
        self.api
            .delete_permission_set(&desired.instance_arn, &arn)
            .await?;
        info!(permission_set_arn = %arn, "Permission set deleted");
        Ok(StageStatus::Complete)
    }
}

/// Reads the whole permission set back once every stage is done.
pub(super) struct ReadBack {
    pub api: Arc<dyn PermissionSetApi>,
}

#[async_trait]
impl Finalizer<PermissionSetModel> for ReadBack {
    async fn finalize(
        &self,
        desired: &PermissionSetModel,
        ctx: &WorkflowContext,
    ) -> Result<Option<PermissionSetModel>, StageError> {
        let arn = resolve_arn(desired, ctx)?;
        let model = read_full(self.api.as_ref(), &desired.instance_arn, &arn).await?;
        Ok(Some(model))
    }
}
