//! `AWS::SSO::Assignment`: grants a principal a permission set on an account.
//!
//! Every property is create-only, so there is no update workflow. Creation and
//! deletion are asynchronous on the backend; the primary mutation stage
//! submits once and then polls the request until it settles.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ssoa_api::{AccountAssignment, AssignmentApi, AssignmentRequest, PrincipalType, TargetType};
use ssoa_events::HandlerErrorCode;
use ssoa_id::{AccountId, InstanceArn, PermissionSetArn, PrincipalId, RequestId};
use ssoa_reconcile::{
    collect_all, exists, find, ApiError, Finalizer, OperationWeight, PollStatus, ResourceModel,
    StabilizationPoller, Stage, StageError, StageId, StageOutcome, StageStatus, StatusSource,
    WorkflowContext, WorkflowExecutor,
};
use tracing::{debug, instrument};

use super::{api_failure, rejected, Event, ResourceHandler};
use crate::HandlerConfig;

pub const TYPE_NAME: &str = "AWS::SSO::Assignment";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignmentModel {
    pub instance_arn: InstanceArn,
    pub target_id: AccountId,
    pub target_type: TargetType,
    pub permission_set_arn: PermissionSetArn,
    pub principal_type: PrincipalType,
    pub principal_id: PrincipalId,
}

impl ResourceModel for AssignmentModel {}

impl AssignmentModel {
    fn request(&self) -> AssignmentRequest {
        AssignmentRequest {
            instance_arn: self.instance_arn.clone(),
            target_id: self.target_id.clone(),
            target_type: self.target_type,
            permission_set_arn: self.permission_set_arn.clone(),
            principal_type: self.principal_type,
            principal_id: self.principal_id.clone(),
        }
    }

    fn from_listed(instance_arn: &InstanceArn, listed: AccountAssignment) -> Self {
        Self {
            instance_arn: instance_arn.clone(),
            target_id: listed.account_id,
            target_type: TargetType::AwsAccount,
            permission_set_arn: listed.permission_set_arn,
            principal_type: listed.principal_type,
            principal_id: listed.principal_id,
        }
    }
}

/// Fields a list action filters on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignmentListFilter {
    pub instance_arn: InstanceArn,
    pub target_id: AccountId,
    pub permission_set_arn: PermissionSetArn,
}

// =============================================================================
// Backend helpers
// =============================================================================

async fn find_assignment(
    api: &dyn AssignmentApi,
    model: &AssignmentModel,
) -> Result<Option<AccountAssignment>, ApiError> {
    let request = model.request();
    find(
        |token| {
            api.list_account_assignments(
                &model.instance_arn,
                &model.target_id,
                &model.permission_set_arn,
                token,
            )
        },
        |listed| request.matches(listed),
    )
    .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Create,
    Delete,
}

/// Status of a submitted assignment request.
struct RequestTracker<'a> {
    api: &'a dyn AssignmentApi,
    instance_arn: &'a InstanceArn,
    direction: Direction,
}

#[async_trait]
impl StatusSource for RequestTracker<'_> {
    type State = ();

    async fn describe_status(&self, token: &str) -> Result<PollStatus, ApiError> {
        let request_id =
            RequestId::parse(token).map_err(|e| ApiError::validation(e.to_string()))?;
        let status = match self.direction {
            Direction::Create => {
                self.api
                    .describe_account_assignment_creation_status(self.instance_arn, &request_id)
                    .await?
            }
            Direction::Delete => {
                self.api
                    .describe_account_assignment_deletion_status(self.instance_arn, &request_id)
                    .await?
            }
        };
        Ok(status.poll_status())
    }
}

// =============================================================================
// Stages
// =============================================================================

/// Existence precondition: create requires absence, delete requires presence.
struct CheckExistence {
    api: Arc<dyn AssignmentApi>,
    direction: Direction,
}

#[async_trait]
impl Stage<AssignmentModel> for CheckExistence {
    fn id(&self) -> StageId {
        StageId::Precondition
    }

    fn weight(&self, _ctx: &WorkflowContext) -> OperationWeight {
        OperationWeight::Light
    }

    async fn execute(&self, desired: &AssignmentModel, _ctx: &mut WorkflowContext) -> StageOutcome {
        let request = desired.request();
        let present = exists(
            |token| {
                self.api.list_account_assignments(
                    &desired.instance_arn,
                    &desired.target_id,
                    &desired.permission_set_arn,
                    token,
                )
            },
            |listed| request.matches(listed),
        )
        .await?;

        match (self.direction, present) {
            (Direction::Create, true) => Err(StageError::rejected(
                HandlerErrorCode::AlreadyExists,
                format!(
                    "Assignment of {} to {} {} on account {} already exists",
                    desired.permission_set_arn,
                    desired.principal_type.as_str(),
                    desired.principal_id,
                    desired.target_id
                ),
            )),
            (Direction::Delete, false) => Err(StageError::rejected(
                HandlerErrorCode::NotFound,
                format!(
                    "Assignment of {} to {} {} on account {} not found",
                    desired.permission_set_arn,
                    desired.principal_type.as_str(),
                    desired.principal_id,
                    desired.target_id
                ),
            )),
            _ => Ok(StageStatus::Complete),
        }
    }
}

/// Submits the create or delete request once, then polls it.
struct SubmitRequest {
    api: Arc<dyn AssignmentApi>,
    direction: Direction,
    poller: StabilizationPoller,
}

#[async_trait]
impl Stage<AssignmentModel> for SubmitRequest {
    fn id(&self) -> StageId {
        StageId::PrimaryMutation
    }

    async fn execute(&self, desired: &AssignmentModel, ctx: &mut WorkflowContext) -> StageOutcome {
        let token = match ctx.tracking_token() {
            Some(token) => token.to_string(),
            None => {
                let request = desired.request();
                let status = match self.direction {
                    Direction::Create => self.api.create_account_assignment(&request).await?,
                    Direction::Delete => self.api.delete_account_assignment(&request).await?,
                };
                debug!(request_id = %status.request_id, direction = ?self.direction, "Assignment request submitted");
                ctx.set_tracking_token(status.request_id.as_str());
                status.request_id.into_inner()
            }
        };

        let tracker = RequestTracker {
            api: self.api.as_ref(),
            instance_arn: &desired.instance_arn,
            direction: self.direction,
        };
        Ok(self.poller.poll(&tracker, &token).await?.into_status())
    }
}

/// Reads the created assignment back.
struct ReadBack {
    api: Arc<dyn AssignmentApi>,
}

#[async_trait]
impl Finalizer<AssignmentModel> for ReadBack {
    async fn finalize(
        &self,
        desired: &AssignmentModel,
        _ctx: &WorkflowContext,
    ) -> Result<Option<AssignmentModel>, StageError> {
        match find_assignment(self.api.as_ref(), desired).await? {
            Some(listed) => Ok(Some(AssignmentModel::from_listed(&desired.instance_arn, listed))),
            None => Err(StageError::rejected(
                HandlerErrorCode::NotFound,
                "Assignment not found after creation",
            )),
        }
    }
}

// =============================================================================
// Handler
// =============================================================================

pub struct AssignmentHandler {
    api: Arc<dyn AssignmentApi>,
    config: HandlerConfig,
}

impl AssignmentHandler {
    pub fn new(api: Arc<dyn AssignmentApi>, config: HandlerConfig) -> Self {
        Self { api, config }
    }

    fn workflow(&self, direction: Direction) -> WorkflowExecutor<AssignmentModel> {
        let name = match direction {
            Direction::Create => "assignment.create",
            Direction::Delete => "assignment.delete",
        };
        let executor = WorkflowExecutor::new(name, self.config.retry_policy())
            .stage(CheckExistence {
                api: self.api.clone(),
                direction,
            })
            .stage(SubmitRequest {
                api: self.api.clone(),
                direction,
                poller: self.config.poller(),
            });
        match direction {
            Direction::Create => executor.finalize_with(ReadBack {
                api: self.api.clone(),
            }),
            Direction::Delete => executor,
        }
    }
}

#[async_trait]
impl ResourceHandler for AssignmentHandler {
    type Model = AssignmentModel;
    type ListFilter = AssignmentListFilter;
    const TYPE_NAME: &'static str = TYPE_NAME;

    #[instrument(skip_all, fields(principal_id = %desired.principal_id, target_id = %desired.target_id))]
    async fn create(&self, desired: AssignmentModel, ctx: WorkflowContext) -> Event<AssignmentModel> {
        self.workflow(Direction::Create)
            .run(&desired, ctx)
            .await
            .into_event()
    }

    #[instrument(skip_all, fields(principal_id = %desired.principal_id, target_id = %desired.target_id))]
    async fn read(&self, desired: AssignmentModel) -> Event<AssignmentModel> {
        match find_assignment(self.api.as_ref(), &desired).await {
            Ok(Some(listed)) => Event::success(Some(AssignmentModel::from_listed(
                &desired.instance_arn,
                listed,
            ))),
            Ok(None) => rejected(HandlerErrorCode::NotFound, "Assignment not found"),
            Err(err) => api_failure(err),
        }
    }

    async fn update(
        &self,
        _desired: AssignmentModel,
        _previous: Option<AssignmentModel>,
        _ctx: WorkflowContext,
    ) -> Event<AssignmentModel> {
        rejected(
            HandlerErrorCode::NotUpdatable,
            "Assignment properties are create-only; replace the assignment instead",
        )
    }

    #[instrument(skip_all, fields(principal_id = %desired.principal_id, target_id = %desired.target_id))]
    async fn delete(&self, desired: AssignmentModel, ctx: WorkflowContext) -> Event<AssignmentModel> {
        self.workflow(Direction::Delete)
            .run(&desired, ctx)
            .await
            .into_event()
    }

    #[instrument(skip_all, fields(target_id = %filter.target_id))]
    async fn list(
        &self,
        filter: AssignmentListFilter,
        _next_token: Option<String>,
    ) -> Event<AssignmentModel> {
        let listed = collect_all(|token| {
            self.api.list_account_assignments(
                &filter.instance_arn,
                &filter.target_id,
                &filter.permission_set_arn,
                token,
            )
        })
        .await;

        match listed {
            Ok(items) => Event::listed(
                items
                    .into_iter()
                    .map(|a| AssignmentModel::from_listed(&filter.instance_arn, a))
                    .collect(),
                None,
            ),
            Err(err) => api_failure(err),
        }
    }
}
