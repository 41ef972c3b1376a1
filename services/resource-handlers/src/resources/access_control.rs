//! `AWS::SSO::InstanceAccessControlAttributeConfiguration`: the attributes an
//! instance exposes for attribute-based access control.
//!
//! The backend applies creates and updates asynchronously but hands back no
//! request id. The instance ARN is stored as the tracking token once the
//! mutation is submitted and the configuration status is polled until it
//! leaves `CREATION_IN_PROGRESS`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ssoa_api::{AccessControlApi, AccessControlAttribute};
use ssoa_events::HandlerErrorCode;
use ssoa_id::InstanceArn;
use ssoa_reconcile::{
    ApiError, Finalizer, OperationWeight, PollOutcome, PollStatus, ResourceModel,
    StabilizationPoller, Stage, StageError, StageId, StageOutcome, StageStatus, StatusSource,
    WorkflowContext, WorkflowExecutor,
};
use tracing::{debug, instrument};

use super::{api_failure, rejected, Event, ResourceHandler};
use crate::HandlerConfig;

pub const TYPE_NAME: &str = "AWS::SSO::InstanceAccessControlAttributeConfiguration";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessControlAttributesModel {
    pub instance_arn: InstanceArn,
    #[serde(default)]
    pub access_control_attributes: Vec<AccessControlAttribute>,
}

impl ResourceModel for AccessControlAttributesModel {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessControlListFilter {
    pub instance_arn: InstanceArn,
}

/// Current attributes, or `None` if the instance has no configuration.
async fn describe_attributes(
    api: &dyn AccessControlApi,
    instance_arn: &InstanceArn,
) -> Result<Option<Vec<AccessControlAttribute>>, ApiError> {
    match api
        .describe_instance_access_control_attribute_configuration(instance_arn)
        .await
    {
        Ok(config) => Ok(Some(config.attributes)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

struct ConfigurationTracker<'a> {
    api: &'a dyn AccessControlApi,
}

#[async_trait]
impl StatusSource for ConfigurationTracker<'_> {
    type State = Vec<AccessControlAttribute>;

    async fn describe_status(
        &self,
        token: &str,
    ) -> Result<PollStatus<Vec<AccessControlAttribute>>, ApiError> {
        let instance_arn =
            InstanceArn::parse(token).map_err(|e| ApiError::validation(e.to_string()))?;
        let config = self
            .api
            .describe_instance_access_control_attribute_configuration(&instance_arn)
            .await?;
        Ok(config.poll_status())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Create,
    Update,
    Delete,
}

impl Mutation {
    fn workflow_name(self) -> &'static str {
        match self {
            Mutation::Create => "access_control.create",
            Mutation::Update => "access_control.update",
            Mutation::Delete => "access_control.delete",
        }
    }
}

/// Create requires no configuration; update and delete require one.
struct CheckConfiguration {
    api: Arc<dyn AccessControlApi>,
    mutation: Mutation,
}

#[async_trait]
impl Stage<AccessControlAttributesModel> for CheckConfiguration {
    fn id(&self) -> StageId {
        StageId::Precondition
    }

    fn weight(&self, _ctx: &WorkflowContext) -> OperationWeight {
        OperationWeight::Light
    }

    async fn execute(
        &self,
        desired: &AccessControlAttributesModel,
        _ctx: &mut WorkflowContext,
    ) -> StageOutcome {
        let present = describe_attributes(self.api.as_ref(), &desired.instance_arn)
            .await?
            .is_some();

        match (self.mutation, present) {
            (Mutation::Create, true) => Err(StageError::rejected(
                HandlerErrorCode::AlreadyExists,
                format!(
                    "Access control attribute configuration already exists for instance {}",
                    desired.instance_arn
                ),
            )),
            (Mutation::Update | Mutation::Delete, false) => Err(StageError::rejected(
                HandlerErrorCode::NotFound,
                format!(
                    "No access control attribute configuration for instance {}",
                    desired.instance_arn
                ),
            )),
            _ => Ok(StageStatus::Complete),
        }
    }
}

struct ApplyConfiguration {
    api: Arc<dyn AccessControlApi>,
    mutation: Mutation,
    poller: StabilizationPoller,
}

#[async_trait]
impl Stage<AccessControlAttributesModel> for ApplyConfiguration {
    fn id(&self) -> StageId {
        StageId::PrimaryMutation
    }

    async fn execute(
        &self,
        desired: &AccessControlAttributesModel,
        ctx: &mut WorkflowContext,
    ) -> StageOutcome {
        let instance_arn = &desired.instance_arn;
        let attributes = &desired.access_control_attributes;

        if ctx.tracking_token().is_none() {
            match self.mutation {
                Mutation::Create => {
                    self.api
                        .create_instance_access_control_attribute_configuration(
                            instance_arn,
                            attributes,
                        )
                        .await?
                }
                Mutation::Update => {
                    self.api
                        .update_instance_access_control_attribute_configuration(
                            instance_arn,
                            attributes,
                        )
                        .await?
                }
                Mutation::Delete => {
                    self.api
                        .delete_instance_access_control_attribute_configuration(instance_arn)
                        .await?;
                    return Ok(StageStatus::Complete);
                }
            }
            debug!(instance_arn = %instance_arn, attributes = attributes.len(), "Configuration submitted");
            ctx.set_tracking_token(instance_arn.as_str());
        }

        let source = ConfigurationTracker {
            api: self.api.as_ref(),
        };
        match self.poller.poll(&source, instance_arn.as_str()).await? {
            PollOutcome::Pending { delay_seconds } => Ok(StageStatus::Pending { delay_seconds }),
            PollOutcome::Succeeded(_) => Ok(StageStatus::Complete),
        }
    }
}

struct ReadBack {
    api: Arc<dyn AccessControlApi>,
}

#[async_trait]
impl Finalizer<AccessControlAttributesModel> for ReadBack {
    async fn finalize(
        &self,
        desired: &AccessControlAttributesModel,
        _ctx: &WorkflowContext,
    ) -> Result<Option<AccessControlAttributesModel>, StageError> {
        match describe_attributes(self.api.as_ref(), &desired.instance_arn).await? {
            Some(attributes) => Ok(Some(AccessControlAttributesModel {
                instance_arn: desired.instance_arn.clone(),
                access_control_attributes: attributes,
            })),
            None => Err(StageError::rejected(
                HandlerErrorCode::NotFound,
                "Access control attribute configuration not found after apply",
            )),
        }
    }
}

pub struct AccessControlHandler {
    api: Arc<dyn AccessControlApi>,
    config: HandlerConfig,
}

impl AccessControlHandler {
    pub fn new(api: Arc<dyn AccessControlApi>, config: HandlerConfig) -> Self {
        Self { api, config }
    }

    fn workflow(&self, mutation: Mutation) -> WorkflowExecutor<AccessControlAttributesModel> {
        let executor = WorkflowExecutor::new(mutation.workflow_name(), self.config.retry_policy())
            .stage(CheckConfiguration {
                api: self.api.clone(),
                mutation,
            })
            .stage(ApplyConfiguration {
                api: self.api.clone(),
                mutation,
                poller: self.config.poller(),
            });
        if mutation == Mutation::Delete {
            executor
        } else {
            executor.finalize_with(ReadBack {
                api: self.api.clone(),
            })
        }
    }
}

#[async_trait]
impl ResourceHandler for AccessControlHandler {
    type Model = AccessControlAttributesModel;
    type ListFilter = AccessControlListFilter;
    const TYPE_NAME: &'static str = TYPE_NAME;

    #[instrument(skip_all, fields(instance_arn = %desired.instance_arn))]
    async fn create(
        &self,
        desired: AccessControlAttributesModel,
        ctx: WorkflowContext,
    ) -> Event<AccessControlAttributesModel> {
        self.workflow(Mutation::Create)
            .run(&desired, ctx)
            .await
            .into_event()
    }

    #[instrument(skip_all, fields(instance_arn = %desired.instance_arn))]
    async fn read(&self, desired: AccessControlAttributesModel) -> Event<AccessControlAttributesModel> {
        match describe_attributes(self.api.as_ref(), &desired.instance_arn).await {
            Ok(Some(attributes)) => Event::success(Some(AccessControlAttributesModel {
                instance_arn: desired.instance_arn,
                access_control_attributes: attributes,
            })),
            Ok(None) => rejected(
                HandlerErrorCode::NotFound,
                format!(
                    "No access control attribute configuration for instance {}",
                    desired.instance_arn
                ),
            ),
            Err(err) => api_failure(err),
        }
    }

    #[instrument(skip_all, fields(instance_arn = %desired.instance_arn))]
    async fn update(
        &self,
        desired: AccessControlAttributesModel,
        _previous: Option<AccessControlAttributesModel>,
        ctx: WorkflowContext,
    ) -> Event<AccessControlAttributesModel> {
        self.workflow(Mutation::Update)
            .run(&desired, ctx)
            .await
            .into_event()
    }

    #[instrument(skip_all, fields(instance_arn = %desired.instance_arn))]
    async fn delete(
        &self,
        desired: AccessControlAttributesModel,
        ctx: WorkflowContext,
    ) -> Event<AccessControlAttributesModel> {
        self.workflow(Mutation::Delete)
            .run(&desired, ctx)
            .await
            .into_event()
    }

    #[instrument(skip_all, fields(instance_arn = %filter.instance_arn))]
    async fn list(
        &self,
        filter: AccessControlListFilter,
        _next_token: Option<String>,
    ) -> Event<AccessControlAttributesModel> {
        match describe_attributes(self.api.as_ref(), &filter.instance_arn).await {
            Ok(found) => Event::listed(
                found
                    .map(|attributes| AccessControlAttributesModel {
                        instance_arn: filter.instance_arn.clone(),
                        access_control_attributes: attributes,
                    })
                    .into_iter()
                    .collect(),
                None,
            ),
            Err(err) => api_failure(err),
        }
    }
}
