//! `AWS::SSO::PermissionSet`: a named bundle of policies provisioned to
//! accounts.
//!
//! A permission set is created first and its sub-resources are attached in
//! separate stages, each converging one aspect of the backend to the model.
//! Provisioning pushes the result to accounts and is polled to completion.
//! The ARN is assigned by the backend; it is kept in the workflow context
//! until the model carries it.

mod children;
mod stages;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ssoa_api::{
    CustomerManagedPolicyReference, PermissionSetApi, PermissionSetDescription,
    PermissionSetSettings, PermissionsBoundary, Tag,
};
use ssoa_events::HandlerErrorCode;
use ssoa_id::{InstanceArn, ManagedPolicyArn, PermissionSetArn, PermissionSetName};
use ssoa_reconcile::{ApiError, ChildSet, ResourceModel, WorkflowContext, WorkflowExecutor};
use tracing::instrument;

use self::children::{CustomerManagedPolicies, ManagedPolicies, Tags, Target};
use self::stages::{
    ChildKind, CreatePermissionSet, DeletePermissionSet, Provision, ReadBack, SyncChildren,
    SyncInlinePolicy, SyncPermissionsBoundary, UpdateSettings,
};
use super::{api_failure, rejected, Event, ResourceHandler};
use crate::{HandlerConfig, HandlerError};

pub const TYPE_NAME: &str = "AWS::SSO::PermissionSet";

/// Session durations accepted by the backend, in minutes.
const SESSION_DURATION_MINUTES: std::ops::RangeInclusive<u32> = 60..=720;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionSetModel {
    pub instance_arn: InstanceArn,

    /// Assigned by the backend on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_set_arn: Option<PermissionSetArn>,

    pub name: PermissionSetName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// ISO-8601 duration such as `PT8H`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_state_type: Option<String>,

    #[serde(default)]
    pub managed_policies: Vec<ManagedPolicyArn>,

    #[serde(default)]
    pub customer_managed_policy_references: Vec<CustomerManagedPolicyReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions_boundary: Option<PermissionsBoundary>,

    /// Policy document, either as a JSON string or an inline object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_policy: Option<Value>,

    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl ResourceModel for PermissionSetModel {
    fn annotate(&mut self, ctx: &WorkflowContext) {
        if self.permission_set_arn.is_none() {
            self.permission_set_arn = ctx
                .resource_id()
                .and_then(|id| PermissionSetArn::parse(id).ok());
        }
    }
}

impl PermissionSetModel {
    /// A model holding only what describing the permission set returns.
    pub fn from_description(instance_arn: InstanceArn, description: PermissionSetDescription) -> Self {
        let PermissionSetSettings {
            description: text,
            session_duration,
            relay_state,
        } = description.settings;
        Self {
            instance_arn,
            permission_set_arn: Some(description.permission_set_arn),
            name: description.name,
            description: text,
            session_duration,
            relay_state_type: relay_state,
            managed_policies: Vec::new(),
            customer_managed_policy_references: Vec::new(),
            permissions_boundary: None,
            inline_policy: None,
            tags: Vec::new(),
        }
    }

    pub fn settings(&self) -> PermissionSetSettings {
        PermissionSetSettings {
            description: self.description.clone(),
            session_duration: self.session_duration.clone(),
            relay_state: self.relay_state_type.clone(),
        }
    }

    /// The inline policy as a parsed JSON document.
    pub fn inline_policy_document(&self) -> Result<Option<Value>, String> {
        match &self.inline_policy {
            None => Ok(None),
            Some(Value::String(text)) => parse_policy(text)
                .map(Some)
                .map_err(|e| format!("InlinePolicy is not valid JSON: {e}")),
            Some(doc @ Value::Object(_)) => Ok(Some(doc.clone())),
            Some(_) => Err("InlinePolicy must be a JSON object or a string holding one".to_string()),
        }
    }

    /// Checks the parts of the model the backend would reject.
    pub fn validate(&self) -> Result<(), HandlerError> {
        if let Some(boundary) = &self.permissions_boundary {
            if !boundary.is_valid() {
                return Err(HandlerError::InvalidRequest(
                    "PermissionsBoundary needs exactly one of ManagedPolicyArn or CustomerManagedPolicyReference"
                        .to_string(),
                ));
            }
        }

        if let Some(duration) = &self.session_duration {
            match session_minutes(duration) {
                Some(m) if SESSION_DURATION_MINUTES.contains(&m) => {}
                _ => {
                    return Err(HandlerError::InvalidRequest(format!(
                        "SessionDuration {duration} must be an ISO-8601 duration between PT1H and PT12H"
                    )))
                }
            }
        }

        let mut keys = BTreeSet::new();
        if let Some(tag) = self.tags.iter().find(|t| !keys.insert(t.key.as_str())) {
            return Err(HandlerError::InvalidRequest(format!(
                "Tag key {} appears more than once",
                tag.key
            )));
        }

        self.inline_policy_document()
            .map(|_| ())
            .map_err(HandlerError::InvalidRequest)
    }
}

/// Parses an inline policy document. Only objects are documents.
pub(crate) fn parse_policy(text: &str) -> Result<Value, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(serde::de::Error::custom("policy document must be a JSON object"))
    }
}

/// Minutes in a `PT#H#M` duration.
fn session_minutes(duration: &str) -> Option<u32> {
    let rest = duration.strip_prefix("PT")?;
    if rest.is_empty() {
        return None;
    }
    let (hours, rest) = match rest.split_once('H') {
        Some((h, rest)) => (h.parse::<u32>().ok()?, rest),
        None => (0, rest),
    };
    let minutes = match rest {
        "" => 0,
        m => m.strip_suffix('M')?.parse::<u32>().ok()?,
    };
    hours.checked_mul(60)?.checked_add(minutes)
}

/// Describes the permission set and every sub-resource.
pub(crate) async fn read_full(
    api: &dyn PermissionSetApi,
    instance_arn: &InstanceArn,
    arn: &PermissionSetArn,
) -> Result<PermissionSetModel, ApiError> {
    let description = api.describe_permission_set(instance_arn, arn).await?;
    let target = Target {
        api,
        instance_arn,
        permission_set_arn: arn,
    };

    let tags = Tags(target).members().await?;
    let managed = ManagedPolicies(target).members().await?;
    let customer = CustomerManagedPolicies(target).members().await?;
    let boundary = api
        .get_permissions_boundary_for_permission_set(instance_arn, arn)
        .await?;
    let inline = api
        .get_inline_policy_for_permission_set(instance_arn, arn)
        .await?
        .map(|text| parse_policy(&text).unwrap_or(Value::String(text)));

    let mut model = PermissionSetModel::from_description(instance_arn.clone(), description);
    model.tags = tags.into_iter().collect();
    model.managed_policies = managed.into_iter().collect();
    model.customer_managed_policy_references = customer.into_iter().collect();
    model.permissions_boundary = boundary;
    model.inline_policy = inline;
    Ok(model)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionSetListFilter {
    pub instance_arn: InstanceArn,
}

pub struct PermissionSetHandler {
    api: Arc<dyn PermissionSetApi>,
    config: HandlerConfig,
}

impl PermissionSetHandler {
    pub fn new(api: Arc<dyn PermissionSetApi>, config: HandlerConfig) -> Self {
        Self { api, config }
    }

    /// Sub-resource stages shared by create and update, ending in provisioning.
    fn with_attachments(
        &self,
        executor: WorkflowExecutor<PermissionSetModel>,
    ) -> WorkflowExecutor<PermissionSetModel> {
        executor
            .stage(SyncChildren {
                api: self.api.clone(),
                kind: ChildKind::ManagedPolicies,
            })
            .stage(SyncChildren {
                api: self.api.clone(),
                kind: ChildKind::CustomerManagedPolicies,
            })
            .stage(SyncPermissionsBoundary {
                api: self.api.clone(),
            })
            .stage(SyncInlinePolicy {
                api: self.api.clone(),
            })
            .stage(Provision {
                api: self.api.clone(),
                poller: self.config.poller(),
            })
            .finalize_with(ReadBack {
                api: self.api.clone(),
            })
    }

    fn create_workflow(&self) -> WorkflowExecutor<PermissionSetModel> {
        let executor = WorkflowExecutor::new("permission_set.create", self.config.retry_policy())
            .stage(CreatePermissionSet {
                api: self.api.clone(),
            });
        self.with_attachments(executor)
    }

    fn update_workflow(&self) -> WorkflowExecutor<PermissionSetModel> {
        let executor = WorkflowExecutor::new("permission_set.update", self.config.retry_policy())
            .stage(UpdateSettings {
                api: self.api.clone(),
            })
            .stage(SyncChildren {
                api: self.api.clone(),
                kind: ChildKind::Tags,
            });
        self.with_attachments(executor)
    }

    fn delete_workflow(&self) -> WorkflowExecutor<PermissionSetModel> {
        WorkflowExecutor::new("permission_set.delete", self.config.retry_policy()).stage(
            DeletePermissionSet {
                api: self.api.clone(),
            },
        )
    }
}

fn missing_arn<M>() -> Event<M> {
    rejected(HandlerErrorCode::NotFound, "PermissionSetArn is required")
}

#[async_trait]
impl ResourceHandler for PermissionSetHandler {
    type Model = PermissionSetModel;
    type ListFilter = PermissionSetListFilter;
    const TYPE_NAME: &'static str = TYPE_NAME;

    #[instrument(skip_all, fields(name = %desired.name))]
    async fn create(&self, desired: PermissionSetModel, ctx: WorkflowContext) -> Event<PermissionSetModel> {
        if let Err(err) = desired.validate() {
            return rejected(err.error_code(), err.to_string());
        }
        self.create_workflow().run(&desired, ctx).await.into_event()
    }

    #[instrument(skip_all, fields(name = %desired.name))]
    async fn read(&self, desired: PermissionSetModel) -> Event<PermissionSetModel> {
        let Some(arn) = &desired.permission_set_arn else {
            return missing_arn();
        };
        match read_full(self.api.as_ref(), &desired.instance_arn, arn).await {
            Ok(model) => Event::success(Some(model)),
            Err(err) => api_failure(err),
        }
    }

    #[instrument(skip_all, fields(name = %desired.name))]
    async fn update(
        &self,
        mut desired: PermissionSetModel,
        previous: Option<PermissionSetModel>,
        ctx: WorkflowContext,
    ) -> Event<PermissionSetModel> {
        if let Some(previous) = &previous {
            if previous.name != desired.name {
                return rejected(
                    HandlerErrorCode::NotUpdatable,
                    format!(
                        "Name cannot change from {} to {}",
                        previous.name, desired.name
                    ),
                );
            }
            if desired.permission_set_arn.is_none() {
                desired.permission_set_arn = previous.permission_set_arn.clone();
            }
        }
        if desired.permission_set_arn.is_none() {
            return missing_arn();
        }
        if let Err(err) = desired.validate() {
            return rejected(err.error_code(), err.to_string());
        }
        self.update_workflow().run(&desired, ctx).await.into_event()
    }

    #[instrument(skip_all, fields(name = %desired.name))]
    async fn delete(&self, desired: PermissionSetModel, ctx: WorkflowContext) -> Event<PermissionSetModel> {
        if desired.permission_set_arn.is_none() {
            return missing_arn();
        }
        self.delete_workflow().run(&desired, ctx).await.into_event()
    }

    /// One backend page per invocation; the caller follows `nextToken`.
    #[instrument(skip_all, fields(instance_arn = %filter.instance_arn))]
    async fn list(
        &self,
        filter: PermissionSetListFilter,
        next_token: Option<String>,
    ) -> Event<PermissionSetModel> {
        let page = match self
            .api
            .list_permission_sets(&filter.instance_arn, next_token)
            .await
        {
            Ok(page) => page,
            Err(err) => return api_failure(err),
        };

        let mut models = Vec::with_capacity(page.items.len());
        for arn in &page.items {
            match self.api.describe_permission_set(&filter.instance_arn, arn).await {
                Ok(description) => models.push(PermissionSetModel::from_description(
                    filter.instance_arn.clone(),
                    description,
                )),
                // Deleted between the listing and the describe.
                Err(err) if err.is_not_found() => {}
                Err(err) => return api_failure(err),
            }
        }
        Event::listed(models, page.next_token.filter(|t| !t.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;
    use ssoa_events::OperationStatus;
    use ssoa_testing::{fixtures, MemoryBackend, Operation, SandboxSettings};

    use super::*;

    fn model() -> PermissionSetModel {
        serde_json::from_value(json!({
            "InstanceArn": fixtures::INSTANCE_ARN,
            "Name": fixtures::PERMISSION_SET_NAME,
            "SessionDuration": "PT8H",
            "ManagedPolicies": [fixtures::READ_ONLY_POLICY],
            "InlinePolicy": {"Version": "2012-10-17", "Statement": []},
            "Tags": [{"Key": "a", "Value": "1"}]
        }))
        .unwrap()
    }

    fn setup() -> (Arc<MemoryBackend>, PermissionSetHandler) {
        let backend = Arc::new(MemoryBackend::with_settings(SandboxSettings {
            pending_polls: 0,
            ..SandboxSettings::default()
        }));
        let handler = PermissionSetHandler::new(backend.clone(), HandlerConfig::default());
        (backend, handler)
    }

    #[rstest]
    #[case("PT1H", Some(60))]
    #[case("PT12H", Some(720))]
    #[case("PT1H30M", Some(90))]
    #[case("PT45M", Some(45))]
    #[case("PT", None)]
    #[case("P1D", None)]
    #[case("PT8", None)]
    fn test_session_minutes(#[case] duration: &str, #[case] expected: Option<u32>) {
        assert_eq!(session_minutes(duration), expected);
    }

    #[test]
    fn test_validate() {
        assert!(model().validate().is_ok());

        let mut m = model();
        m.session_duration = Some("PT13H".to_string());
        assert!(m.validate().is_err());

        let mut m = model();
        m.tags.push(Tag::new("a", "2"));
        let err = m.validate().unwrap_err();
        assert_eq!(err.error_code(), HandlerErrorCode::InvalidRequest);
        assert!(err.to_string().contains("more than once"));

        let mut m = model();
        m.inline_policy = Some(Value::String("{not json".to_string()));
        assert!(m.validate().is_err());

        let mut m = model();
        m.permissions_boundary = Some(PermissionsBoundary {
            managed_policy_arn: None,
            customer_managed_policy_reference: None,
        });
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_inline_policy_string_and_object_agree() {
        let mut as_string = model();
        as_string.inline_policy = Some(Value::String(
            r#"{ "Statement": [], "Version": "2012-10-17" }"#.to_string(),
        ));
        assert_eq!(
            as_string.inline_policy_document().unwrap(),
            model().inline_policy_document().unwrap()
        );
    }

    #[test]
    fn test_annotate_fills_arn_from_context() {
        let mut ctx = WorkflowContext::new();
        ctx.set_resource_id(fixtures::PERMISSION_SET_ARN);
        let mut m = model();
        m.annotate(&ctx);
        assert_eq!(m.permission_set_arn, Some(fixtures::permission_set_arn()));
    }

    #[tokio::test]
    async fn test_create_attaches_and_provisions() {
        let (backend, handler) = setup();

        let event = handler.create(model(), WorkflowContext::new()).await;
        assert_eq!(event.status, OperationStatus::Success, "{:?}", event.message);
        let created = event.resource_model.unwrap();
        let arn = created.permission_set_arn.clone().unwrap();

        assert_eq!(created.managed_policies, model().managed_policies);
        assert_eq!(created.inline_policy, model().inline_policy);
        assert_eq!(created.tags, model().tags);
        assert!(backend.snapshot().is_provisioned(&arn));
        assert_eq!(backend.calls_to(Operation::CreatePermissionSet), 1);
        assert_eq!(backend.calls_to(Operation::TagResource), 0);
    }

    #[tokio::test]
    async fn test_create_with_invalid_session_is_rejected_before_backend() {
        let (backend, handler) = setup();
        let mut desired = model();
        desired.session_duration = Some("PT13H".to_string());

        let event = handler.create(desired, WorkflowContext::new()).await;
        assert_eq!(event.status, OperationStatus::Failed);
        assert_eq!(event.error_code, Some(HandlerErrorCode::InvalidRequest));
        assert!(event.message.unwrap().contains("PT13H"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_duplicate_name_is_already_exists() {
        let (_backend, handler) = setup();
        handler.create(model(), WorkflowContext::new()).await;

        let event = handler.create(model(), WorkflowContext::new()).await;
        assert_eq!(event.error_code, Some(HandlerErrorCode::AlreadyExists));
    }

    #[tokio::test]
    async fn test_update_rename_is_not_updatable() {
        let (backend, handler) = setup();
        let created = handler
            .create(model(), WorkflowContext::new())
            .await
            .resource_model
            .unwrap();
        backend.clear_calls();

        let mut renamed = created.clone();
        renamed.name = PermissionSetName::parse("Renamed").unwrap();
        let event = handler
            .update(renamed.clone(), Some(created), WorkflowContext::new())
            .await;
        assert_eq!(event.error_code, Some(HandlerErrorCode::NotUpdatable));

        let event = handler.update(renamed, None, WorkflowContext::new()).await;
        assert_eq!(event.error_code, Some(HandlerErrorCode::NotUpdatable));
        assert!(backend.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_without_arn_is_not_found() {
        let (_backend, handler) = setup();
        let event = handler.update(model(), None, WorkflowContext::new()).await;
        assert_eq!(event.error_code, Some(HandlerErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_update_converges_sub_resources() {
        let (backend, handler) = setup();
        let created = handler
            .create(model(), WorkflowContext::new())
            .await
            .resource_model
            .unwrap();

        let mut desired = created.clone();
        desired.description = Some("Read only access".to_string());
        desired.managed_policies = vec![fixtures::managed_policy(fixtures::BILLING_POLICY)];
        desired.customer_managed_policy_references =
            vec![CustomerManagedPolicyReference::new("Audit", "/")];
        desired.permissions_boundary = Some(PermissionsBoundary::managed(fixtures::managed_policy(
            fixtures::READ_ONLY_POLICY,
        )));
        desired.inline_policy = None;

        let event = handler
            .update(desired.clone(), Some(created), WorkflowContext::new())
            .await;
        assert_eq!(event.status, OperationStatus::Success, "{:?}", event.message);
        assert_eq!(event.resource_model, Some(desired));
        assert_eq!(backend.calls_to(Operation::DeleteInlinePolicyFromPermissionSet), 1);
        assert_eq!(backend.calls_to(Operation::DetachManagedPolicyFromPermissionSet), 1);
    }

    #[tokio::test]
    async fn test_read_and_delete() {
        let (_backend, handler) = setup();
        let created = handler
            .create(model(), WorkflowContext::new())
            .await
            .resource_model
            .unwrap();

        let read = handler.read(created.clone()).await;
        assert_eq!(read.resource_model, Some(created.clone()));

        let deleted = handler.delete(created.clone(), WorkflowContext::new()).await;
        assert_eq!(deleted.status, OperationStatus::Success);

        let read = handler.read(created).await;
        assert_eq!(read.error_code, Some(HandlerErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_list_pages_through_token() {
        let backend = Arc::new(MemoryBackend::with_settings(SandboxSettings {
            page_size: 1,
            pending_polls: 0,
        }));
        let handler = PermissionSetHandler::new(backend.clone(), HandlerConfig::default());
        for name in ["One", "Two"] {
            let mut m = model();
            m.name = PermissionSetName::parse(name).unwrap();
            handler.create(m, WorkflowContext::new()).await;
        }

        let filter = PermissionSetListFilter {
            instance_arn: fixtures::instance_arn(),
        };
        let first = handler.list(filter.clone(), None).await;
        assert_eq!(first.resource_models.as_ref().map(Vec::len), Some(1));
        let token = first.next_token.clone();
        assert!(token.is_some());

        let second = handler.list(filter, token).await;
        assert_eq!(second.resource_models.as_ref().map(Vec::len), Some(1));
        assert_eq!(second.next_token, None);
        assert_eq!(backend.snapshot().permission_set_count(), 2);
    }
}
