//! Resource handlers.
//!
//! Each resource type implements [`ResourceHandler`]. Create, update and
//! delete run as resumable workflows; read and list are single-shot.

pub mod access_control;
pub mod assignment;
pub mod permission_set;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use ssoa_events::{Action, HandlerErrorCode, HandlerRequest, ProgressEvent};
use ssoa_reconcile::{classify, ApiError, ResourceModel, WorkflowContext};
use tracing::{info, warn};

use crate::HandlerError;

/// Event produced by a typed handler.
pub type Event<M> = ProgressEvent<M, WorkflowContext>;

/// CRUDL entry points of one resource type.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    type Model: ResourceModel + Serialize + DeserializeOwned;

    /// Identifying fields accepted by a list action.
    type ListFilter: DeserializeOwned + Send;

    /// Resource type name this handler serves.
    const TYPE_NAME: &'static str;

    async fn create(&self, desired: Self::Model, ctx: WorkflowContext) -> Event<Self::Model>;

    async fn read(&self, desired: Self::Model) -> Event<Self::Model>;

    async fn update(
        &self,
        desired: Self::Model,
        previous: Option<Self::Model>,
        ctx: WorkflowContext,
    ) -> Event<Self::Model>;

    async fn delete(&self, desired: Self::Model, ctx: WorkflowContext) -> Event<Self::Model>;

    async fn list(&self, filter: Self::ListFilter, next_token: Option<String>)
        -> Event<Self::Model>;
}

/// Decodes a wire request, runs the matching handler entry point and encodes
/// the result. Decoding failures become `InvalidRequest` events.
pub async fn invoke<H: ResourceHandler>(
    handler: &H,
    request: HandlerRequest<Value, WorkflowContext>,
) -> ProgressEvent<Value, WorkflowContext> {
    let action = request.action;
    match run(handler, request).await {
        Ok(event) => {
            info!(
                type_name = H::TYPE_NAME,
                action = %action,
                status = ?event.status,
                delay_seconds = event.callback_delay_seconds,
                "Invocation finished"
            );
            event
        }
        Err(err) => {
            warn!(type_name = H::TYPE_NAME, action = %action, error = %err, "Invocation rejected");
            ProgressEvent::failed(err.error_code(), err.to_string())
        }
    }
}

async fn run<H: ResourceHandler>(
    handler: &H,
    request: HandlerRequest<Value, WorkflowContext>,
) -> Result<ProgressEvent<Value, WorkflowContext>, HandlerError> {
    let ctx = request.callback_context.unwrap_or_default();
    let desired = request.desired_resource_state;

    let event = match request.action {
        Action::Create => handler.create(decode(desired)?, ctx).await,
        Action::Read => handler.read(decode(desired)?).await,
        Action::Update => {
            let previous = request
                .previous_resource_state
                .map(decode)
                .transpose()?;
            handler.update(decode(desired)?, previous, ctx).await
        }
        Action::Delete => handler.delete(decode(desired)?, ctx).await,
        Action::List => handler.list(decode(desired)?, request.next_token).await,
    };

    event
        .try_map_models(serde_json::to_value)
        .map_err(HandlerError::Encode)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, HandlerError> {
    serde_json::from_value(value).map_err(HandlerError::invalid_model)
}

/// Failure event for a backend error outside a workflow.
///
/// Read and list never ask to be re-invoked, so retryable classes surface as
/// a generic service exception with the backend message.
pub(crate) fn api_failure<M>(err: ApiError) -> Event<M> {
    let class = classify(&err);
    let code = if class.is_retryable() {
        HandlerErrorCode::GeneralServiceException
    } else {
        class.failure_code()
    };
    ProgressEvent::failed(code, err.reason())
}

/// Failure event for a request rejected before any backend call.
pub(crate) fn rejected<M>(code: HandlerErrorCode, message: impl Into<String>) -> Event<M> {
    let message = message.into();
    warn!(code = %code, message = %message, "Request rejected");
    ProgressEvent::failed(code, message)
}
