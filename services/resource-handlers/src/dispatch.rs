//! Routes wire requests to resource handlers by type name.

use std::sync::Arc;

use serde_json::Value;
use ssoa_api::Backend;
use ssoa_events::{EventError, HandlerRequest, ProgressEvent};
use ssoa_reconcile::WorkflowContext;
use tracing::{instrument, warn};

use crate::resources::{access_control, assignment, invoke, permission_set};
use crate::{
    AccessControlHandler, AssignmentHandler, HandlerConfig, HandlerError, PermissionSetHandler,
};

/// Every resource handler, sharing one backend.
pub struct Dispatcher {
    assignment: AssignmentHandler,
    access_control: AccessControlHandler,
    permission_set: PermissionSetHandler,
    config: HandlerConfig,
}

impl Dispatcher {
    pub fn new<B: Backend + 'static>(backend: Arc<B>, config: HandlerConfig) -> Self {
        Self {
            assignment: AssignmentHandler::new(backend.clone(), config.clone()),
            access_control: AccessControlHandler::new(backend.clone(), config.clone()),
            permission_set: PermissionSetHandler::new(backend, config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Resource type names this dispatcher serves.
    pub fn type_names() -> [&'static str; 3] {
        [
            assignment::TYPE_NAME,
            access_control::TYPE_NAME,
            permission_set::TYPE_NAME,
        ]
    }

    /// Runs one invocation. Never fails: every problem is reported as a
    /// `FAILED` event.
    #[instrument(skip_all, fields(type_name = %request.type_name, action = %request.action))]
    pub async fn handle(
        &self,
        request: HandlerRequest<Value, WorkflowContext>,
    ) -> ProgressEvent<Value, WorkflowContext> {
        let type_name = request.type_name.clone();
        match type_name.as_str() {
            assignment::TYPE_NAME => invoke(&self.assignment, request).await,
            access_control::TYPE_NAME => invoke(&self.access_control, request).await,
            permission_set::TYPE_NAME => invoke(&self.permission_set, request).await,
            other => {
                let err = HandlerError::from(EventError::UnknownResourceType(other.to_string()));
                warn!(error = %err, "Request rejected");
                ProgressEvent::failed(err.error_code(), err.to_string())
            }
        }
    }
}
