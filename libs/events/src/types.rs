//! Progress event definitions.
//!
//! A progress event is the single result of one invocation. Its status tells
//! the driver whether the workflow finished, failed, or must be re-invoked
//! after `callback_delay_seconds` with the returned callback context.

use serde::{Deserialize, Serialize};

// =============================================================================
// Status and Error Codes
// =============================================================================

/// Outcome status of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// The workflow finished successfully.
    Success,
    /// The workflow must be re-invoked after the callback delay.
    InProgress,
    /// The workflow failed terminally.
    Failed,
}

impl OperationStatus {
    /// Returns true if no further invocation is expected.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Success => write!(f, "SUCCESS"),
            OperationStatus::InProgress => write!(f, "IN_PROGRESS"),
            OperationStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Error code reported on a `FAILED` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlerErrorCode {
    /// The requested change touches a create-only property.
    NotUpdatable,
    /// The desired model or a backend request was malformed.
    InvalidRequest,
    /// The caller is not permitted to perform the operation.
    AccessDenied,
    /// An equivalent resource already exists.
    AlreadyExists,
    /// The resource does not exist.
    NotFound,
    /// The backend reported that an asynchronous operation failed.
    NotStabilized,
    /// The backend kept failing with retryable errors until the retry budget ran out.
    GeneralServiceException,
    /// An unrecognized failure.
    InternalFailure,
}

impl HandlerErrorCode {
    /// Returns the wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerErrorCode::NotUpdatable => "NotUpdatable",
            HandlerErrorCode::InvalidRequest => "InvalidRequest",
            HandlerErrorCode::AccessDenied => "AccessDenied",
            HandlerErrorCode::AlreadyExists => "AlreadyExists",
            HandlerErrorCode::NotFound => "NotFound",
            HandlerErrorCode::NotStabilized => "NotStabilized",
            HandlerErrorCode::GeneralServiceException => "GeneralServiceException",
            HandlerErrorCode::InternalFailure => "InternalFailure",
        }
    }
}

impl std::fmt::Display for HandlerErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Progress Event
// =============================================================================

/// The result of one invocation.
///
/// `M` is the resource model type and `C` the callback context type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent<M, C> {
    /// Outcome status.
    pub status: OperationStatus,

    /// Suggested delay before re-invocation; meaningful only when in progress.
    #[serde(default)]
    pub callback_delay_seconds: u32,

    /// Observed model on success, working model while in progress.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub resource_model: Option<M>,

    /// Models returned by a list action.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub resource_models: Option<Vec<M>>,

    /// Pagination token returned by a list action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,

    /// Context to pass back verbatim on the next invocation.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub callback_context: Option<C>,

    /// Error code on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<HandlerErrorCode>,

    /// Backend message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<M, C> ProgressEvent<M, C> {
    fn empty(status: OperationStatus) -> Self {
        Self {
            status,
            callback_delay_seconds: 0,
            resource_model: None,
            resource_models: None,
            next_token: None,
            callback_context: None,
            error_code: None,
            message: None,
        }
    }

    /// A successful terminal event. Delete workflows pass `None`.
    pub fn success(model: Option<M>) -> Self {
        Self {
            resource_model: model,
            ..Self::empty(OperationStatus::Success)
        }
    }

    /// A successful list result.
    pub fn listed(models: Vec<M>, next_token: Option<String>) -> Self {
        Self {
            resource_models: Some(models),
            next_token,
            ..Self::empty(OperationStatus::Success)
        }
    }

    /// A request to be re-invoked after `delay_seconds`.
    pub fn in_progress(delay_seconds: u32, context: C, model: Option<M>) -> Self {
        Self {
            callback_delay_seconds: delay_seconds,
            callback_context: Some(context),
            resource_model: model,
            ..Self::empty(OperationStatus::InProgress)
        }
    }

    /// A terminal failure carrying the original message.
    pub fn failed(code: HandlerErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code),
            message: Some(message.into()),
            ..Self::empty(OperationStatus::Failed)
        }
    }

    /// Returns true if this event ends the workflow.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Converts the model type, leaving everything else untouched.
    pub fn try_map_models<N, E>(
        self,
        mut f: impl FnMut(M) -> Result<N, E>,
    ) -> Result<ProgressEvent<N, C>, E> {
        let resource_model = self.resource_model.map(&mut f).transpose()?;
        let resource_models = match self.resource_models {
            Some(models) => Some(models.into_iter().map(&mut f).collect::<Result<_, _>>()?),
            None => None,
        };
        Ok(ProgressEvent {
            status: self.status,
            callback_delay_seconds: self.callback_delay_seconds,
            resource_model,
            resource_models,
            next_token: self.next_token,
            callback_context: self.callback_context,
            error_code: self.error_code,
            message: self.message,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    type Event = ProgressEvent<serde_json::Value, serde_json::Value>;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&OperationStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(
            serde_json::to_string(&OperationStatus::Success).unwrap(),
            "\"SUCCESS\""
        );
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&HandlerErrorCode::GeneralServiceException).unwrap();
        assert_eq!(json, "\"GeneralServiceException\"");
        assert_eq!(HandlerErrorCode::AlreadyExists.to_string(), "AlreadyExists");
    }

    #[test]
    fn test_in_progress_wire_shape() {
        let event = Event::in_progress(
            5,
            serde_json::json!({"started": true}),
            Some(serde_json::json!({"Name": "x"})),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "IN_PROGRESS");
        assert_eq!(value["callbackDelaySeconds"], 5);
        assert_eq!(value["callbackContext"]["started"], true);
        assert!(value.get("errorCode").is_none());
    }

    #[test]
    fn test_failed_keeps_message() {
        let event = Event::failed(HandlerErrorCode::NotFound, "Permission set not found");
        assert!(event.is_terminal());
        assert_eq!(event.message.as_deref(), Some("Permission set not found"));
        assert!(event.callback_context.is_none());
    }

    #[test]
    fn test_delete_success_has_no_model() {
        let event = Event::success(None);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, serde_json::json!({"status": "SUCCESS", "callbackDelaySeconds": 0}));
    }

    #[test]
    fn test_try_map_models() {
        let event: ProgressEvent<u32, ()> = ProgressEvent::listed(vec![1, 2], Some("t".into()));
        let mapped = event
            .try_map_models(|n| Ok::<_, String>(n.to_string()))
            .unwrap();
        assert_eq!(
            mapped.resource_models,
            Some(vec!["1".to_string(), "2".to_string()])
        );
        assert_eq!(mapped.next_token.as_deref(), Some("t"));
    }
}
