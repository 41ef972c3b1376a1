//! Status of asynchronous backend requests.

use serde::{Deserialize, Serialize};
use ssoa_id::RequestId;
use ssoa_reconcile::PollStatus;

/// Lifecycle of an asynchronous request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusValue {
    InProgress,
    Failed,
    Succeeded,
}

/// Status record returned when a request is submitted and when it is described.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestStatus {
    pub request_id: RequestId,
    pub status: StatusValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl RequestStatus {
    pub fn in_progress(request_id: RequestId) -> Self {
        Self {
            request_id,
            status: StatusValue::InProgress,
            failure_reason: None,
        }
    }

    /// Maps the record to a poll result. A failure without a reason is still
    /// a failure; the reason falls back to the request id.
    pub fn poll_status(&self) -> PollStatus {
        match self.status {
            StatusValue::InProgress => PollStatus::Pending,
            StatusValue::Succeeded => PollStatus::Succeeded(()),
            StatusValue::Failed => PollStatus::Failed(
                self.failure_reason
                    .clone()
                    .unwrap_or_else(|| format!("Request {} failed", self.request_id)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_id() -> RequestId {
        RequestId::parse("6f1c4b0e-5e1a-4d43-9a1f-4f3c2d9e8b7a").unwrap()
    }

    #[test]
    fn test_poll_status() {
        let mut status = RequestStatus::in_progress(request_id());
        assert_eq!(status.poll_status(), PollStatus::Pending);

        status.status = StatusValue::Succeeded;
        assert_eq!(status.poll_status(), PollStatus::Succeeded(()));

        status.status = StatusValue::Failed;
        status.failure_reason = Some("Account is suspended".to_string());
        assert_eq!(
            status.poll_status(),
            PollStatus::Failed("Account is suspended".to_string())
        );
    }

    #[test]
    fn test_wire_form() {
        let json = serde_json::to_value(RequestStatus::in_progress(request_id())).unwrap();
        assert_eq!(json["Status"], "IN_PROGRESS");
        assert!(json.get("FailureReason").is_none());
    }
}
