//! Stabilization polling across invocations.
//!
//! Each invocation performs exactly one status check. Waiting happens between
//! invocations, driven by the delay returned to the driver.

use async_trait::async_trait;
use ssoa_events::HandlerErrorCode;
use tracing::{debug, warn};

use crate::{ApiError, StageError, StageStatus, DEFAULT_STABILIZATION_DELAY_SECS};

/// Status of an asynchronous backend operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<S = ()> {
    Pending,
    Succeeded(S),
    /// Carries the backend's human-readable failure reason.
    Failed(String),
}

/// Something that can describe the status of a tracked operation.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Final state returned with a success.
    type State: Send;

    async fn describe_status(&self, token: &str) -> Result<PollStatus<Self::State>, ApiError>;
}

/// Result of a single successful status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<S> {
    Pending { delay_seconds: u32 },
    Succeeded(S),
}

impl<S> PollOutcome<S> {
    /// Maps the outcome to stage progress, dropping the final state.
    pub fn into_status(self) -> StageStatus {
        match self {
            PollOutcome::Pending { delay_seconds } => StageStatus::Pending { delay_seconds },
            PollOutcome::Succeeded(_) => StageStatus::Complete,
        }
    }
}

/// Polls tracked operations with a fixed short delay.
///
/// Stabilization is expected to finish quickly, so its delay is seconds,
/// unlike throttling backoff which is minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizationPoller {
    delay_seconds: u32,
}

impl Default for StabilizationPoller {
    fn default() -> Self {
        Self::new(DEFAULT_STABILIZATION_DELAY_SECS)
    }
}

impl StabilizationPoller {
    pub fn new(delay_seconds: u32) -> Self {
        Self { delay_seconds }
    }

    pub fn delay_seconds(&self) -> u32 {
        self.delay_seconds
    }

    /// Performs one status check.
    ///
    /// A failed operation is terminal and reported with the backend reason
    /// verbatim.
    pub async fn poll<Src>(
        &self,
        source: &Src,
        token: &str,
    ) -> Result<PollOutcome<Src::State>, StageError>
    where
        Src: StatusSource + ?Sized,
    {
        match source.describe_status(token).await? {
            PollStatus::Pending => {
                debug!(token, delay_seconds = self.delay_seconds, "Operation still in progress");
                Ok(PollOutcome::Pending {
                    delay_seconds: self.delay_seconds,
                })
            }
            PollStatus::Succeeded(state) => {
                debug!(token, "Operation succeeded");
                Ok(PollOutcome::Succeeded(state))
            }
            PollStatus::Failed(reason) => {
                warn!(token, reason = %reason, "Operation failed");
                Err(StageError::rejected(HandlerErrorCode::NotStabilized, reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Scripted(Mutex<Vec<Result<PollStatus<u32>, ApiError>>>);

    #[async_trait]
    impl StatusSource for Scripted {
        type State = u32;

        async fn describe_status(&self, token: &str) -> Result<PollStatus<u32>, ApiError> {
            assert_eq!(token, "req-1");
            self.0.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn test_pending_then_succeeded() {
        let source = Scripted(Mutex::new(vec![
            Ok(PollStatus::Pending),
            Ok(PollStatus::Succeeded(7)),
        ]));
        let poller = StabilizationPoller::new(3);

        assert_eq!(
            poller.poll(&source, "req-1").await,
            Ok(PollOutcome::Pending { delay_seconds: 3 })
        );
        assert_eq!(
            poller.poll(&source, "req-1").await,
            Ok(PollOutcome::Succeeded(7))
        );
    }

    #[tokio::test]
    async fn test_failed_reason_is_verbatim() {
        let reason = "Received a 404 status error: Not supported account ID 111122223333.";
        let source = Scripted(Mutex::new(vec![Ok(PollStatus::Failed(reason.to_string()))]));
        let err = StabilizationPoller::default()
            .poll(&source, "req-1")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StageError::Rejected {
                code: HandlerErrorCode::NotStabilized,
                message: reason.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_describe_errors_are_api_errors() {
        let source = Scripted(Mutex::new(vec![Err(ApiError::throttling("Rate exceeded"))]));
        let err = StabilizationPoller::default()
            .poll(&source, "req-1")
            .await
            .unwrap_err();
        assert_eq!(err, StageError::Api(ApiError::throttling("Rate exceeded")));
    }

    #[test]
    fn test_outcome_into_status() {
        assert_eq!(
            PollOutcome::<()>::Pending { delay_seconds: 2 }.into_status(),
            StageStatus::Pending { delay_seconds: 2 }
        );
        assert_eq!(PollOutcome::Succeeded(()).into_status(), StageStatus::Complete);
    }
}
