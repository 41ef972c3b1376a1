//! Stage interface.

use async_trait::async_trait;
use ssoa_events::HandlerErrorCode;
use thiserror::Error;

use crate::{ApiError, OperationWeight, StageId, WorkflowContext};

/// Progress of a stage within one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// The stage's effect is in place; the executor sets its flag.
    Complete,
    /// The stage is waiting on the backend; re-invoke after the delay.
    Pending { delay_seconds: u32 },
}

/// Why a stage could not make progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// A backend call failed; classified by the retry policy.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The stage decided the workflow cannot succeed.
    #[error("{code}: {message}")]
    Rejected {
        code: HandlerErrorCode,
        message: String,
    },
}

impl StageError {
    pub fn rejected(code: HandlerErrorCode, message: impl Into<String>) -> Self {
        StageError::Rejected {
            code,
            message: message.into(),
        }
    }
}

pub type StageOutcome = Result<StageStatus, StageError>;

/// One idempotent unit of work inside a workflow.
///
/// A stage that has not completed is always re-run from the top, so calls it
/// makes may be repeated. Implementations must be naturally idempotent:
/// existence-checked creation, set-difference reconciliation, or a status
/// check keyed by a tracking token stored in the context.
#[async_trait]
pub trait Stage<M: Send + Sync>: Send + Sync {
    /// The flag guarding this stage.
    fn id(&self) -> StageId;

    /// Weight of the call that failed, used to pick throttling backoff.
    ///
    /// Evaluated after `execute`. While a tracking token is held the stage
    /// only polls a status, which is a light call.
    fn weight(&self, ctx: &WorkflowContext) -> OperationWeight {
        if ctx.tracking_token().is_some() {
            OperationWeight::Light
        } else {
            OperationWeight::Mutation
        }
    }

    /// Performs the stage's work for this invocation.
    async fn execute(&self, desired: &M, ctx: &mut WorkflowContext) -> StageOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let api = ApiError::throttling("Rate exceeded");
        assert_eq!(StageError::from(api.clone()).to_string(), api.to_string());
        assert_eq!(
            StageError::rejected(HandlerErrorCode::NotFound, "gone").to_string(),
            format!("{}: gone", HandlerErrorCode::NotFound)
        );
    }

    #[test]
    fn test_weight_follows_tracking_token() {
        struct Poll;

        #[async_trait]
        impl Stage<()> for Poll {
            fn id(&self) -> StageId {
                StageId::Provisioning
            }

            async fn execute(&self, _desired: &(), _ctx: &mut WorkflowContext) -> StageOutcome {
                Ok(StageStatus::Complete)
            }
        }

        let mut ctx = WorkflowContext::new();
        assert_eq!(Poll.weight(&ctx), OperationWeight::Mutation);
        ctx.set_tracking_token("req-1");
        assert_eq!(Poll.weight(&ctx), OperationWeight::Light);
    }
}
