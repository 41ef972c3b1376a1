//! Retry decisions: classifier, budget and backoff combined.

use ssoa_events::HandlerErrorCode;
use tracing::warn;

use crate::{
    classify, BackoffPolicy, OperationWeight, RetryBudget, StageError, StageId, WorkflowContext,
};

/// What to do with a failed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Re-invoke after the delay; the context budget was decremented.
    Retry { delay_seconds: u32 },
    /// End the workflow.
    Fail {
        code: HandlerErrorCode,
        message: String,
    },
}

/// Retry policy shared by every stage of a workflow.
#[derive(Debug, Default)]
pub struct RetryPolicy {
    pub budget: RetryBudget,
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn new(budget: RetryBudget, backoff: BackoffPolicy) -> Self {
        Self { budget, backoff }
    }

    /// Decides how a failed stage continues.
    ///
    /// Terminal failures and budget exhaustion carry the backend message
    /// verbatim. Exhaustion is reported as a generic service exception so
    /// callers can tell "never recovered in time" from "definitively no".
    pub fn decide(
        &self,
        stage: Option<StageId>,
        error: StageError,
        weight: OperationWeight,
        ctx: &mut WorkflowContext,
    ) -> Decision {
        let api_error = match error {
            StageError::Rejected { code, message } => return Decision::Fail { code, message },
            StageError::Api(err) => err,
        };

        let class = classify(&api_error);
        let Some(delay_seconds) = self.backoff.delay_for(class, weight) else {
            return Decision::Fail {
                code: class.failure_code(),
                message: api_error.reason(),
            };
        };

        let check = self.budget.consume(ctx);
        if check.exhausted {
            warn!(
                stage = stage.map(|s| s.as_str()).unwrap_or("finalize"),
                class = %class,
                error = %api_error,
                "Retry budget exhausted"
            );
            return Decision::Fail {
                code: HandlerErrorCode::GeneralServiceException,
                message: api_error.reason(),
            };
        }

        warn!(
            stage = stage.map(|s| s.as_str()).unwrap_or("finalize"),
            class = %class,
            remaining = check.remaining,
            delay_seconds,
            error = %api_error,
            "Retryable backend failure"
        );
        Decision::Retry { delay_seconds }
    }
}
