//! Resumable reconciliation workflow primitives.
//!
//! This library provides the pieces for driving a remote resource from its
//! actual state to a desired state across many short, stateless invocations.
//! Key concepts:
//!
//! - **Desired state**: What the resource should look like (from the caller).
//! - **Actual state**: What the backend reports (from list/describe calls).
//! - **Workflow context**: The only state that survives between invocations.
//! - **Stage**: One idempotent unit of work guarded by a completed flag.
//!
//! An invocation runs stages in order until one cannot finish immediately.
//! Waiting (for backoff or for an asynchronous backend operation) never
//! happens in-process; the invocation returns [`StageResult::InProgress`] with
//! a delay and the driver calls back later with the returned context.
//!
//! # Invariants
//!
//! - Stage completed flags are never unset
//! - The retry budget only grows on a stage transition reset
//! - Every stage is safe to re-run from the top (idempotent or existence-guarded)
//! - A workflow terminates within `budget × max backoff` of wall-clock retrying

mod backoff;
mod budget;
mod classifier;
mod context;
mod error;
mod executor;
mod poller;
mod probe;
mod retry;
mod set;
mod stage;

pub use backoff::{
    BackoffBounds, BackoffPolicy, Bounds, FixedJitter, JitterSource, OperationWeight,
    SeededJitter, ThreadRngJitter,
};
pub use budget::{BudgetCheck, RetryBudget};
pub use classifier::{classify, ErrorClass};
pub use context::{StageId, WorkflowContext};
pub use error::{ApiError, ApiErrorCode};
pub use executor::{Finalizer, ResourceModel, StageResult, WorkflowExecutor};
pub use poller::{PollOutcome, PollStatus, StabilizationPoller, StatusSource};
pub use probe::{collect_all, exists, find, Page};
pub use retry::{Decision, RetryPolicy};
pub use set::{reconcile_set, ChildSet, ReconciliationPlan};
pub use stage::{Stage, StageError, StageOutcome, StageStatus};

/// Retryable failures tolerated per stage before the stage fails.
pub const DEFAULT_RETRY_BUDGET: u32 = 5;

/// Delay between stabilization polls.
pub const DEFAULT_STABILIZATION_DELAY_SECS: u32 = 5;
