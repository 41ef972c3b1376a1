//! Per-stage retry budget.
//!
//! The budget lives in the workflow context. Each retryable failure consumes
//! one unit; a failure that finds the budget empty ends the workflow. Budgets
//! are not shared across stages: completing a stage resets the allowance so
//! failures early in a long stage list cannot starve later stages.

use crate::{WorkflowContext, DEFAULT_RETRY_BUDGET};

/// Result of consuming one unit of budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetCheck {
    /// Units left after this failure.
    pub remaining: u32,

    /// True if the budget was already empty; the failure is terminal.
    pub exhausted: bool,
}

/// Retry budget configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    limit: u32,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BUDGET)
    }
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }

    /// Allowance a stage starts with.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Initializes a context on the first invocation. No-op when resumed.
    pub fn start(&self, ctx: &mut WorkflowContext) {
        if !ctx.is_started() {
            ctx.start(self.limit);
        }
    }

    /// Consumes one unit for a retryable failure.
    pub fn consume(&self, ctx: &mut WorkflowContext) -> BudgetCheck {
        let remaining = ctx.retry_budget();
        if remaining == 0 {
            return BudgetCheck {
                remaining: 0,
                exhausted: true,
            };
        }
        ctx.set_retry_budget(remaining - 1);
        BudgetCheck {
            remaining: remaining - 1,
            exhausted: false,
        }
    }

    /// Restores the full allowance on a stage transition.
    pub fn reset(&self, ctx: &mut WorkflowContext) {
        ctx.set_retry_budget(self.limit);
    }
}
