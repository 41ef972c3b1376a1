//! Workflow executor.
//!
//! Runs an ordered list of stages against a [`WorkflowContext`]. Completed
//! stages are skipped, the first stage that cannot finish ends the invocation,
//! and once every stage is done the optional finalizer reads back the result.

use async_trait::async_trait;
use ssoa_events::{HandlerErrorCode, ProgressEvent};
use tracing::{debug, info, instrument};

use crate::{
    Decision, OperationWeight, RetryPolicy, Stage, StageError, StageId, StageStatus,
    WorkflowContext,
};

/// Result of one workflow invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult<M> {
    /// Every stage completed. Carries the read-back model, if any.
    Done(Option<M>),
    /// Re-invoke after the delay with the returned context.
    InProgress {
        delay_seconds: u32,
        context: WorkflowContext,
        model: M,
    },
    /// The workflow ended without reaching the desired state.
    Failed {
        code: HandlerErrorCode,
        message: String,
    },
}

impl<M> StageResult<M> {
    pub fn failed(code: HandlerErrorCode, message: impl Into<String>) -> Self {
        StageResult::Failed {
            code,
            message: message.into(),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, StageResult::InProgress { .. })
    }

    /// Converts the result to the event returned to the driver.
    pub fn into_event(self) -> ProgressEvent<M, WorkflowContext> {
        match self {
            StageResult::Done(model) => ProgressEvent::success(model),
            StageResult::InProgress {
                delay_seconds,
                context,
                model,
            } => ProgressEvent::in_progress(delay_seconds, context, Some(model)),
            StageResult::Failed { code, message } => ProgressEvent::failed(code, message),
        }
    }
}

/// A resource model a workflow operates on.
pub trait ResourceModel: Clone + Send + Sync {
    /// Copies identifiers learned during the workflow into the model
    /// reported with an in-progress event.
    fn annotate(&mut self, _ctx: &WorkflowContext) {}
}

/// Produces the terminal model once every stage has completed.
#[async_trait]
pub trait Finalizer<M>: Send + Sync {
    async fn finalize(&self, desired: &M, ctx: &WorkflowContext) -> Result<Option<M>, StageError>;
}

/// An ordered, resumable list of stages sharing one retry policy.
pub struct WorkflowExecutor<M> {
    name: &'static str,
    stages: Vec<Box<dyn Stage<M>>>,
    finalizer: Option<Box<dyn Finalizer<M>>>,
    policy: RetryPolicy,
}

impl<M: Send + Sync> std::fmt::Debug for WorkflowExecutor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("name", &self.name)
            .field("stages", &self.stage_ids())
            .field("finalizer", &self.finalizer.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}

impl<M: Send + Sync> WorkflowExecutor<M> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id()).collect()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<M: ResourceModel> WorkflowExecutor<M> {
    pub fn new(name: &'static str, policy: RetryPolicy) -> Self {
        Self {
            name,
            stages: Vec::new(),
            finalizer: None,
            policy,
        }
    }

    /// Appends a stage. Stages run in the order they are added.
    pub fn stage(mut self, stage: impl Stage<M> + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Sets the read-back step run after the last stage.
    pub fn finalize_with(mut self, finalizer: impl Finalizer<M> + 'static) -> Self {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    /// Runs one invocation of the workflow.
    #[instrument(skip_all, fields(workflow = self.name, budget = ctx.retry_budget()))]
    pub async fn run(&self, desired: &M, mut ctx: WorkflowContext) -> StageResult<M> {
        self.policy.budget.start(&mut ctx);

        for stage in &self.stages {
            let id = stage.id();
            if ctx.is_completed(id) {
                debug!(stage = %id, "Stage already completed");
                continue;
            }

            match stage.execute(desired, &mut ctx).await {
                Ok(StageStatus::Complete) => {
                    ctx.complete_stage(id);
                    self.policy.budget.reset(&mut ctx);
                    info!(stage = %id, "Stage completed");
                }
                Ok(StageStatus::Pending { delay_seconds }) => {
                    debug!(stage = %id, delay_seconds, "Stage pending");
                    return in_progress(desired, delay_seconds, ctx);
                }
                Err(err) => {
                    let weight = stage.weight(&ctx);
                    return match self.policy.decide(Some(id), err, weight, &mut ctx) {
                        Decision::Retry { delay_seconds } => in_progress(desired, delay_seconds, ctx),
                        Decision::Fail { code, message } => StageResult::Failed { code, message },
                    };
                }
            }
        }

        let Some(finalizer) = &self.finalizer else {
            return StageResult::Done(None);
        };

        match finalizer.finalize(desired, &ctx).await {
            Ok(model) => StageResult::Done(model),
            Err(err) => match self.policy.decide(None, err, OperationWeight::Light, &mut ctx) {
                Decision::Retry { delay_seconds } => in_progress(desired, delay_seconds, ctx),
                Decision::Fail { code, message } => StageResult::Failed { code, message },
            },
        }
    }
}

fn in_progress<M: ResourceModel>(
    desired: &M,
    delay_seconds: u32,
    context: WorkflowContext,
) -> StageResult<M> {
    let mut model = desired.clone();
    model.annotate(&context);
    StageResult::InProgress {
        delay_seconds,
        context,
        model,
    }
}
