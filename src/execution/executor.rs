//! Task executor - runs one bound task's steps in order

use crate::core::context::StepContext;
use crate::core::task::BoundTask;
use crate::execution::engine::{EventBus, ExecutionEvent};
use crate::steps::{action_for, StepError};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

/// All steps completed
#[derive(Debug, Clone)]
pub struct TaskSuccess {
    /// Merged outputs of all steps (later steps win on key collisions)
    pub outputs: HashMap<String, String>,

    /// Run log lines collected from every step
    pub logs: Vec<String>,

    /// At least one step reported a degraded condition
    pub degraded: bool,
}

/// A step failed; remaining steps did not run
#[derive(Debug, Clone)]
pub struct TaskFailure {
    /// The step that raised the error
    pub step: String,

    /// Error taxonomy kind
    pub error_kind: String,

    pub error: String,
}

/// Executes the steps of one bound task, strictly in order, fail-fast.
pub struct TaskExecutor {
    events: EventBus,
}

impl TaskExecutor {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }

    pub async fn execute(
        &self,
        bound: &BoundTask,
        ctx: &StepContext,
    ) -> Result<TaskSuccess, TaskFailure> {
        let mut success = TaskSuccess {
            outputs: HashMap::new(),
            logs: Vec::new(),
            degraded: false,
        };

        for step in &bound.steps {
            info!(
                task = ctx.task_name(),
                step = step.name.as_str(),
                "Executing step ({})",
                step.action.label()
            );
            self.events.emit(ExecutionEvent::StepStarted {
                task: ctx.task_name().to_string(),
                step: step.name.clone(),
            });

            let action = action_for(step.action);
            let result = match timeout(
                Duration::from_secs(step.timeout_secs),
                action.execute(step, ctx),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(StepError::Timeout(step.timeout_secs)),
            };

            match result {
                Ok(outcome) => {
                    self.events.emit(ExecutionEvent::StepCompleted {
                        task: ctx.task_name().to_string(),
                        step: step.name.clone(),
                        degraded: outcome.degraded,
                    });
                    success.outputs.extend(outcome.outputs);
                    success.logs.extend(outcome.logs);
                    success.degraded |= outcome.degraded;
                }
                Err(e) => {
                    error!(
                        task = ctx.task_name(),
                        step = step.name.as_str(),
                        "Step failed: {}",
                        e
                    );
                    return Err(TaskFailure {
                        step: step.name.clone(),
                        error_kind: e.kind().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(success)
    }
}
