//! Execution engine - drives one run of a pipeline to a terminal state

use crate::core::context::RunContext;
use crate::core::error::DefinitionError;
use crate::core::param;
use crate::core::pipeline::Pipeline;
use crate::core::run::Run;
use crate::core::state::{RunReport, RunStatus, TaskState};
use crate::execution::executor::{TaskExecutor, TaskFailure, TaskSuccess};
use crate::execution::scheduler::{ExecutionScheduler, SchedulingStrategy};
use crate::workspace::WorkspaceIoError;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Failures of the engine itself, as opposed to failures of a task
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceIoError),

    #[error("run stuck: no task is ready and the run is not complete")]
    Stuck,

    #[error("task '{task}' aborted: {reason}")]
    TaskAborted { task: String, reason: String },
}

/// Events emitted while a run executes
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
    },
    TaskStarted {
        task: String,
    },
    StepStarted {
        task: String,
        step: String,
    },
    StepCompleted {
        task: String,
        step: String,
        degraded: bool,
    },
    TaskSucceeded {
        task: String,
        degraded: bool,
    },
    TaskFailed {
        task: String,
        step: String,
        error: String,
    },
    TaskSkipped {
        task: String,
        reason: String,
    },
    RunCancelled {
        run_id: Uuid,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of execution events to registered handlers.
///
/// Handlers run inline on the emitting task, so they should be cheap
/// (display updates, recording).
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.push(Arc::new(handler));
        }
    }

    pub fn emit(&self, event: ExecutionEvent) {
        if let Ok(handlers) = self.handlers.lock() {
            for handler in handlers.iter() {
                handler(event.clone());
            }
        }
    }
}

/// Cooperative cancellation flag shared with signal handlers.
///
/// Cancelling stops new batches from being scheduled; tasks already in
/// flight run to completion, then everything still pending is skipped.
#[derive(Clone, Default)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Drives a run batch by batch until every task is terminal
pub struct ExecutionEngine {
    scheduler: ExecutionScheduler,
    events: EventBus,
    cancel: CancellationHandle,
}

impl ExecutionEngine {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(strategy),
            events: EventBus::new(),
            cancel: CancellationHandle::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.add_handler(handler);
    }

    /// Handle that lets a signal handler cancel this run.
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Execute the run to completion.
    ///
    /// Each round takes the ready batch from the scheduler, spawns every
    /// member, waits for the whole batch, applies the results, and
    /// propagates skips before scheduling the next round.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        run: &mut Run,
        ctx: &RunContext,
    ) -> Result<RunReport, EngineError> {
        let run_id = run.id();
        info!("Starting run {} of pipeline '{}'", run_id, pipeline.name);

        for (name, workspace) in ctx.workspaces() {
            workspace.provision().await?;
            info!("Provisioned workspace '{}'", name);
        }

        run.state.start();
        self.events.emit(ExecutionEvent::RunStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
        });

        while !run.is_complete() {
            if self.cancel.is_cancelled() {
                warn!("Run {} cancelled", run_id);
                for (task, reason) in run.skip_pending("run cancelled") {
                    self.events.emit(ExecutionEvent::TaskSkipped { task, reason });
                }
                run.state.cancel();
                self.events.emit(ExecutionEvent::RunCancelled { run_id });
                self.events.emit(ExecutionEvent::RunCompleted {
                    run_id,
                    status: run.state.status,
                });
                return Ok(run.report(pipeline));
            }

            let batch = self.scheduler.next_tasks(run, pipeline);
            if batch.is_empty() {
                // The DAG was validated, so an empty batch with work left
                // means a bug rather than a bad definition.
                error!("Run {} has no ready task but is not complete", run_id);
                run.state.fail();
                return Err(EngineError::Stuck);
            }

            let mut handles = Vec::with_capacity(batch.len());
            for name in batch {
                run.set_task_state(
                    &name,
                    TaskState::Running {
                        started_at: Utc::now(),
                    },
                );
                self.events.emit(ExecutionEvent::TaskStarted { task: name.clone() });

                let (bound, step_ctx) = self.bind(pipeline, run, ctx, &name)?;
                let executor = TaskExecutor::new(self.events.clone());
                handles.push((
                    name,
                    tokio::spawn(async move { executor.execute(&bound, &step_ctx).await }),
                ));
            }

            for (name, handle) in handles {
                let result = handle.await.map_err(|e| EngineError::TaskAborted {
                    task: name.clone(),
                    reason: e.to_string(),
                })?;
                self.apply_result(run, &name, result);
            }

            for (task, reason) in run.propagate_skips(pipeline) {
                self.events.emit(ExecutionEvent::TaskSkipped { task, reason });
            }
        }

        if run.all_succeeded() {
            run.state.succeed();
        } else {
            run.state.fail();
        }
        info!("Run {} finished: {:?}", run_id, run.state.status);
        self.events.emit(ExecutionEvent::RunCompleted {
            run_id,
            status: run.state.status,
        });

        Ok(run.report(pipeline))
    }

    /// Bind one pipeline task: render its parameter bindings against the
    /// run's resolved parameters, instantiate the template, and narrow the
    /// run context.
    fn bind(
        &self,
        pipeline: &Pipeline,
        run: &Run,
        ctx: &RunContext,
        name: &str,
    ) -> Result<(crate::core::task::BoundTask, crate::core::context::StepContext), EngineError>
    {
        let node = pipeline
            .pipeline_task(name)
            .ok_or_else(|| DefinitionError::UnknownTask {
                task: name.to_string(),
                reference: name.to_string(),
            })?;
        let template =
            pipeline
                .task(&node.task_ref)
                .ok_or_else(|| DefinitionError::UnknownTask {
                    task: name.to_string(),
                    reference: node.task_ref.clone(),
                })?;

        let bindings = node
            .params
            .iter()
            .map(|(k, v)| (k.clone(), param::render(v, &run.params)))
            .collect();
        let bound = template.instantiate(&bindings)?;
        let step_ctx = ctx.step_context(node, &bound);

        Ok((bound, step_ctx))
    }

    fn apply_result(&self, run: &mut Run, name: &str, result: Result<TaskSuccess, TaskFailure>) {
        let started_at = match run.task_state(name) {
            Some(TaskState::Running { started_at }) => *started_at,
            _ => Utc::now(),
        };

        match result {
            Ok(success) => {
                info!("Task '{}' succeeded", name);
                run.state.degraded |= success.degraded;
                run.set_task_state(
                    name,
                    TaskState::Succeeded {
                        started_at,
                        completed_at: Utc::now(),
                        degraded: success.degraded,
                    },
                );
                self.events.emit(ExecutionEvent::TaskSucceeded {
                    task: name.to_string(),
                    degraded: success.degraded,
                });
            }
            Err(failure) => {
                error!(
                    "Task '{}' failed at step '{}': {}",
                    name, failure.step, failure.error
                );
                run.set_task_state(
                    name,
                    TaskState::Failed {
                        step: failure.step.clone(),
                        error_kind: failure.error_kind,
                        error: failure.error.clone(),
                        started_at,
                        failed_at: Utc::now(),
                    },
                );
                self.events.emit(ExecutionEvent::TaskFailed {
                    task: name.to_string(),
                    step: failure.step,
                    error: failure.error,
                });
            }
        }
    }
}
