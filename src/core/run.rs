//! Run: one execution of a pipeline with resolved parameters

use crate::core::error::DefinitionError;
use crate::core::param;
use crate::core::pipeline::Pipeline;
use crate::core::state::{RunReport, RunState, TaskState, TaskReport};
use std::collections::HashMap;
use uuid::Uuid;

/// One execution instance of a pipeline.
///
/// Holds the fully resolved pipeline parameters and the per-task state
/// machine; the engine drives the transitions.
#[derive(Debug, Clone)]
pub struct Run {
    pub pipeline_name: String,

    /// Resolved pipeline-level parameter values
    pub params: HashMap<String, String>,

    /// Per-pipeline-task state
    pub task_states: HashMap<String, TaskState>,

    /// Overall run state
    pub state: RunState,
}

impl Run {
    /// Create a run from trigger-time parameter bindings.
    ///
    /// Required pipeline parameters without a binding or default are
    /// rejected here, before any step runs.
    pub fn new(
        pipeline: &Pipeline,
        bindings: &HashMap<String, String>,
    ) -> Result<Self, DefinitionError> {
        let params = param::resolve(&pipeline.params, bindings, &pipeline.name)?;

        let task_states = pipeline
            .pipeline_tasks
            .keys()
            .map(|name| (name.clone(), TaskState::Pending))
            .collect();

        Ok(Run {
            pipeline_name: pipeline.name.clone(),
            params,
            task_states,
            state: RunState::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.state.run_id
    }

    pub fn task_state(&self, name: &str) -> Option<&TaskState> {
        self.task_states.get(name)
    }

    pub fn set_task_state(&mut self, name: &str, state: TaskState) {
        self.task_states.insert(name.to_string(), state);
    }

    /// Pipeline tasks whose entire run_after set has succeeded, in
    /// deterministic topological order.
    pub fn ready_tasks(&self, pipeline: &Pipeline) -> Vec<String> {
        pipeline
            .execution_order()
            .iter()
            .filter(|name| {
                matches!(self.task_states.get(*name), Some(TaskState::Pending))
                    && pipeline
                        .pipeline_task(name)
                        .is_some_and(|pt| {
                            pt.run_after.iter().all(|dep| {
                                self.task_states
                                    .get(dep)
                                    .is_some_and(TaskState::is_succeeded)
                            })
                        })
            })
            .cloned()
            .collect()
    }

    /// Mark pending tasks skipped when a run_after member failed or was
    /// skipped. Runs to a fixpoint so skips propagate down chains.
    ///
    /// Returns the newly skipped tasks with their reasons.
    pub fn propagate_skips(&mut self, pipeline: &Pipeline) -> Vec<(String, String)> {
        let mut newly_skipped = Vec::new();

        loop {
            let mut changed = false;

            for name in pipeline.execution_order() {
                if !matches!(self.task_states.get(name), Some(TaskState::Pending)) {
                    continue;
                }
                let Some(pt) = pipeline.pipeline_task(name) else {
                    continue;
                };

                let blocked = pt.run_after.iter().find(|dep| {
                    matches!(
                        self.task_states.get(*dep),
                        Some(TaskState::Failed { .. }) | Some(TaskState::Skipped { .. })
                    )
                });

                if let Some(dep) = blocked {
                    let reason = match self.task_states.get(dep) {
                        Some(TaskState::Failed { .. }) => format!("dependency '{}' failed", dep),
                        _ => format!("dependency '{}' was skipped", dep),
                    };
                    self.task_states
                        .insert(name.clone(), TaskState::Skipped { reason: reason.clone() });
                    newly_skipped.push((name.clone(), reason));
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        newly_skipped
    }

    /// Mark every still-pending task skipped (cancellation path).
    pub fn skip_pending(&mut self, reason: &str) -> Vec<(String, String)> {
        let mut skipped = Vec::new();
        for (name, state) in self.task_states.iter_mut() {
            if matches!(state, TaskState::Pending) {
                *state = TaskState::Skipped {
                    reason: reason.to_string(),
                };
                skipped.push((name.clone(), reason.to_string()));
            }
        }
        skipped
    }

    /// A run is complete when no task remains pending or running.
    pub fn is_complete(&self) -> bool {
        self.task_states.values().all(TaskState::is_terminal)
    }

    pub fn all_succeeded(&self) -> bool {
        self.task_states.values().all(TaskState::is_succeeded)
    }

    /// Final report: every task's terminal status in execution order, with
    /// error kind and message for failures.
    pub fn report(&self, pipeline: &Pipeline) -> RunReport {
        let tasks = pipeline
            .execution_order()
            .iter()
            .filter_map(|name| {
                self.task_states.get(name).map(|state| {
                    let (error_kind, error, skip_reason) = match state {
                        TaskState::Failed {
                            error_kind, error, ..
                        } => (Some(error_kind.clone()), Some(error.clone()), None),
                        TaskState::Skipped { reason } => (None, None, Some(reason.clone())),
                        _ => (None, None, None),
                    };
                    TaskReport {
                        name: name.clone(),
                        status: state.label().to_string(),
                        error_kind,
                        error,
                        skip_reason,
                    }
                })
            })
            .collect();

        RunReport {
            run_id: self.state.run_id,
            pipeline_name: self.pipeline_name.clone(),
            status: self.state.status,
            started_at: self.state.started_at,
            completed_at: self.state.completed_at,
            degraded: self.state.degraded,
            tasks,
        }
    }
}
