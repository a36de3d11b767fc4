//! Pipeline definition from YAML
//!
//! All definition-time checks live here: duplicate names, unknown
//! references, unbound parameters, and cycles in the run_after graph are
//! rejected before any step runs.

use crate::core::error::{ConfigError, DefinitionError};
use crate::core::param::{self, ParamSpec};
use crate::core::pipeline::{Pipeline, PipelineTask};
use crate::core::task::{ActionKind, StepDefaults, StepSpec, Task};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Top-level pipeline definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Pipeline-level parameter schema
    #[serde(default)]
    pub params: Vec<ParamSpec>,

    /// Workspaces provisioned for each run
    #[serde(default)]
    pub workspaces: Vec<WorkspaceConfig>,

    /// Task templates
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,

    /// The DAG of pipeline tasks
    pub pipeline: Vec<PipelineTaskConfig>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_step_timeout_secs: Option<u64>,
}

/// Workspace declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// Task template as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Unique task name
    pub name: String,

    /// Parameter schema
    #[serde(default)]
    pub params: Vec<ParamSpec>,

    /// Workspace names this task's steps operate on
    #[serde(default)]
    pub workspaces: Vec<String>,

    /// Ordered steps
    pub steps: Vec<StepConfig>,
}

/// Step as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step name, unique within the task
    pub name: String,

    /// Built-in action to run
    pub action: ActionKind,

    /// Parameter templates over the task's parameters
    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Timeout for this step (overrides the pipeline default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Pipeline task (DAG node) as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTaskConfig {
    /// Node name
    pub name: String,

    /// Task template to run
    pub task: String,

    /// Parameter bindings: literals or `{{ pipeline-param }}` references
    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Explicit ordering edges
    #[serde(default)]
    pub run_after: Vec<String>,

    /// Workspace bindings: task workspace name -> pipeline workspace name
    #[serde(default)]
    pub workspaces: HashMap<String, String>,
}

impl PipelineConfig {
    /// Load a pipeline definition from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a pipeline definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the definition
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let mut task_names = HashSet::new();
        for task in &self.tasks {
            if !task_names.insert(task.name.as_str()) {
                return Err(DefinitionError::DuplicateTask(task.name.clone()));
            }
        }

        let mut node_names = HashSet::new();
        for node in &self.pipeline {
            if !node_names.insert(node.name.as_str()) {
                return Err(DefinitionError::DuplicatePipelineTask(node.name.clone()));
            }
        }

        let pipeline_params: HashSet<&str> =
            self.params.iter().map(|p| p.name.as_str()).collect();
        let workspace_names: HashSet<&str> =
            self.workspaces.iter().map(|w| w.name.as_str()).collect();

        self.validate_tasks()?;

        for node in &self.pipeline {
            let template = self
                .tasks
                .iter()
                .find(|t| t.name == node.task)
                .ok_or_else(|| DefinitionError::UnknownTask {
                    task: node.name.clone(),
                    reference: node.task.clone(),
                })?;

            for dep in &node.run_after {
                if !node_names.contains(dep.as_str()) {
                    return Err(DefinitionError::UnknownDependency {
                        task: node.name.clone(),
                        reference: dep.clone(),
                    });
                }
            }

            // Parameter bindings must name declared task parameters and
            // cover every required one.
            param::resolve(&template.params, &node.params, &node.name)?;

            // Binding values may reference pipeline-level parameters only.
            for value in node.params.values() {
                for referenced in param::placeholder_names(value) {
                    if !pipeline_params.contains(referenced.as_str()) {
                        return Err(DefinitionError::UnknownParameter {
                            scope: node.name.clone(),
                            param: referenced,
                        });
                    }
                }
            }

            // Every workspace the template declares must be bound to a
            // declared pipeline workspace.
            for ws in &template.workspaces {
                match node.workspaces.get(ws) {
                    None => {
                        return Err(DefinitionError::UnboundWorkspace {
                            scope: node.name.clone(),
                            task: template.name.clone(),
                            workspace: ws.clone(),
                        });
                    }
                    Some(target) if !workspace_names.contains(target.as_str()) => {
                        return Err(DefinitionError::UnknownWorkspace {
                            scope: node.name.clone(),
                            workspace: target.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
            for key in node.workspaces.keys() {
                if !template.workspaces.contains(key) {
                    return Err(DefinitionError::UnknownWorkspace {
                        scope: node.name.clone(),
                        workspace: key.clone(),
                    });
                }
            }
        }

        self.check_cycles()?;

        Ok(())
    }

    /// Per-template checks: step parameter templates may reference only the
    /// task's own parameters, and each action's required parameters must be
    /// bound by the step.
    fn validate_tasks(&self) -> Result<(), DefinitionError> {
        for task in &self.tasks {
            let declared: HashSet<&str> = task.params.iter().map(|p| p.name.as_str()).collect();

            for step in &task.steps {
                for value in step.params.values() {
                    for referenced in param::placeholder_names(value) {
                        if !declared.contains(referenced.as_str()) {
                            return Err(DefinitionError::UnknownParameter {
                                scope: format!("step '{}' of task '{}'", step.name, task.name),
                                param: referenced,
                            });
                        }
                    }
                }

                for required in step.action.required_params() {
                    if !step.params.contains_key(*required) {
                        return Err(DefinitionError::MissingStepParameter {
                            task: task.name.clone(),
                            step: step.name.clone(),
                            param: (*required).to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Reject cycles in the run_after graph.
    fn check_cycles(&self) -> Result<(), DefinitionError> {
        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for node in &self.pipeline {
            if !visited.contains(&node.name) {
                self.dfs_check(&node.name, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        recursion_stack: &mut HashSet<String>,
    ) -> Result<(), DefinitionError> {
        visited.insert(name.to_string());
        recursion_stack.insert(name.to_string());

        if let Some(node) = self.pipeline.iter().find(|n| n.name == name) {
            for dep in &node.run_after {
                if recursion_stack.contains(dep) {
                    return Err(DefinitionError::Cycle(dep.clone()));
                }
                if !visited.contains(dep) {
                    self.dfs_check(dep, visited, recursion_stack)?;
                }
            }
        }

        recursion_stack.remove(name);
        Ok(())
    }

    /// Convert the validated definition into the domain model.
    pub fn to_pipeline(&self) -> Pipeline {
        let defaults = StepDefaults {
            timeout_secs: self.default_step_timeout_secs.unwrap_or(300),
        };

        let tasks: HashMap<String, Task> = self
            .tasks
            .iter()
            .map(|t| {
                let task = Task {
                    name: t.name.clone(),
                    params: t.params.clone(),
                    workspaces: t.workspaces.clone(),
                    steps: t
                        .steps
                        .iter()
                        .map(|s| StepSpec {
                            name: s.name.clone(),
                            action: s.action,
                            params: s.params.clone(),
                            timeout_secs: s.timeout_secs.unwrap_or(defaults.timeout_secs),
                        })
                        .collect(),
                };
                (task.name.clone(), task)
            })
            .collect();

        let pipeline_tasks: HashMap<String, PipelineTask> = self
            .pipeline
            .iter()
            .map(|n| {
                let node = PipelineTask {
                    name: n.name.clone(),
                    task_ref: n.task.clone(),
                    params: n.params.clone(),
                    run_after: n.run_after.clone(),
                    workspaces: n.workspaces.clone(),
                };
                (node.name.clone(), node)
            })
            .collect();

        Pipeline::new(
            self.name.clone(),
            self.params.clone(),
            self.workspaces.iter().map(|w| w.name.clone()).collect(),
            tasks,
            pipeline_tasks,
        )
    }
}
