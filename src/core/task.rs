//! Task and step domain models
//!
//! A `Task` is a reusable template: a parameter schema, workspace
//! declarations, and an ordered list of steps. It is stateless between runs;
//! `instantiate` produces the `BoundTask` that actually executes.

use crate::core::error::DefinitionError;
use crate::core::param::{self, ParamSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Built-in step actions, each targeting one external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Clear the bound workspace (idempotent by the workspace contract)
    CleanWorkspace,
    /// Fetch a source revision into the bound workspace
    GitClone,
    /// Reconcile the deployment, its service, and its route
    ApplyDeployment,
    /// Reconcile a configuration object from a workspace file and attach it
    ApplyConfig,
}

impl ActionKind {
    /// Parameters that must be bound before this action can execute.
    ///
    /// Checked at definition time so a missing binding never surfaces as a
    /// runtime error.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            ActionKind::CleanWorkspace => &[],
            ActionKind::GitClone => &["url"],
            ActionKind::ApplyDeployment => &["name", "image"],
            ActionKind::ApplyConfig => &["name", "file", "deployment"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::CleanWorkspace => "clean-workspace",
            ActionKind::GitClone => "git-clone",
            ActionKind::ApplyDeployment => "apply-deployment",
            ActionKind::ApplyConfig => "apply-config",
        }
    }
}

/// A single step of a task template.
#[derive(Debug, Clone)]
pub struct StepSpec {
    /// Step name, unique within the task
    pub name: String,

    /// Which built-in action this step runs
    pub action: ActionKind,

    /// Parameter templates, rendered against the task's resolved parameters
    pub params: HashMap<String, String>,

    /// Timeout converting a hung external call into a failure
    pub timeout_secs: u64,
}

/// Defaults applied to steps that do not override them.
#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

/// A reusable, named sequence of steps with a parameter schema.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,

    /// Declared parameter schema
    pub params: Vec<ParamSpec>,

    /// Workspace names this task's steps operate on
    pub workspaces: Vec<String>,

    /// Steps, executed strictly in declared order
    pub steps: Vec<StepSpec>,
}

impl Task {
    /// Bind this template to concrete parameter values.
    ///
    /// Validates that every required parameter has a binding and that no
    /// binding names an undeclared parameter, then renders each step's
    /// parameter templates.
    pub fn instantiate(
        &self,
        bindings: &HashMap<String, String>,
    ) -> Result<BoundTask, DefinitionError> {
        let values = param::resolve(&self.params, bindings, &self.name)?;

        let steps = self
            .steps
            .iter()
            .map(|spec| BoundStep {
                name: spec.name.clone(),
                action: spec.action,
                params: spec
                    .params
                    .iter()
                    .map(|(k, v)| (k.clone(), param::render(v, &values)))
                    .collect(),
                timeout_secs: spec.timeout_secs,
            })
            .collect();

        Ok(BoundTask {
            task_name: self.name.clone(),
            steps,
            workspaces: self.workspaces.clone(),
        })
    }
}

/// A task bound to concrete parameter values, ready to execute.
#[derive(Debug, Clone)]
pub struct BoundTask {
    pub task_name: String,
    pub steps: Vec<BoundStep>,
    pub workspaces: Vec<String>,
}

/// A step with fully resolved parameters.
#[derive(Debug, Clone)]
pub struct BoundStep {
    pub name: String,
    pub action: ActionKind,
    pub params: HashMap<String, String>,
    pub timeout_secs: u64,
}

impl BoundStep {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
