//! Definition-time error types

use thiserror::Error;

/// Errors detected while loading or validating a pipeline definition.
///
/// All of these are rejected before any step runs.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("duplicate pipeline task name: {0}")]
    DuplicatePipelineTask(String),

    #[error("pipeline task '{task}' references unknown task '{reference}'")]
    UnknownTask { task: String, reference: String },

    #[error("pipeline task '{task}' runs after unknown pipeline task '{reference}'")]
    UnknownDependency { task: String, reference: String },

    #[error("'{scope}' binds unknown workspace '{workspace}'")]
    UnknownWorkspace { scope: String, workspace: String },

    #[error("task '{task}' declares workspace '{workspace}' but pipeline task '{scope}' does not bind it")]
    UnboundWorkspace {
        scope: String,
        task: String,
        workspace: String,
    },

    #[error("cycle detected in run_after graph involving '{0}'")]
    Cycle(String),

    #[error("parameter '{param}' of '{scope}' is not bound and has no default")]
    UnboundParameter { scope: String, param: String },

    #[error("'{scope}' references undeclared parameter '{param}'")]
    UnknownParameter { scope: String, param: String },

    #[error("step '{step}' of task '{task}' is missing required parameter '{param}'")]
    MissingStepParameter {
        task: String,
        step: String,
        param: String,
    },
}

/// Errors from loading a pipeline definition file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read pipeline file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pipeline YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Definition(#[from] DefinitionError),
}
