//! Core domain models: pipelines, tasks, runs, and their validation

pub mod config;
pub mod context;
pub mod error;
pub mod param;
pub mod pipeline;
pub mod run;
pub mod state;
pub mod task;

pub use config::PipelineConfig;
pub use context::{RunContext, StepContext};
pub use error::{ConfigError, DefinitionError};
pub use param::ParamSpec;
pub use pipeline::{Pipeline, PipelineTask};
pub use run::Run;
pub use state::{RunReport, RunState, RunStatus, TaskReport, TaskState};
pub use task::{ActionKind, BoundStep, BoundTask, StepDefaults, StepSpec, Task};
