//! rollout - a declarative continuous-deployment pipeline runner

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod remote;
pub mod steps;
pub mod workspace;

// Re-export commonly used types
pub use core::{Pipeline, PipelineConfig, Run, RunContext, RunReport, RunStatus, Task, TaskState};
pub use execution::{CancellationHandle, ExecutionEngine, ExecutionEvent, SchedulingStrategy};
pub use remote::{GitCliFetcher, InMemoryResourceStore, KubectlStore, ResourceStore, SourceFetcher};
pub use workspace::{DirWorkspace, InMemoryWorkspace, Workspace};
