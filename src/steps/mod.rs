//! Built-in step actions
//!
//! Each action wraps exactly one external interaction and is idempotent:
//! re-running a step against an unchanged world is a no-op success. Actions
//! receive their fully rendered parameters and the task's `StepContext`;
//! they never reach outside it.

mod clean;
mod configure;
mod deploy;
mod fetch;

pub use clean::CleanWorkspaceAction;
pub use configure::ApplyConfigAction;
pub use deploy::ApplyDeploymentAction;
pub use fetch::GitCloneAction;

use crate::core::context::StepContext;
use crate::core::task::{ActionKind, BoundStep};
use crate::remote::{FetchError, ResourceError};
use crate::workspace::WorkspaceIoError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors a step can raise, by the external system that raised them
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceIoError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("step timed out after {0}s")]
    Timeout(u64),

    #[error("step parameter '{0}' is not bound")]
    MissingParam(String),

    #[error("step needs a workspace but its task has none bound")]
    NoWorkspace,
}

impl StepError {
    /// Coarse taxonomy label carried into reports.
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::Fetch(_) => "fetch",
            StepError::Workspace(_) => "workspace",
            StepError::Resource(_) => "resource",
            StepError::Timeout(_) => "timeout",
            StepError::MissingParam(_) => "definition",
            StepError::NoWorkspace => "definition",
        }
    }
}

/// What a successful step hands back to the executor
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    /// Named outputs (resolved revision, applied verdicts)
    pub outputs: HashMap<String, String>,

    /// Human-readable lines for the run log
    pub logs: Vec<String>,

    /// The step succeeded but observed a drift it could not fully repair
    pub degraded: bool,
}

impl StepOutcome {
    pub fn log(mut self, line: impl Into<String>) -> Self {
        self.logs.push(line.into());
        self
    }

    pub fn output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }
}

/// One executable step behavior.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn execute(
        &self,
        step: &BoundStep,
        ctx: &StepContext,
    ) -> Result<StepOutcome, StepError>;
}

/// Look up the behavior backing an action kind.
pub fn action_for(kind: ActionKind) -> Arc<dyn StepAction> {
    match kind {
        ActionKind::CleanWorkspace => Arc::new(CleanWorkspaceAction),
        ActionKind::GitClone => Arc::new(GitCloneAction),
        ActionKind::ApplyDeployment => Arc::new(ApplyDeploymentAction),
        ActionKind::ApplyConfig => Arc::new(ApplyConfigAction),
    }
}

/// Fetch a required, definition-time-validated parameter.
///
/// Absence here means a validation gap upstream, so it is still reported as
/// a definition error rather than panicking.
pub(crate) fn required<'a>(step: &'a BoundStep, key: &str) -> Result<&'a str, StepError> {
    step.param(key)
        .ok_or_else(|| StepError::MissingParam(key.to_string()))
}
