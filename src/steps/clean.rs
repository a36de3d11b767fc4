//! clean-workspace: reset the bound workspace to empty

use crate::core::context::StepContext;
use crate::core::task::BoundStep;
use crate::steps::{StepAction, StepError, StepOutcome};
use async_trait::async_trait;
use tracing::info;

/// Clears the task's workspace so later tasks start from a blank slate.
///
/// An already-empty or never-provisioned workspace is a success, which is
/// what makes re-running a whole pipeline safe.
pub struct CleanWorkspaceAction;

#[async_trait]
impl StepAction for CleanWorkspaceAction {
    async fn execute(
        &self,
        _step: &BoundStep,
        ctx: &StepContext,
    ) -> Result<StepOutcome, StepError> {
        let workspace = ctx.primary_workspace().ok_or(StepError::NoWorkspace)?;

        workspace.clear().await?;
        info!(task = ctx.task_name(), "Cleared workspace '{}'", workspace.name());

        Ok(StepOutcome::default().log(format!("cleared workspace '{}'", workspace.name())))
    }
}
