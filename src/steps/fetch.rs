//! git-clone: fetch a source revision into the bound workspace

use crate::core::context::StepContext;
use crate::core::task::BoundStep;
use crate::steps::{required, StepAction, StepError, StepOutcome};
use async_trait::async_trait;
use tracing::info;

/// Fetches `url` at `revision` (default `main`) into the task's workspace.
///
/// The resolved commit is published as the `revision` output.
pub struct GitCloneAction;

#[async_trait]
impl StepAction for GitCloneAction {
    async fn execute(
        &self,
        step: &BoundStep,
        ctx: &StepContext,
    ) -> Result<StepOutcome, StepError> {
        let url = required(step, "url")?;
        let reference = step.param("revision").unwrap_or("main");
        let workspace = ctx.primary_workspace().ok_or(StepError::NoWorkspace)?;

        let revision = ctx.fetcher().fetch(url, reference, workspace.as_ref()).await?;
        info!(
            task = ctx.task_name(),
            "Fetched '{}' at {} into workspace '{}'",
            url,
            revision,
            workspace.name()
        );

        Ok(StepOutcome::default()
            .log(format!("fetched '{}' at {}", url, revision))
            .output("revision", revision.0))
    }
}
