//! apply-deployment: reconcile the deployment and its traffic objects

use crate::core::context::StepContext;
use crate::core::task::BoundStep;
use crate::remote::{Resource, ResourceKind};
use crate::steps::{required, StepAction, StepError, StepOutcome};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

const DEFAULT_REPLICAS: u32 = 1;
const DEFAULT_PORT: u32 = 8080;

/// Brings the deployment, its service, and its route to the desired state.
///
/// All three go through `reconcile`, so a re-run of the same pipeline run
/// converges instead of failing on already-existing objects.
pub struct ApplyDeploymentAction;

#[async_trait]
impl StepAction for ApplyDeploymentAction {
    async fn execute(
        &self,
        step: &BoundStep,
        ctx: &StepContext,
    ) -> Result<StepOutcome, StepError> {
        let name = required(step, "name")?;
        let image = required(step, "image")?;
        let replicas = step
            .param("replicas")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_REPLICAS);
        let port = step
            .param("port")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_PORT);

        let store = ctx.store();
        let mut outcome = StepOutcome::default();

        let deployment = Resource::new(
            ResourceKind::Deployment,
            name,
            json!({ "image": image, "replicas": replicas }),
        );
        let applied = store.reconcile(&deployment).await?;
        outcome = outcome
            .log(format!("deployment '{}' {}", name, applied.label()))
            .output("deployment", applied.label());

        let service = Resource::new(
            ResourceKind::Service,
            name,
            json!({ "selector": { "app": name }, "port": port }),
        );
        let applied = store.reconcile(&service).await?;
        outcome = outcome
            .log(format!("service '{}' {}", name, applied.label()))
            .output("service", applied.label());

        let host = step
            .param("host")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.local", name));
        let route = Resource::new(
            ResourceKind::Route,
            name,
            json!({ "host": host, "service": name, "port": port }),
        );
        let applied = store.reconcile(&route).await?;
        outcome = outcome
            .log(format!("route '{}' {}", name, applied.label()))
            .output("route", applied.label());

        info!(
            task = ctx.task_name(),
            "Applied deployment '{}' with image '{}'", name, image
        );
        Ok(outcome)
    }
}
