//! apply-config: reconcile a configuration object from a workspace file

use crate::core::context::StepContext;
use crate::core::task::BoundStep;
use crate::remote::{Resource, ResourceError, ResourceKind};
use crate::steps::{required, StepAction, StepError, StepOutcome};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Reconciles a config-map from a file in the task's workspace, then points
/// the named deployment at it.
///
/// A missing deployment is degraded, not fatal: the config object still
/// lands, and attaching it succeeds on the next run once the deployment
/// exists.
pub struct ApplyConfigAction;

#[async_trait]
impl StepAction for ApplyConfigAction {
    async fn execute(
        &self,
        step: &BoundStep,
        ctx: &StepContext,
    ) -> Result<StepOutcome, StepError> {
        let name = required(step, "name")?;
        let file = required(step, "file")?;
        let deployment_name = required(step, "deployment")?;

        let workspace = ctx.primary_workspace().ok_or(StepError::NoWorkspace)?;
        let content = workspace.read(file).await?;
        let content = String::from_utf8_lossy(&content).into_owned();

        // The file's basename keys the entry, matching how the content was
        // laid out in the source tree.
        let entry = file.rsplit('/').next().unwrap_or(file);

        let store = ctx.store();
        let mut outcome = StepOutcome::default();

        let config = Resource::new(ResourceKind::ConfigMap, name, json!({ entry: content }));
        let applied = store.reconcile(&config).await?;
        outcome = outcome
            .log(format!("config-map '{}' {}", name, applied.label()))
            .output("config", applied.label());

        match store.get(ResourceKind::Deployment, deployment_name).await {
            Ok(mut deployment) => {
                if deployment.spec.get("configRef") != Some(&Value::String(name.to_string())) {
                    if let Some(spec) = deployment.spec.as_object_mut() {
                        spec.insert("configRef".to_string(), Value::String(name.to_string()));
                    } else {
                        deployment.spec =
                            serde_json::json!({ "configRef": name });
                    }
                    store.update(&deployment).await?;
                    outcome = outcome.log(format!(
                        "attached config-map '{}' to deployment '{}'",
                        name, deployment_name
                    ));
                } else {
                    outcome = outcome.log(format!(
                        "deployment '{}' already references config-map '{}'",
                        deployment_name, name
                    ));
                }
                info!(
                    task = ctx.task_name(),
                    "Configured deployment '{}' with '{}'", deployment_name, name
                );
            }
            Err(ResourceError::NotFound { .. }) => {
                warn!(
                    task = ctx.task_name(),
                    "Deployment '{}' not found; config-map '{}' applied but not attached",
                    deployment_name,
                    name
                );
                outcome.degraded = true;
                outcome = outcome.log(format!(
                    "deployment '{}' not found, config-map not attached",
                    deployment_name
                ));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(outcome)
    }
}
