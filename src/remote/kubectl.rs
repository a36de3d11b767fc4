//! kubectl subprocess store - talks to a real cluster through the CLI

use crate::remote::store::{Resource, ResourceError, ResourceKind, ResourceStore};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Resource store backed by the kubectl CLI
#[derive(Debug, Clone)]
pub struct KubectlStore {
    /// Path to kubectl executable
    kubectl_path: String,

    /// Namespace every object lives in
    namespace: String,

    /// Timeout for one kubectl invocation in seconds
    timeout_secs: u64,
}

impl KubectlStore {
    pub fn new(kubectl_path: String, namespace: String, timeout_secs: u64) -> Self {
        Self {
            kubectl_path,
            namespace,
            timeout_secs,
        }
    }

    fn api_kind(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
            ResourceKind::Route => "Route",
            ResourceKind::ConfigMap => "ConfigMap",
        }
    }

    fn api_version(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::Deployment => "apps/v1",
            ResourceKind::Route => "route.openshift.io/v1",
            ResourceKind::Service | ResourceKind::ConfigMap => "v1",
        }
    }

    /// Payload field holding the object's desired state. ConfigMaps carry
    /// their content under `data`, everything else under `spec`.
    fn payload_field(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::ConfigMap => "data",
            _ => "spec",
        }
    }

    fn manifest(resource: &Resource) -> Value {
        let payload = Self::payload_field(resource.kind);
        json!({
            "apiVersion": Self::api_version(resource.kind),
            "kind": Self::api_kind(resource.kind),
            "metadata": { "name": resource.name },
            payload: resource.spec,
        })
    }

    async fn run_kubectl(
        &self,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<KubectlOutput, ResourceError> {
        debug!("Spawning kubectl {:?}", args);

        let mut command = Command::new(&self.kubectl_path);
        command
            .args(["-n", &self.namespace])
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if stdin.is_some() {
            command.stdin(Stdio::piped());
        }

        let run = async {
            let mut child = command
                .spawn()
                .map_err(|e| ResourceError::Backend(format!("Failed to spawn kubectl: {}", e)))?;

            if let Some(input) = stdin {
                if let Some(mut handle) = child.stdin.take() {
                    handle.write_all(input).await.map_err(|e| {
                        ResourceError::Backend(format!("Failed to write kubectl stdin: {}", e))
                    })?;
                }
            }

            child
                .wait_with_output()
                .await
                .map_err(|e| ResourceError::Backend(format!("kubectl failed: {}", e)))
        };

        let output = timeout(Duration::from_secs(self.timeout_secs), run)
            .await
            .map_err(|_| {
                ResourceError::Backend(format!(
                    "kubectl timed out after {}s",
                    self.timeout_secs
                ))
            })??;

        Ok(KubectlOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

struct KubectlOutput {
    success: bool,
    stdout: Vec<u8>,
    stderr: String,
}

#[async_trait]
impl ResourceStore for KubectlStore {
    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Resource, ResourceError> {
        let output = self
            .run_kubectl(&["get", Self::api_kind(kind), name, "-o", "json"], None)
            .await?;

        if !output.success {
            if output.stderr.contains("NotFound") || output.stderr.contains("not found") {
                return Err(ResourceError::NotFound {
                    kind,
                    name: name.to_string(),
                });
            }
            warn!("kubectl get failed: {}", output.stderr);
            return Err(ResourceError::Backend(output.stderr));
        }

        let object: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ResourceError::Backend(format!("Bad kubectl output: {}", e)))?;
        let spec = object
            .get(Self::payload_field(kind))
            .cloned()
            .unwrap_or(Value::Null);

        Ok(Resource::new(kind, name, spec))
    }

    async fn create(&self, resource: &Resource) -> Result<(), ResourceError> {
        let manifest = serde_json::to_vec(&Self::manifest(resource))
            .map_err(|e| ResourceError::Backend(format!("Bad manifest: {}", e)))?;
        let output = self
            .run_kubectl(&["create", "-f", "-"], Some(&manifest))
            .await?;

        if !output.success {
            if output.stderr.contains("AlreadyExists") || output.stderr.contains("already exists")
            {
                return Err(ResourceError::Conflict {
                    kind: resource.kind,
                    name: resource.name.clone(),
                });
            }
            warn!("kubectl create failed: {}", output.stderr);
            return Err(ResourceError::Backend(output.stderr));
        }

        Ok(())
    }

    async fn update(&self, resource: &Resource) -> Result<(), ResourceError> {
        let manifest = serde_json::to_vec(&Self::manifest(resource))
            .map_err(|e| ResourceError::Backend(format!("Bad manifest: {}", e)))?;
        let output = self
            .run_kubectl(&["replace", "-f", "-"], Some(&manifest))
            .await?;

        if !output.success {
            if output.stderr.contains("NotFound") || output.stderr.contains("not found") {
                return Err(ResourceError::NotFound {
                    kind: resource.kind,
                    name: resource.name.clone(),
                });
            }
            warn!("kubectl replace failed: {}", output.stderr);
            return Err(ResourceError::Backend(output.stderr));
        }

        Ok(())
    }
}
