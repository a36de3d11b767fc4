//! Resource store - the deployment target's declarative object API
//!
//! Steps never issue bare creates or updates; they go through `reconcile`,
//! which makes every apply idempotent: create when absent, update when the
//! desired spec differs, leave alone when it already matches.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Errors from the deployment target
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("{kind} '{name}' already exists")]
    Conflict { kind: ResourceKind, name: String },

    #[error("resource backend error: {0}")]
    Backend(String),
}

/// The kinds of objects a rollout manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Deployment,
    Service,
    Route,
    ConfigMap,
}

impl ResourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployment",
            ResourceKind::Service => "service",
            ResourceKind::Route => "route",
            ResourceKind::ConfigMap => "config-map",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A named object plus its desired spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub name: String,
    pub spec: Value,
}

impl Resource {
    pub fn new(kind: ResourceKind, name: impl Into<String>, spec: Value) -> Self {
        Self {
            kind,
            name: name.into(),
            spec,
        }
    }
}

/// What a reconcile actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
    Unchanged,
}

impl Applied {
    pub fn label(&self) -> &'static str {
        match self {
            Applied::Created => "created",
            Applied::Updated => "updated",
            Applied::Unchanged => "unchanged",
        }
    }
}

/// Declarative object store on the deployment target.
///
/// Backends implement the three primitive verbs; `reconcile` composes them
/// so repeated applies of the same desired state converge without error.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Resource, ResourceError>;

    async fn create(&self, resource: &Resource) -> Result<(), ResourceError>;

    async fn update(&self, resource: &Resource) -> Result<(), ResourceError>;

    /// Bring the stored object to the desired state, whatever it is now.
    async fn reconcile(&self, desired: &Resource) -> Result<Applied, ResourceError> {
        match self.get(desired.kind, &desired.name).await {
            Ok(current) => {
                if current.spec == desired.spec {
                    debug!("{} '{}' already up to date", desired.kind, desired.name);
                    Ok(Applied::Unchanged)
                } else {
                    self.update(desired).await?;
                    info!("Updated {} '{}'", desired.kind, desired.name);
                    Ok(Applied::Updated)
                }
            }
            Err(ResourceError::NotFound { .. }) => {
                self.create(desired).await?;
                info!("Created {} '{}'", desired.kind, desired.name);
                Ok(Applied::Created)
            }
            Err(e) => Err(e),
        }
    }
}

/// In-memory resource store for tests and dry runs.
#[derive(Default)]
pub struct InMemoryResourceStore {
    objects: RwLock<HashMap<(ResourceKind, String), Resource>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects, across all kinds.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Resource, ResourceError> {
        self.objects
            .read()
            .await
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| ResourceError::NotFound {
                kind,
                name: name.to_string(),
            })
    }

    async fn create(&self, resource: &Resource) -> Result<(), ResourceError> {
        let mut objects = self.objects.write().await;
        let key = (resource.kind, resource.name.clone());
        if objects.contains_key(&key) {
            return Err(ResourceError::Conflict {
                kind: resource.kind,
                name: resource.name.clone(),
            });
        }
        objects.insert(key, resource.clone());
        Ok(())
    }

    async fn update(&self, resource: &Resource) -> Result<(), ResourceError> {
        let mut objects = self.objects.write().await;
        let key = (resource.kind, resource.name.clone());
        if !objects.contains_key(&key) {
            return Err(ResourceError::NotFound {
                kind: resource.kind,
                name: resource.name.clone(),
            });
        }
        objects.insert(key, resource.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment(image: &str) -> Resource {
        Resource::new(
            ResourceKind::Deployment,
            "site",
            json!({ "image": image, "replicas": 2 }),
        )
    }

    #[tokio::test]
    async fn test_reconcile_creates_when_absent() {
        let store = InMemoryResourceStore::new();
        let applied = store.reconcile(&deployment("site:v1")).await.unwrap();
        assert_eq!(applied, Applied::Created);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_reconcile_updates_when_spec_differs() {
        let store = InMemoryResourceStore::new();
        store.reconcile(&deployment("site:v1")).await.unwrap();

        let applied = store.reconcile(&deployment("site:v2")).await.unwrap();
        assert_eq!(applied, Applied::Updated);

        let current = store
            .get(ResourceKind::Deployment, "site")
            .await
            .unwrap();
        assert_eq!(current.spec["image"], "site:v2");
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = InMemoryResourceStore::new();
        store.reconcile(&deployment("site:v1")).await.unwrap();

        let applied = store.reconcile(&deployment("site:v1")).await.unwrap();
        assert_eq!(applied, Applied::Unchanged);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_conflict_and_update_missing() {
        let store = InMemoryResourceStore::new();
        store.create(&deployment("site:v1")).await.unwrap();

        let err = store.create(&deployment("site:v1")).await.unwrap_err();
        assert!(matches!(err, ResourceError::Conflict { .. }));

        let missing = Resource::new(ResourceKind::Service, "site", json!({}));
        let err = store.update(&missing).await.unwrap_err();
        assert!(matches!(err, ResourceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_same_name_different_kinds_are_distinct() {
        let store = InMemoryResourceStore::new();
        store
            .create(&Resource::new(ResourceKind::Deployment, "site", json!({"a": 1})))
            .await
            .unwrap();
        store
            .create(&Resource::new(ResourceKind::Service, "site", json!({"b": 2})))
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);
    }
}
