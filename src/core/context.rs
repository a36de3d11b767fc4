//! Execution contexts - the explicit handle threaded run -> task -> step
//!
//! Collaborators are never ambient. The engine builds one `RunContext` per
//! run and derives a narrowed `StepContext` per task, so a step can only
//! reach the workspaces its task declared.

use crate::core::pipeline::PipelineTask;
use crate::core::task::BoundTask;
use crate::remote::{ResourceStore, SourceFetcher};
use crate::workspace::Workspace;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Everything one run needs to touch the outside world
#[derive(Clone)]
pub struct RunContext {
    run_id: Uuid,
    /// Pipeline-level workspace name -> backing storage
    workspaces: HashMap<String, Arc<dyn Workspace>>,
    fetcher: Arc<dyn SourceFetcher>,
    store: Arc<dyn ResourceStore>,
}

impl RunContext {
    pub fn new(
        run_id: Uuid,
        fetcher: Arc<dyn SourceFetcher>,
        store: Arc<dyn ResourceStore>,
    ) -> Self {
        Self {
            run_id,
            workspaces: HashMap::new(),
            fetcher,
            store,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn add_workspace(&mut self, name: impl Into<String>, workspace: Arc<dyn Workspace>) {
        self.workspaces.insert(name.into(), workspace);
    }

    pub fn workspace(&self, name: &str) -> Option<Arc<dyn Workspace>> {
        self.workspaces.get(name).cloned()
    }

    pub fn workspaces(&self) -> impl Iterator<Item = (&String, &Arc<dyn Workspace>)> {
        self.workspaces.iter()
    }

    pub fn store(&self) -> Arc<dyn ResourceStore> {
        self.store.clone()
    }

    /// Narrow this context to one pipeline task: the task's local workspace
    /// names are bound to the pipeline workspaces the node mapped them to.
    pub fn step_context(&self, node: &PipelineTask, bound: &BoundTask) -> StepContext {
        let mut workspaces = Vec::new();
        for local in &bound.workspaces {
            let pipeline_name = node
                .workspaces
                .get(local)
                .cloned()
                .unwrap_or_else(|| local.clone());
            if let Some(workspace) = self.workspaces.get(&pipeline_name) {
                workspaces.push((local.clone(), workspace.clone()));
            }
        }

        StepContext {
            run_id: self.run_id,
            task_name: node.name.clone(),
            workspaces,
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
        }
    }
}

/// A single task's view of the run: its bound workspaces plus the shared
/// collaborators.
#[derive(Clone)]
pub struct StepContext {
    run_id: Uuid,
    task_name: String,
    /// Task-local workspace name -> backing storage, in declaration order
    workspaces: Vec<(String, Arc<dyn Workspace>)>,
    fetcher: Arc<dyn SourceFetcher>,
    store: Arc<dyn ResourceStore>,
}

impl StepContext {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn workspace(&self, name: &str) -> Option<Arc<dyn Workspace>> {
        self.workspaces
            .iter()
            .find(|(local, _)| local == name)
            .map(|(_, ws)| ws.clone())
    }

    /// The task's first declared workspace.
    pub fn primary_workspace(&self) -> Option<Arc<dyn Workspace>> {
        self.workspaces.first().map(|(_, ws)| ws.clone())
    }

    pub fn fetcher(&self) -> Arc<dyn SourceFetcher> {
        self.fetcher.clone()
    }

    pub fn store(&self) -> Arc<dyn ResourceStore> {
        self.store.clone()
    }
}
