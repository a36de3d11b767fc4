//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::state::{RunReport, RunStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Terminal status
    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run completed (if it did)
    pub completed_at: Option<DateTime<Utc>>,

    /// Whether any step reported a degraded condition
    pub degraded: bool,

    /// Task counts by terminal state
    pub succeeded_tasks: usize,
    pub failed_tasks: usize,
    pub skipped_tasks: usize,
    pub total_tasks: usize,
}

impl RunSummary {
    pub fn from_report(report: &RunReport) -> Self {
        let count = |status: &str| {
            report
                .tasks
                .iter()
                .filter(|t| t.status == status)
                .count()
        };

        Self {
            run_id: report.run_id,
            pipeline_name: report.pipeline_name.clone(),
            status: report.status,
            started_at: report.started_at.unwrap_or_else(Utc::now),
            completed_at: report.completed_at,
            degraded: report.degraded,
            succeeded_tasks: count("succeeded"),
            failed_tasks: count("failed"),
            skipped_tasks: count("skipped"),
            total_tasks: report.tasks.len(),
        }
    }
}

/// Trait for run history backends
#[async_trait::async_trait]
pub trait RunHistory: Send + Sync {
    /// Save a run summary
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List runs for a pipeline, most recent first
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>>;

    /// List all pipeline names with recorded runs
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory history (for testing or --no-history runs)
pub struct InMemoryHistory {
    runs: tokio::sync::RwLock<std::collections::HashMap<Uuid, RunSummary>>,
    by_pipeline: tokio::sync::RwLock<std::collections::HashMap<String, Vec<Uuid>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(std::collections::HashMap::new()),
            by_pipeline: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RunHistory for InMemoryHistory {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.insert(run.run_id, run.clone());

        let mut by_pipeline = self.by_pipeline.write().await;
        by_pipeline
            .entry(run.pipeline_name.clone())
            .or_default()
            .push(run.run_id);

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_pipeline = self.by_pipeline.read().await;

        let mut result: Vec<RunSummary> = by_pipeline
            .get(pipeline_name)
            .into_iter()
            .flatten()
            .filter_map(|id| runs.get(id).cloned())
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let by_pipeline = self.by_pipeline.read().await;
        let mut names: Vec<String> = by_pipeline.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
