//! Run and task execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is currently executing
    Running,
    /// Every pipeline task succeeded
    Succeeded,
    /// At least one pipeline task failed or was skipped
    Failed,
    /// Run was cancelled before completion
    Cancelled,
}

/// State of a single pipeline task within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskState {
    /// Waiting for its run_after set to succeed
    Pending,
    /// Currently executing its steps
    Running { started_at: DateTime<Utc> },
    /// All steps completed
    Succeeded {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        /// A step reported a non-fatal drift condition
        degraded: bool,
    },
    /// A step failed; remaining steps did not run
    Failed {
        /// Which step raised the error
        step: String,
        /// Error taxonomy kind (fetch, workspace, resource, timeout, ...)
        error_kind: String,
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Never started because a dependency failed, was skipped, or the run was cancelled
    Skipped { reason: String },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded { .. } | TaskState::Failed { .. } | TaskState::Skipped { .. }
        )
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, TaskState::Succeeded { .. })
    }

    /// Short status label for reports and display
    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running { .. } => "running",
            TaskState::Succeeded { .. } => "succeeded",
            TaskState::Failed { .. } => "failed",
            TaskState::Skipped { .. } => "skipped",
        }
    }
}

/// Overall run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current status
    pub status: RunStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// Whether any step reported a degraded (non-fatal) condition
    pub degraded: bool,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            degraded: false,
        }
    }

    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn succeed(&mut self) {
        self.status = RunStatus::Succeeded;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = RunStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Final report for one run: every task's terminal status plus, for
/// failures, the originating error kind and message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub degraded: bool,
    pub tasks: Vec<TaskReport>,
}

/// Terminal status of one pipeline task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl RunReport {
    /// Exit signaling: non-zero iff the run did not succeed.
    pub fn failed(&self) -> bool {
        self.status != RunStatus::Succeeded
    }

    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.name == name)
    }
}
