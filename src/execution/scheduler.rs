//! Scheduler - picks the next batch of pipeline tasks to run

use crate::core::pipeline::Pipeline;
use crate::core::run::Run;

/// Strategy for scheduling ready tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// One task at a time, in topological order
    Sequential,

    /// Every ready task at once
    Parallel,

    /// At most N tasks at once
    LimitedParallel(usize),
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::Parallel
    }
}

impl std::str::FromStr for SchedulingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(SchedulingStrategy::Sequential),
            "parallel" => Ok(SchedulingStrategy::Parallel),
            other => match other.strip_prefix("limited:").and_then(|n| n.parse().ok()) {
                Some(n) if n > 0 => Ok(SchedulingStrategy::LimitedParallel(n)),
                _ => Err(format!(
                    "unknown strategy '{}' (expected sequential, parallel, or limited:N)",
                    other
                )),
            },
        }
    }
}

/// Picks which ready tasks execute in the next batch
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    /// The next batch: ready tasks in deterministic topological order,
    /// truncated per strategy.
    pub fn next_tasks(&self, run: &Run, pipeline: &Pipeline) -> Vec<String> {
        let mut ready = run.ready_tasks(pipeline);
        match self.strategy {
            SchedulingStrategy::Sequential => ready.truncate(1),
            SchedulingStrategy::Parallel => {}
            SchedulingStrategy::LimitedParallel(max) => ready.truncate(max),
        }
        ready
    }
}
