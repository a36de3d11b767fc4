//! Run execution: scheduling, per-task execution, and the engine loop

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{
    CancellationHandle, EngineError, EventBus, EventHandler, ExecutionEngine, ExecutionEvent,
};
pub use executor::{TaskExecutor, TaskFailure, TaskSuccess};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
