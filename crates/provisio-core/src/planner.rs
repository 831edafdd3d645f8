//! Planner contract
//!
//! The planner turns a task into a concrete plan. Its generation strategy is
//! an external concern; the orchestrator only consumes this trait. Returned
//! steps must form a DAG over `depends_on`.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Plan, Task};

/// Planner errors
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to generate plan: {0}")]
    Generation(String),

    #[error("Unsupported task type: {0}")]
    UnsupportedTaskType(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Planner trait - generates execution plans from tasks
#[async_trait]
pub trait Planner: Send + Sync {
    /// Generate a plan for the given task
    async fn generate_plan(&self, task: &Task) -> Result<Plan, PlanError>;
}
