//! Store module
//!
//! Storage abstractions for the orchestration pipeline:
//! - TaskStore / PlanStore / EventStore: async persistence traits
//! - LogStore: per-execution-id append-only log buffer
//!
//! Note: in-memory implementations live in the provisio-stores crate.

mod log_store;

pub use log_store::LogStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AgentEvent, Plan, Task};

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Task persistence
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Save or overwrite a task
    async fn save(&self, task: &Task) -> Result<(), StoreError>;

    /// Load a task by id
    async fn load(&self, task_id: &str) -> Result<Option<Task>, StoreError>;

    /// List all stored tasks
    async fn list(&self) -> Result<Vec<Task>, StoreError>;
}

/// Plan persistence
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Save or overwrite a plan
    async fn save(&self, plan: &Plan) -> Result<(), StoreError>;

    /// Load a plan by id
    async fn load(&self, plan_id: &str) -> Result<Option<Plan>, StoreError>;
}

/// Agent event persistence
///
/// Implementations keep at most the most recent 1000 events across all tasks,
/// dropping the oldest on overflow.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append an event
    async fn append(&self, event: AgentEvent) -> Result<(), StoreError>;

    /// Events for one task, oldest first
    async fn events_for_task(&self, task_id: &str) -> Result<Vec<AgentEvent>, StoreError>;

    /// All retained events, newest first
    async fn all(&self) -> Result<Vec<AgentEvent>, StoreError>;
}
