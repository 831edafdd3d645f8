//! Agent event types
//!
//! Events are immutable records of things happening to a task, stored in a
//! ring buffer capped at the most recent 1000 events across all tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of events retained across all tasks
pub const EVENT_LOG_CAPACITY: usize = 1_000;

/// What happened to the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventType {
    TaskCreated,
    PlanGenerated,
    PlanApproved,
    ExecutionStarted,
    StepCompleted,
    VerificationCompleted,
    TaskCompleted,
    TaskFailed,
    TaskCancelled,
}

impl AgentEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentEventType::TaskCreated => "task_created",
            AgentEventType::PlanGenerated => "plan_generated",
            AgentEventType::PlanApproved => "plan_approved",
            AgentEventType::ExecutionStarted => "execution_started",
            AgentEventType::StepCompleted => "step_completed",
            AgentEventType::VerificationCompleted => "verification_completed",
            AgentEventType::TaskCompleted => "task_completed",
            AgentEventType::TaskFailed => "task_failed",
            AgentEventType::TaskCancelled => "task_cancelled",
        }
    }
}

/// An immutable record of something happening to a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    pub id: String,
    pub task_id: String,
    #[serde(rename = "type")]
    pub event_type: AgentEventType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl AgentEvent {
    pub fn new(task_id: impl Into<String>, event_type: AgentEventType) -> Self {
        Self {
            id: format!("event_{}", uuid::Uuid::new_v4().simple()),
            task_id: task_id.into(),
            event_type,
            timestamp: Utc::now(),
            user_id: None,
            data: Value::Null,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}
