//! Task type definitions
//!
//! Task represents a unit of user-requested work with a status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Type alias for Task ID
pub type TaskId = String;

/// Kind of work the task requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Generate,
    Deploy,
    Verify,
    Rollback,
    Analyze,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Generate => "generate",
            TaskType::Deploy => "deploy",
            TaskType::Verify => "verify",
            TaskType::Rollback => "rollback",
            TaskType::Analyze => "analyze",
        }
    }
}

/// Task status state machine
///
/// `pending → planning → executing → verifying → completed`, with `failed`
/// reachable from planning/executing/verifying and `cancelled` reachable from
/// any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Planning,
    Executing,
    Verifying,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Planning => "planning",
            TaskStatus::Executing => "executing",
            TaskStatus::Verifying => "verifying",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and failed are terminal; cancelled additionally rejects
    /// further cancellation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

/// Target environment and component selection for a task
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskContext {
    /// Cloud provider, e.g. "aws"
    #[serde(default)]
    pub provider: String,
    /// Deployment environment, e.g. "production"
    #[serde(default)]
    pub environment: String,
    /// Provider region, e.g. "eu-west-1"
    #[serde(default)]
    pub region: String,
    /// Components to operate on, e.g. ["vpc", "eks"]
    #[serde(default)]
    pub components: Vec<String>,
    /// Free-form requirements read by the verifier (tags, security flags,
    /// budget_limit, ...)
    #[serde(default)]
    pub requirements: HashMap<String, Value>,
}

impl TaskContext {
    pub fn new(
        provider: impl Into<String>,
        environment: impl Into<String>,
        region: impl Into<String>,
        components: Vec<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            environment: environment.into(),
            region: region.into(),
            components,
            requirements: HashMap::new(),
        }
    }

    pub fn with_requirements(mut self, requirements: HashMap<String, Value>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn has_component(&self, component: &str) -> bool {
        self.components.iter().any(|c| c == component)
    }
}

/// References into the execution pipeline produced while a task runs
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionRefs {
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub verification_id: Option<String>,
}

/// Final outcome of a task
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskResult {
    #[serde(default)]
    pub success: bool,
    /// Merged step outputs, last write wins on key collisions
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
    /// Flattened artifact names from all steps
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Input for creating a new task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    pub user_id: String,
    pub context: TaskContext,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl TaskRequest {
    pub fn new(task_type: TaskType, user_id: impl Into<String>, context: TaskContext) -> Self {
        Self {
            task_type,
            priority: None,
            user_id: user_id.into(),
            context,
            metadata: HashMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Task - a unit of user-requested work
///
/// Owned exclusively by the orchestrator; mutated only through orchestration
/// methods, never externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly once, on terminal success or failure via the normal
    /// finalization path; never on cancellation.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub context: TaskContext,
    #[serde(default)]
    pub execution: ExecutionRefs,
    #[serde(default)]
    pub result: TaskResult,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Task {
    /// Create a new pending task from a request
    pub fn new(request: TaskRequest) -> Self {
        let now = Utc::now();
        Self {
            id: generate_task_id(),
            task_type: request.task_type,
            status: TaskStatus::Pending,
            priority: request.priority.unwrap_or_default(),
            user_id: request.user_id,
            created_at: now,
            updated_at: now,
            completed_at: None,
            context: request.context,
            execution: ExecutionRefs::default(),
            result: TaskResult::default(),
            metadata: request.metadata,
        }
    }

    /// Update the task status
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Transition to failed, recording the error messages
    pub fn fail(&mut self, errors: Vec<String>) {
        self.result.success = false;
        self.result.errors = errors;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        self.set_status(TaskStatus::Failed);
    }

    /// Transition to completed
    pub fn complete(&mut self) {
        self.result.success = true;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        self.set_status(TaskStatus::Completed);
    }

    /// Transition to cancelled; does not stamp `completed_at`
    pub fn cancel(&mut self) {
        self.set_status(TaskStatus::Cancelled);
    }

    /// Total wall-clock duration, available once the task finished
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.created_at).num_milliseconds())
    }
}

fn generate_task_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("task_{}_{}", millis, &random[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> TaskRequest {
        TaskRequest::new(
            TaskType::Deploy,
            "user-1",
            TaskContext::new("aws", "staging", "eu-west-1", vec!["vpc".to_string()]),
        )
    }

    #[test]
    fn test_new_task_defaults() {
        let task = Task::new(sample_request());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.id.starts_with("task_"));
        assert!(task.completed_at.is_none());
        assert!(task.result.outputs.is_empty());
    }

    #[test]
    fn test_completed_at_is_stamped_once() {
        let mut task = Task::new(sample_request());
        task.complete();
        let first = task.completed_at;
        assert!(first.is_some());

        task.complete();
        assert_eq!(task.completed_at, first);
    }

    #[test]
    fn test_cancel_does_not_stamp_completed_at() {
        let mut task = Task::new(sample_request());
        task.cancel();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_fail_records_errors() {
        let mut task = Task::new(sample_request());
        task.fail(vec!["boom".to_string()]);
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(!task.result.success);
        assert_eq!(task.result.errors, vec!["boom".to_string()]);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Executing.is_terminal());
    }
}
