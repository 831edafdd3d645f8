//! Orchestrator - task lifecycle state machine and workflow coordinator
//!
//! Drives the full pipeline for a task: plan → pre-execution safety gate →
//! approval gate → execute → verify → post-execution review → finalize.
//! Every stage failure is handled exactly once at the top level, so the task
//! always ends up queryable with its errors and a full event trail.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use provisio_core::executor::Executor;
use provisio_core::planner::{PlanError, Planner};
use provisio_core::safety::{PostExecutionReview, SafetyError, SafetyManager};
use provisio_core::store::{EventStore, PlanStore, StoreError, TaskStore};
use provisio_core::types::{
    AgentEvent, AgentEventType, ExecutionResult, Plan, PlanStatus, RiskLevel, Task, TaskRequest,
    TaskStatus, TaskType, VerificationResult,
};
use provisio_core::verifier::Verifier;

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("task has no plan: {0}")]
    MissingPlan(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("plan {0} requires manual approval")]
    ApprovalRequired(String),

    #[error("pre-execution safety checks failed: {}", .blockers.join("; "))]
    SafetyBlocked { blockers: Vec<String> },

    #[error("plan execution failed: {}", .errors.join("; "))]
    ExecutionFailed { errors: Vec<String> },

    #[error("planner error: {0}")]
    Planner(#[from] PlanError),

    #[error("safety error: {0}")]
    Safety(#[from] SafetyError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Everything a completed `execute_task` hands back to the caller
#[derive(Debug)]
pub struct TaskRun {
    pub task: Task,
    pub plan: Plan,
    pub execution_results: Vec<ExecutionResult>,
    pub verification_result: VerificationResult,
}

/// Outcome of `resume_task`
#[derive(Debug)]
pub struct TaskResume {
    pub task: Task,
    pub execution_results: Vec<ExecutionResult>,
}

/// Filters for `list_tasks`
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub user_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    fn matches(&self, task: &Task) -> bool {
        self.user_id
            .as_ref()
            .map(|u| &task.user_id == u)
            .unwrap_or(true)
            && self.status.map(|s| task.status == s).unwrap_or(true)
            && self
                .task_type
                .map(|t| task.task_type == t)
                .unwrap_or(true)
    }
}

/// Aggregate statistics over all stored tasks
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_tasks: usize,
    pub by_status: HashMap<String, usize>,
    pub by_type: HashMap<String, usize>,
    /// Average wall-clock duration over tasks that finished
    pub average_duration_ms: f64,
    /// successful / finished * 100
    pub success_rate: f64,
}

/// Orchestrator - wires planner + safety + executor + verifier + stores
pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    safety: Arc<dyn SafetyManager>,
    executor: Executor,
    verifier: Verifier,
    task_store: Arc<dyn TaskStore>,
    plan_store: Arc<dyn PlanStore>,
    event_store: Arc<dyn EventStore>,
    /// Live cancellation tokens per executing task
    cancel_tokens: Mutex<HashMap<String, CancellationToken>>,
    /// Concurrent execute/resume on one task id is rejected, not queued
    in_flight: Mutex<HashSet<String>>,
}

impl Orchestrator {
    pub fn new(
        planner: Arc<dyn Planner>,
        safety: Arc<dyn SafetyManager>,
        executor: Executor,
        verifier: Verifier,
        task_store: Arc<dyn TaskStore>,
        plan_store: Arc<dyn PlanStore>,
        event_store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            planner,
            safety,
            executor,
            verifier,
            task_store,
            plan_store,
            event_store,
            cancel_tokens: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Construct an orchestrator backed by in-memory stores
    pub fn in_memory(planner: Arc<dyn Planner>, safety: Arc<dyn SafetyManager>) -> Self {
        Self::new(
            planner,
            safety,
            Executor::new(),
            Verifier::new(),
            Arc::new(provisio_stores::InMemoryTaskStore::new()),
            Arc::new(provisio_stores::InMemoryPlanStore::new()),
            Arc::new(provisio_stores::InMemoryEventStore::new()),
        )
    }

    /// Create and store a new pending task
    pub async fn create_task(&self, request: TaskRequest) -> Result<Task, OrchestratorError> {
        let task = Task::new(request);
        self.task_store.save(&task).await?;
        tracing::info!(
            task_id = %task.id,
            task_type = %task.task_type.as_str(),
            priority = %task.priority.as_str(),
            "task created"
        );
        self.emit(
            AgentEvent::new(task.id.as_str(), AgentEventType::TaskCreated)
                .with_user(task.user_id.as_str())
                .with_data(json!({
                    "task_type": task.task_type.as_str(),
                    "priority": task.priority.as_str(),
                })),
        )
        .await;
        Ok(task)
    }

    /// Run the full workflow for a task.
    ///
    /// Any stage failure is recorded onto the task (status, errors, event)
    /// and returned to the caller, except a pending manual approval which
    /// leaves the task pending.
    pub async fn execute_task(&self, task_id: &str) -> Result<TaskRun, OrchestratorError> {
        let mut task = self.load_task(task_id).await?;
        self.begin_operation(task_id).await?;
        let outcome = self.run_workflow(&mut task).await;
        self.end_operation(task_id).await;
        match outcome {
            Ok(run) => Ok(run),
            Err(error) => Err(self.finalize_failure(&mut task, error, false).await),
        }
    }

    /// Re-run a task's stored plan, skipping steps that already completed.
    pub async fn resume_task(&self, task_id: &str) -> Result<TaskResume, OrchestratorError> {
        let mut task = self.load_task(task_id).await?;
        let plan_id = task
            .execution
            .plan_id
            .clone()
            .ok_or_else(|| OrchestratorError::MissingPlan(task_id.to_string()))?;
        self.begin_operation(task_id).await?;
        let outcome = self.run_resume(&mut task, &plan_id).await;
        self.end_operation(task_id).await;
        match outcome {
            Ok(resume) => Ok(resume),
            Err(error) => Err(self.finalize_failure(&mut task, error, true).await),
        }
    }

    /// Cancel a task that has not yet reached a terminal status.
    ///
    /// Cancelled counts as terminal here too, so re-cancelling is an
    /// invalid-state error. An in-flight execution stops scheduling further
    /// waves via its cancellation token.
    pub async fn cancel_task(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        let mut task = self.load_task(task_id).await?;
        if task.status.is_terminal() || task.status == TaskStatus::Cancelled {
            return Err(OrchestratorError::InvalidState(format!(
                "task {} cannot be cancelled in status {}",
                task.id, task.status
            )));
        }

        task.cancel();
        self.task_store.save(&task).await?;
        if let Some(token) = self.cancel_tokens.lock().await.get(task_id) {
            token.cancel();
        }
        tracing::info!(task_id = %task.id, "task cancelled");
        self.emit(AgentEvent::new(task.id.as_str(), AgentEventType::TaskCancelled))
            .await;
        Ok(task)
    }

    /// Manually approve a task's stored plan so execution can be re-invoked.
    pub async fn approve_plan(
        &self,
        task_id: &str,
        approver: &str,
    ) -> Result<Plan, OrchestratorError> {
        let task = self.load_task(task_id).await?;
        let plan_id = task
            .execution
            .plan_id
            .clone()
            .ok_or_else(|| OrchestratorError::MissingPlan(task_id.to_string()))?;
        let mut plan = self
            .plan_store
            .load(&plan_id)
            .await?
            .ok_or_else(|| OrchestratorError::PlanNotFound(plan_id.clone()))?;
        if plan.is_approved() {
            return Err(OrchestratorError::InvalidState(format!(
                "plan {} is already approved",
                plan.id
            )));
        }

        plan.approve(approver);
        self.plan_store.save(&plan).await?;
        self.emit(
            AgentEvent::new(task.id.as_str(), AgentEventType::PlanApproved)
                .with_user(approver)
                .with_data(json!({ "plan_id": plan.id, "approved_by": approver })),
        )
        .await;
        Ok(plan)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        self.load_task(task_id).await
    }

    pub async fn get_plan(&self, plan_id: &str) -> Result<Plan, OrchestratorError> {
        self.plan_store
            .load(plan_id)
            .await?
            .ok_or_else(|| OrchestratorError::PlanNotFound(plan_id.to_string()))
    }

    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, OrchestratorError> {
        let mut tasks = self.task_store.list().await?;
        tasks.retain(|task| filter.matches(task));
        Ok(tasks)
    }

    /// A task's event trail, oldest first
    pub async fn task_events(&self, task_id: &str) -> Result<Vec<AgentEvent>, OrchestratorError> {
        Ok(self.event_store.events_for_task(task_id).await?)
    }

    /// All retained events, newest first
    pub async fn all_events(&self) -> Result<Vec<AgentEvent>, OrchestratorError> {
        Ok(self.event_store.all().await?)
    }

    /// Aggregate statistics over all stored tasks
    pub async fn statistics(&self) -> Result<Statistics, OrchestratorError> {
        let tasks = self.task_store.list().await?;
        let mut by_status: HashMap<String, usize> = HashMap::new();
        let mut by_type: HashMap<String, usize> = HashMap::new();
        let mut total_duration: i64 = 0;
        let mut finished = 0usize;
        let mut successful = 0usize;

        for task in &tasks {
            *by_status.entry(task.status.as_str().to_string()).or_insert(0) += 1;
            *by_type
                .entry(task.task_type.as_str().to_string())
                .or_insert(0) += 1;
            if let Some(duration) = task.duration_ms() {
                total_duration += duration;
                finished += 1;
            }
            if task.status == TaskStatus::Completed {
                successful += 1;
            }
        }

        let average_duration_ms = if finished > 0 {
            total_duration as f64 / finished as f64
        } else {
            0.0
        };
        let success_rate = if finished > 0 {
            successful as f64 / finished as f64 * 100.0
        } else {
            0.0
        };

        Ok(Statistics {
            total_tasks: tasks.len(),
            by_status,
            by_type,
            average_duration_ms,
            success_rate,
        })
    }

    async fn run_workflow(&self, task: &mut Task) -> Result<TaskRun, OrchestratorError> {
        // Plan. A plan stored by a previous invocation (e.g. awaiting manual
        // approval) is reused instead of regenerated.
        task.set_status(TaskStatus::Planning);
        self.task_store.save(task).await?;
        let stored_plan = match task.execution.plan_id.clone() {
            Some(plan_id) => self.plan_store.load(&plan_id).await?,
            None => None,
        };
        let mut plan = match stored_plan {
            Some(plan) => plan,
            None => self.generate_plan(task).await?,
        };

        // Pre-execution safety gate, a blocker is a hard stop.
        let report = self.safety.run_pre_execution_checks(task, &plan).await?;
        if !report.passed {
            return Err(OrchestratorError::SafetyBlocked {
                blockers: report.blocker_messages(),
            });
        }

        // Approval gate: anything below critical risk is system-approved.
        if plan.requires_approval && !plan.is_approved() {
            if plan.risk_level == RiskLevel::Critical {
                return Err(OrchestratorError::ApprovalRequired(plan.id.clone()));
            }
            plan.approve("system");
            self.plan_store.save(&plan).await?;
            self.emit(
                AgentEvent::new(task.id.as_str(), AgentEventType::PlanApproved)
                    .with_data(json!({ "plan_id": plan.id, "approved_by": "system" })),
            )
            .await;
        }

        // Execute.
        let results = self.run_execution(task, &mut plan, false).await?;

        // Verify. A failed verification is data, not an error.
        task.set_status(TaskStatus::Verifying);
        self.task_store.save(task).await?;
        let execution_id = task.execution.execution_id.clone().unwrap_or_default();
        let verification = self
            .verifier
            .verify_execution(&execution_id, &results, &task.context)
            .await;
        task.execution.verification_id = Some(verification.id.clone());
        self.task_store.save(task).await?;
        self.emit(
            AgentEvent::new(task.id.as_str(), AgentEventType::VerificationCompleted).with_data(
                json!({
                    "verification_id": verification.id,
                    "status": verification.status.as_str(),
                    "passed": verification.summary.passed,
                    "failed": verification.summary.failed,
                    "warnings": verification.summary.warnings,
                }),
            ),
        )
        .await;

        // Post-execution review is informational; failures surface through
        // the safety manager's own error contract.
        {
            let review = PostExecutionReview {
                task: &*task,
                plan: &plan,
                execution_results: &results,
                verification_result: Some(&verification),
            };
            self.safety.run_post_execution_checks(&review).await?;
        }

        self.finalize_success(task, &mut plan, &results, Some(&verification), false)
            .await?;

        Ok(TaskRun {
            task: task.clone(),
            plan,
            execution_results: results,
            verification_result: verification,
        })
    }

    async fn run_resume(
        &self,
        task: &mut Task,
        plan_id: &str,
    ) -> Result<TaskResume, OrchestratorError> {
        let mut plan = self
            .plan_store
            .load(plan_id)
            .await?
            .ok_or_else(|| OrchestratorError::PlanNotFound(plan_id.to_string()))?;

        let results = self.run_execution(task, &mut plan, true).await?;
        self.finalize_success(task, &mut plan, &results, None, true)
            .await?;

        Ok(TaskResume {
            task: task.clone(),
            execution_results: results,
        })
    }

    async fn generate_plan(&self, task: &mut Task) -> Result<Plan, OrchestratorError> {
        let plan = self.planner.generate_plan(task).await?;
        self.plan_store.save(&plan).await?;
        task.execution.plan_id = Some(plan.id.clone());
        self.task_store.save(task).await?;
        tracing::info!(
            task_id = %task.id,
            plan_id = %plan.id,
            steps = plan.steps.len(),
            risk_level = %plan.risk_level.as_str(),
            "plan generated"
        );
        self.emit(
            AgentEvent::new(task.id.as_str(), AgentEventType::PlanGenerated).with_data(json!({
                "plan_id": plan.id,
                "step_count": plan.steps.len(),
                "risk_level": plan.risk_level.as_str(),
            })),
        )
        .await;
        Ok(plan)
    }

    async fn run_execution(
        &self,
        task: &mut Task,
        plan: &mut Plan,
        resumed: bool,
    ) -> Result<Vec<ExecutionResult>, OrchestratorError> {
        task.set_status(TaskStatus::Executing);
        let execution_id = Uuid::new_v4().to_string();
        task.execution.execution_id = Some(execution_id.clone());
        self.task_store.save(task).await?;
        self.emit(
            AgentEvent::new(task.id.as_str(), AgentEventType::ExecutionStarted).with_data(json!({
                "plan_id": plan.id,
                "execution_id": execution_id,
                "resumed": resumed,
            })),
        )
        .await;

        let token = self.register_cancel_token(&task.id).await;
        let results = self.executor.execute_plan(plan, &token).await;
        self.release_cancel_token(&task.id).await;
        // Step statuses persist with the plan so a resumed run can skip them.
        self.plan_store.save(plan).await?;

        for result in &results {
            self.emit(
                AgentEvent::new(task.id.as_str(), AgentEventType::StepCompleted).with_data(
                    json!({
                        "step_id": result.step_id,
                        "status": result.status.as_str(),
                        "duration_ms": result.duration_ms,
                    }),
                ),
            )
            .await;
        }

        let errors: Vec<String> = results
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| {
                r.error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| format!("step {} failed", r.step_id))
            })
            .collect();
        if !errors.is_empty() {
            return Err(OrchestratorError::ExecutionFailed { errors });
        }
        Ok(results)
    }

    async fn finalize_success(
        &self,
        task: &mut Task,
        plan: &mut Plan,
        results: &[ExecutionResult],
        verification: Option<&VerificationResult>,
        resumed: bool,
    ) -> Result<(), OrchestratorError> {
        for result in results {
            for (key, value) in &result.outputs {
                task.result.outputs.insert(key.clone(), value.clone());
            }
            for artifact in &result.artifacts {
                task.result.artifacts.push(artifact.name.clone());
            }
        }
        task.complete();
        plan.status = PlanStatus::Completed;
        self.plan_store.save(plan).await?;
        self.task_store.save(task).await?;
        tracing::info!(task_id = %task.id, "task completed");
        self.emit(
            AgentEvent::new(task.id.as_str(), AgentEventType::TaskCompleted).with_data(json!({
                "duration_ms": task.duration_ms(),
                "verification_status": verification.map(|v| v.status.as_str()),
                "resumed": resumed,
            })),
        )
        .await;
        Ok(())
    }

    /// The single top-level failure handler. Returns the original error after
    /// recording it, so callers observe both the updated task state and an
    /// explicit failure signal.
    async fn finalize_failure(
        &self,
        task: &mut Task,
        error: OrchestratorError,
        resumed: bool,
    ) -> OrchestratorError {
        if matches!(error, OrchestratorError::ApprovalRequired(_)) {
            // Manual approval keeps the task pending; nothing failed.
            task.set_status(TaskStatus::Pending);
            if let Err(save_err) = self.task_store.save(task).await {
                tracing::error!(task_id = %task.id, error = %save_err, "failed to persist pending task");
            }
            return error;
        }

        let errors = match &error {
            OrchestratorError::SafetyBlocked { blockers } => blockers.clone(),
            OrchestratorError::ExecutionFailed { errors } => errors.clone(),
            other => vec![other.to_string()],
        };
        task.fail(errors.clone());
        if let Err(save_err) = self.task_store.save(task).await {
            tracing::error!(task_id = %task.id, error = %save_err, "failed to persist failed task");
        }
        tracing::error!(task_id = %task.id, error = %error, "task failed");
        self.emit(
            AgentEvent::new(task.id.as_str(), AgentEventType::TaskFailed)
                .with_data(json!({ "errors": errors, "resumed": resumed })),
        )
        .await;
        error
    }

    async fn load_task(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        self.task_store
            .load(task_id)
            .await?
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))
    }

    async fn begin_operation(&self, task_id: &str) -> Result<(), OrchestratorError> {
        let mut in_flight = self.in_flight.lock().await;
        if !in_flight.insert(task_id.to_string()) {
            return Err(OrchestratorError::InvalidState(format!(
                "task {} already has an operation in flight",
                task_id
            )));
        }
        Ok(())
    }

    async fn end_operation(&self, task_id: &str) {
        self.in_flight.lock().await.remove(task_id);
    }

    async fn register_cancel_token(&self, task_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.cancel_tokens
            .lock()
            .await
            .insert(task_id.to_string(), token.clone());
        token
    }

    async fn release_cancel_token(&self, task_id: &str) {
        self.cancel_tokens.lock().await.remove(task_id);
    }

    /// Event emission never fails the workflow.
    async fn emit(&self, event: AgentEvent) {
        if let Err(error) = self.event_store.append(event).await {
            tracing::warn!(error = %error, "failed to append agent event");
        }
    }
}
