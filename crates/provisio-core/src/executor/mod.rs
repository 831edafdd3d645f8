//! Executor module
//!
//! The executor runs a plan's steps to completion while respecting
//! `depends_on` edges: dependency-satisfied steps execute concurrently as one
//! wave, and the whole plan stops at the first step failure. Results are
//! appended in wave order, and within a wave in the ready-list input order.

mod handlers;

pub use handlers::{ALLOWED_COMPONENTS, ALLOWED_PROVIDERS};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::store::LogStore;
use crate::types::{
    ExecutionArtifact, ExecutionError, ExecutionResult, ExecutionStatus, Plan, PlanStep,
    StepStatus,
};
use handlers::{HandlerOutput, StepLogger};

/// Executor errors
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Step '{0}' has no rollback action")]
    MissingRollbackAction(String),
}

/// The executor - dependency-aware step scheduler
pub struct Executor {
    log_store: Arc<LogStore>,
    /// Optional cap on steps launched per wave
    max_parallel: Option<usize>,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            log_store: Arc::new(LogStore::new()),
            max_parallel: None,
        }
    }

    /// Share an externally owned log store
    pub fn with_log_store(mut self, log_store: Arc<LogStore>) -> Self {
        self.log_store = log_store;
        self
    }

    /// Cap the number of steps launched per wave
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel.max(1));
        self
    }

    pub fn log_store(&self) -> Arc<LogStore> {
        self.log_store.clone()
    }

    /// Execute a plan to completion, fail-fast on the first step failure.
    ///
    /// Steps already marked completed are skipped and count as satisfied
    /// dependencies, so a resumed plan continues where it left off. When no
    /// step is ready but unexecuted steps remain (dependency cycle, or
    /// dependents of a previously failed step), the error is logged and the
    /// results accumulated so far are returned.
    pub async fn execute_plan(
        &self,
        plan: &mut Plan,
        cancel: &CancellationToken,
    ) -> Vec<ExecutionResult> {
        let mut results: Vec<ExecutionResult> = Vec::new();
        let mut executed: HashSet<String> = plan
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.id.clone())
            .collect();

        loop {
            if cancel.is_cancelled() {
                tracing::warn!(
                    plan_id = %plan.id,
                    "plan execution cancelled, stopping before next wave"
                );
                return results;
            }

            let ready: Vec<String> = plan
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::Pending)
                .filter(|s| s.depends_on.iter().all(|dep| executed.contains(dep)))
                .map(|s| s.id.clone())
                .collect();

            if ready.is_empty() {
                let remaining = plan
                    .steps
                    .iter()
                    .filter(|s| s.status == StepStatus::Pending)
                    .count();
                if remaining > 0 {
                    tracing::error!(
                        plan_id = %plan.id,
                        remaining,
                        "no executable steps remain, unresolved dependencies (cycle or failed dependency)"
                    );
                }
                return results;
            }

            let wave: Vec<String> = match self.max_parallel {
                Some(limit) => ready.into_iter().take(limit).collect(),
                None => ready,
            };

            let mut wave_steps: Vec<PlanStep> = wave
                .iter()
                .filter_map(|id| plan.get_step(id).cloned())
                .collect();
            let plan_id = plan.id.clone();
            let outcomes = join_all(wave_steps.iter_mut().map(|step| {
                let plan_id = plan_id.clone();
                async move { self.execute_step(&plan_id, step).await }
            }))
            .await;

            for (step, result) in wave_steps.into_iter().zip(outcomes) {
                let step_id = step.id.clone();
                let failed = result.is_failure();
                if let Some(slot) = plan.get_step_mut(&step_id) {
                    *slot = step;
                }
                results.push(result);
                if failed {
                    tracing::warn!(
                        plan_id = %plan.id,
                        step_id = %step_id,
                        "step failed, abandoning remaining plan steps"
                    );
                    return results;
                }
                executed.insert(step_id);
            }
        }
    }

    /// Execute one step, recording timing on the step itself and returning
    /// the execution record. Handler errors become failing results, never
    /// panics across wave siblings.
    pub async fn execute_step(&self, plan_id: &str, step: &mut PlanStep) -> ExecutionResult {
        let execution_id = Uuid::new_v4().to_string();
        step.start();

        tracing::info!(
            plan_id = %plan_id,
            step_id = %step.id,
            action = %step.action,
            "step execution started"
        );
        let logger = StepLogger::new(self.log_store.clone(), execution_id.clone());
        logger
            .info(format!("step {} started: {}", step.id, step.action))
            .await;

        match handlers::run(step.action, &step.parameters, &logger).await {
            Ok(HandlerOutput { outputs, artifacts }) => {
                step.finish(StepStatus::Completed);
                logger.info(format!("step {} completed", step.id)).await;
                tracing::info!(
                    plan_id = %plan_id,
                    step_id = %step.id,
                    action = %step.action,
                    "step execution completed"
                );
                self.build_result(
                    execution_id,
                    plan_id,
                    step,
                    ExecutionStatus::Success,
                    outputs,
                    artifacts,
                    None,
                )
                .await
            }
            Err(error) => {
                step.finish(StepStatus::Failed);
                logger
                    .error(format!("step {} failed: {}", step.id, error))
                    .await;
                tracing::error!(
                    plan_id = %plan_id,
                    step_id = %step.id,
                    action = %step.action,
                    error = %error,
                    "step execution failed"
                );
                self.build_result(
                    execution_id,
                    plan_id,
                    step,
                    ExecutionStatus::Failure,
                    HashMap::new(),
                    Vec::new(),
                    Some(error),
                )
                .await
            }
        }
    }

    /// Roll back a single step, independent of plan execution.
    ///
    /// Requires the step to declare a rollback action; the result is tagged
    /// with `plan_id = "rollback"`.
    pub async fn rollback_step(&self, step: &PlanStep) -> Result<ExecutionResult, ExecutorError> {
        let rollback_action = step
            .rollback_action
            .clone()
            .ok_or_else(|| ExecutorError::MissingRollbackAction(step.id.clone()))?;

        let execution_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        tracing::info!(
            step_id = %step.id,
            rollback_action = %rollback_action,
            "step rollback started"
        );
        let logger = StepLogger::new(self.log_store.clone(), execution_id.clone());
        logger
            .info(format!(
                "rolling back step {} via {}",
                step.id, rollback_action
            ))
            .await;

        let completed_at = Utc::now();
        let mut outputs = HashMap::new();
        outputs.insert("rolled_back".to_string(), json!(true));
        outputs.insert("rollback_action".to_string(), json!(rollback_action));
        outputs.insert("step_id".to_string(), json!(step.id));

        Ok(ExecutionResult {
            id: execution_id.clone(),
            plan_id: "rollback".to_string(),
            step_id: step.id.clone(),
            status: ExecutionStatus::Success,
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds().max(0) as u64,
            outputs,
            artifacts: Vec::new(),
            error: None,
            logs: self.log_store.logs(&execution_id).await,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_result(
        &self,
        execution_id: String,
        plan_id: &str,
        step: &PlanStep,
        status: ExecutionStatus,
        outputs: HashMap<String, serde_json::Value>,
        artifacts: Vec<ExecutionArtifact>,
        error: Option<ExecutionError>,
    ) -> ExecutionResult {
        let logs = self.log_store.logs(&execution_id).await;
        ExecutionResult {
            id: execution_id,
            plan_id: plan_id.to_string(),
            step_id: step.id.clone(),
            status,
            started_at: step.started_at.unwrap_or_else(Utc::now),
            completed_at: step.completed_at.unwrap_or_else(Utc::now),
            duration_ms: step.duration_ms.unwrap_or(0),
            outputs,
            artifacts,
            error,
            logs,
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepAction;
    use serde_json::Value;

    fn params(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn validate_step(id: &str, provider: &str) -> PlanStep {
        PlanStep::new(id, StepAction::ValidateRequirements).with_parameters(params(vec![
            ("provider", json!(provider)),
            ("components", json!(["vpc"])),
        ]))
    }

    #[test]
    fn test_linear_chain_executes_in_dependency_order() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let mut plan = Plan::new(vec![
                validate_step("s1", "aws"),
                PlanStep::new("s2", StepAction::GenerateComponent)
                    .with_parameters(params(vec![("component", json!("vpc"))]))
                    .with_depends_on(vec!["s1".to_string()]),
                PlanStep::new("s3", StepAction::PlanDeployment)
                    .with_parameters(params(vec![("components", json!(["vpc"]))]))
                    .with_depends_on(vec!["s2".to_string()]),
            ]);

            let results = executor
                .execute_plan(&mut plan, &CancellationToken::new())
                .await;

            let ids: Vec<&str> = results.iter().map(|r| r.step_id.as_str()).collect();
            assert_eq!(ids, vec!["s1", "s2", "s3"]);
            assert!(results.iter().all(|r| r.status == ExecutionStatus::Success));
            assert!(plan.steps.iter().all(|s| s.status == StepStatus::Completed));
            assert!(plan.steps.iter().all(|s| s.duration_ms.is_some()));
        });
    }

    #[test]
    fn test_wave_results_follow_input_order() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let mut plan = Plan::new(vec![
                validate_step("a", "aws"),
                validate_step("b", "aws"),
                validate_step("c", "aws"),
            ]);

            let results = executor
                .execute_plan(&mut plan, &CancellationToken::new())
                .await;

            let ids: Vec<&str> = results.iter().map(|r| r.step_id.as_str()).collect();
            assert_eq!(ids, vec!["a", "b", "c"]);
        });
    }

    #[test]
    fn test_fail_fast_stops_at_first_failing_step() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let mut plan = Plan::new(vec![
                validate_step("s1", "aws"),
                validate_step("s2", "digitalocean"),
                validate_step("s3", "aws"),
                validate_step("s4", "aws"),
                validate_step("s5", "aws"),
            ]);

            let results = executor
                .execute_plan(&mut plan, &CancellationToken::new())
                .await;

            assert_eq!(results.len(), 2);
            assert_eq!(results[0].step_id, "s1");
            assert_eq!(results[0].status, ExecutionStatus::Success);
            assert_eq!(results[1].step_id, "s2");
            assert_eq!(results[1].status, ExecutionStatus::Failure);
            let error = results[1].error.as_ref().expect("error recorded");
            assert_eq!(error.code, "invalid_provider");
        });
    }

    #[test]
    fn test_dependent_of_failed_step_never_executes() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let mut plan = Plan::new(vec![
                validate_step("a", "digitalocean"),
                validate_step("b", "aws").with_depends_on(vec!["a".to_string()]),
            ]);

            let results = executor
                .execute_plan(&mut plan, &CancellationToken::new())
                .await;

            assert_eq!(results.len(), 1);
            assert_eq!(results[0].step_id, "a");
            assert!(results[0].is_failure());
            assert_eq!(
                plan.get_step("b").map(|s| s.status),
                Some(StepStatus::Pending)
            );
        });
    }

    #[test]
    fn test_dependency_cycle_terminates_without_error() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let mut plan = Plan::new(vec![
                validate_step("s1", "aws").with_depends_on(vec!["s2".to_string()]),
                validate_step("s2", "aws").with_depends_on(vec!["s1".to_string()]),
            ]);

            let results = executor
                .execute_plan(&mut plan, &CancellationToken::new())
                .await;

            assert!(results.len() < plan.steps.len());
            assert!(results.is_empty());
        });
    }

    #[test]
    fn test_resume_skips_completed_steps() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let mut first = validate_step("s1", "aws");
            first.start();
            first.finish(StepStatus::Completed);
            let mut plan = Plan::new(vec![
                first,
                validate_step("s2", "aws").with_depends_on(vec!["s1".to_string()]),
            ]);

            let results = executor
                .execute_plan(&mut plan, &CancellationToken::new())
                .await;

            assert_eq!(results.len(), 1);
            assert_eq!(results[0].step_id, "s2");
            assert_eq!(results[0].status, ExecutionStatus::Success);
        });
    }

    #[test]
    fn test_cancelled_token_stops_scheduling() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let mut plan = Plan::new(vec![validate_step("s1", "aws")]);
            let token = CancellationToken::new();
            token.cancel();

            let results = executor.execute_plan(&mut plan, &token).await;

            assert!(results.is_empty());
            assert_eq!(
                plan.get_step("s1").map(|s| s.status),
                Some(StepStatus::Pending)
            );
        });
    }

    #[test]
    fn test_max_parallel_one_still_completes_all_steps() {
        tokio_test::block_on(async {
            let executor = Executor::new().with_max_parallel(1);
            let mut plan = Plan::new(vec![
                validate_step("s1", "aws"),
                validate_step("s2", "aws"),
                validate_step("s3", "aws"),
            ]);

            let results = executor
                .execute_plan(&mut plan, &CancellationToken::new())
                .await;

            assert_eq!(results.len(), 3);
            assert!(plan.steps.iter().all(|s| s.status == StepStatus::Completed));
        });
    }

    #[test]
    fn test_generate_component_produces_checksummed_artifact() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let mut step = PlanStep::new("gen", StepAction::GenerateComponent)
                .with_parameters(params(vec![
                    ("component", json!("vpc")),
                    ("provider", json!("aws")),
                    ("environment", json!("production")),
                ]));

            let result = executor.execute_step("plan-1", &mut step).await;

            assert_eq!(result.status, ExecutionStatus::Success);
            assert_eq!(result.artifacts.len(), 1);
            let artifact = &result.artifacts[0];
            assert_eq!(artifact.name, "vpc.tf");
            assert_eq!(artifact.checksum.len(), 64);
            assert!(artifact.size > 0);
            assert!(!result.logs.is_empty());
        });
    }

    #[test]
    fn test_generate_documentation_with_diagrams() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let mut step = PlanStep::new("docs", StepAction::GenerateDocumentation)
                .with_parameters(params(vec![
                    ("components", json!(["vpc", "eks"])),
                    ("include_diagrams", json!(true)),
                ]));

            let result = executor.execute_step("plan-1", &mut step).await;

            assert_eq!(result.artifacts.len(), 2);
            assert_eq!(result.artifacts[0].name, "README.md");
            assert_eq!(result.artifacts[1].name, "architecture.mmd");
            assert_eq!(result.outputs.get("documents_generated"), Some(&json!(2)));
        });
    }

    #[test]
    fn test_validate_requirements_rejects_empty_components() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let mut step = PlanStep::new("v", StepAction::ValidateRequirements)
                .with_parameters(params(vec![
                    ("provider", json!("aws")),
                    ("components", json!([])),
                ]));

            let result = executor.execute_step("plan-1", &mut step).await;

            assert!(result.is_failure());
            assert_eq!(
                result.error.as_ref().map(|e| e.code.as_str()),
                Some("no_components")
            );
        });
    }

    #[test]
    fn test_rollback_requires_rollback_action() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let step = PlanStep::new("apply", StepAction::ApplyDeployment);

            let err = executor.rollback_step(&step).await.unwrap_err();
            assert!(matches!(err, ExecutorError::MissingRollbackAction(_)));
        });
    }

    #[test]
    fn test_rollback_produces_tagged_result() {
        tokio_test::block_on(async {
            let executor = Executor::new();
            let step = PlanStep::new("apply", StepAction::ApplyDeployment)
                .with_rollback_action("destroy_deployment");

            let result = executor.rollback_step(&step).await.expect("rollback");

            assert_eq!(result.plan_id, "rollback");
            assert_eq!(result.step_id, "apply");
            assert_eq!(result.status, ExecutionStatus::Success);
            assert_eq!(result.outputs.get("rolled_back"), Some(&json!(true)));
        });
    }
}
