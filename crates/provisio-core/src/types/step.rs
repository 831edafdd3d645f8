//! Plan step type definitions
//!
//! PlanStep is the atomic unit of plan work. Actions form a closed enum so
//! new actions are a compile-time decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// The action a step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    ValidateRequirements,
    GenerateComponent,
    ValidateGeneratedCode,
    ApplyBestPractices,
    PlanDeployment,
    ApplyDeployment,
    VerifyDeployment,
    GenerateDocumentation,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::ValidateRequirements => "validate_requirements",
            StepAction::GenerateComponent => "generate_component",
            StepAction::ValidateGeneratedCode => "validate_generated_code",
            StepAction::ApplyBestPractices => "apply_best_practices",
            StepAction::PlanDeployment => "plan_deployment",
            StepAction::ApplyDeployment => "apply_deployment",
            StepAction::VerifyDeployment => "verify_deployment",
            StepAction::GenerateDocumentation => "generate_documentation",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// A single step in an execution plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique identifier within the plan
    pub id: String,
    pub action: StepAction,
    /// Action-specific parameters
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    /// IDs of steps this step depends on; must reference steps in the same plan
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub status: StepStatus,
    /// Timing is recorded on the step itself so a resumed execution can tell
    /// whether a step already ran.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Action to run when this step is rolled back
    #[serde(default)]
    pub rollback_action: Option<String>,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, action: StepAction) -> Self {
        Self {
            id: id.into(),
            action,
            parameters: HashMap::new(),
            depends_on: Vec::new(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            rollback_action: None,
        }
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_depends_on(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    pub fn with_rollback_action(mut self, rollback_action: impl Into<String>) -> Self {
        self.rollback_action = Some(rollback_action.into());
        self
    }

    /// Mark the step running and stamp its start time
    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark the step finished with the given terminal status
    pub fn finish(&mut self, status: StepStatus) {
        let completed = Utc::now();
        self.status = status;
        self.completed_at = Some(completed);
        if let Some(started) = self.started_at {
            self.duration_ms = Some((completed - started).num_milliseconds().max(0) as u64);
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, StepStatus::Completed | StepStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_timing_recorded_on_finish() {
        let mut step = PlanStep::new("s1", StepAction::ValidateRequirements);
        assert_eq!(step.status, StepStatus::Pending);

        step.start();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.started_at.is_some());

        step.finish(StepStatus::Completed);
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.completed_at.is_some());
        assert!(step.duration_ms.is_some());
        assert!(step.is_terminal());
    }

    #[test]
    fn test_action_labels_are_snake_case() {
        assert_eq!(StepAction::ValidateRequirements.as_str(), "validate_requirements");
        assert_eq!(StepAction::GenerateDocumentation.to_string(), "generate_documentation");
    }
}
