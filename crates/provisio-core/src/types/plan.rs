//! Plan type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::step::PlanStep;

/// Plan-wide risk classification gating auto-approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Plan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    Approved,
    Completed,
}

/// An ordered, dependency-annotated set of steps produced for a task
///
/// A plan whose risk level is critical never auto-approves; it requires a
/// manual approval before execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub status: PlanStatus,
}

impl Plan {
    /// Create a new draft plan
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            id: format!("plan_{}", uuid::Uuid::new_v4().simple()),
            steps,
            requires_approval: false,
            approved_by: None,
            approved_at: None,
            risk_level: RiskLevel::default(),
            status: PlanStatus::Draft,
        }
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn with_requires_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = requires_approval;
        self
    }

    /// Record an approval
    pub fn approve(&mut self, approver: impl Into<String>) {
        self.approved_by = Some(approver.into());
        self.approved_at = Some(Utc::now());
        self.status = PlanStatus::Approved;
    }

    pub fn is_approved(&self) -> bool {
        self.approved_by.is_some()
    }

    pub fn get_step(&self, step_id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn get_step_mut(&mut self, step_id: &str) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|s| s.id == step_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::step::StepAction;

    #[test]
    fn test_approve_sets_fields() {
        let mut plan = Plan::new(vec![PlanStep::new("s1", StepAction::PlanDeployment)])
            .with_requires_approval(true)
            .with_risk_level(RiskLevel::High);
        assert!(!plan.is_approved());

        plan.approve("ops@example.com");
        assert!(plan.is_approved());
        assert_eq!(plan.approved_by.as_deref(), Some("ops@example.com"));
        assert!(plan.approved_at.is_some());
        assert_eq!(plan.status, PlanStatus::Approved);
    }

    #[test]
    fn test_get_step_by_id() {
        let plan = Plan::new(vec![
            PlanStep::new("s1", StepAction::ValidateRequirements),
            PlanStep::new("s2", StepAction::GenerateComponent),
        ]);
        assert!(plan.get_step("s2").is_some());
        assert!(plan.get_step("missing").is_none());
    }
}
