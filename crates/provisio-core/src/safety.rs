//! Safety manager contract
//!
//! Pre-execution checks gate whether a plan may run at all; a blocker is a
//! hard stop. Post-execution checks are informational and surface failures
//! through their own error contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ExecutionResult, Plan, Task, VerificationResult};

/// Safety manager errors
#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("Safety check failed: {0}")]
    CheckFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A pre-execution safety failure that prevents a plan from running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyBlocker {
    pub message: String,
}

impl SafetyBlocker {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of the pre-execution safety gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyReport {
    pub passed: bool,
    #[serde(default)]
    pub blockers: Vec<SafetyBlocker>,
}

impl SafetyReport {
    /// A passing report with no blockers
    pub fn passed() -> Self {
        Self {
            passed: true,
            blockers: Vec::new(),
        }
    }

    /// A blocked report carrying the blocker messages
    pub fn blocked(blockers: Vec<SafetyBlocker>) -> Self {
        Self {
            passed: false,
            blockers,
        }
    }

    pub fn blocker_messages(&self) -> Vec<String> {
        self.blockers.iter().map(|b| b.message.clone()).collect()
    }
}

/// Everything the post-execution review gets to look at
#[derive(Debug)]
pub struct PostExecutionReview<'a> {
    pub task: &'a Task,
    pub plan: &'a Plan,
    pub execution_results: &'a [ExecutionResult],
    pub verification_result: Option<&'a VerificationResult>,
}

/// SafetyManager trait - policy gates around plan execution
#[async_trait]
pub trait SafetyManager: Send + Sync {
    /// Run pre-execution checks; a non-passing report blocks execution
    async fn run_pre_execution_checks(
        &self,
        task: &Task,
        plan: &Plan,
    ) -> Result<SafetyReport, SafetyError>;

    /// Run post-execution checks; failures surface as `SafetyError`
    async fn run_post_execution_checks(
        &self,
        review: &PostExecutionReview<'_>,
    ) -> Result<(), SafetyError>;
}
