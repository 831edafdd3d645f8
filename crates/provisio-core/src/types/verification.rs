//! Verification record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Policy category of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    Security,
    Compliance,
    Functionality,
    Performance,
    Cost,
}

impl CheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Security => "security",
            CheckType::Compliance => "compliance",
            CheckType::Functionality => "functionality",
            CheckType::Performance => "performance",
            CheckType::Cost => "cost",
        }
    }
}

/// Verdict of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
}

/// One deterministic policy evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCheck {
    /// Stable check id, e.g. "sec_check_001"
    pub id: String,
    #[serde(rename = "type")]
    pub check_type: CheckType,
    pub name: String,
    pub description: String,
    pub status: CheckStatus,
    pub expected: Value,
    pub actual: Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub remediation: Option<String>,
}

impl VerificationCheck {
    pub fn new(
        id: impl Into<String>,
        check_type: CheckType,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            check_type,
            name: name.into(),
            description: description.into(),
            status: CheckStatus::Passed,
            expected: Value::Null,
            actual: Value::Null,
            error: None,
            remediation: None,
        }
    }

    pub fn passed(mut self, expected: Value, actual: Value) -> Self {
        self.status = CheckStatus::Passed;
        self.expected = expected;
        self.actual = actual;
        self
    }

    pub fn failed(mut self, expected: Value, actual: Value) -> Self {
        self.status = CheckStatus::Failed;
        self.expected = expected;
        self.actual = actual;
        self
    }

    pub fn warning(mut self, expected: Value, actual: Value) -> Self {
        self.status = CheckStatus::Warning;
        self.expected = expected;
        self.actual = actual;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }
}

/// Overall verdict for a verification batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Passed,
    Warning,
    Failed,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Passed => "passed",
            VerificationStatus::Warning => "warning",
            VerificationStatus::Failed => "failed",
        }
    }

    /// Derive the overall status; failed takes precedence over warning,
    /// warning over passed.
    pub fn from_checks(checks: &[VerificationCheck]) -> Self {
        if checks.iter().any(|c| c.status == CheckStatus::Failed) {
            VerificationStatus::Failed
        } else if checks.iter().any(|c| c.status == CheckStatus::Warning) {
            VerificationStatus::Warning
        } else {
            VerificationStatus::Passed
        }
    }
}

/// Aggregate check counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VerificationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
}

impl VerificationSummary {
    pub fn from_checks(checks: &[VerificationCheck]) -> Self {
        let mut summary = Self {
            total: checks.len(),
            ..Self::default()
        };
        for check in checks {
            match check.status {
                CheckStatus::Passed => summary.passed += 1,
                CheckStatus::Failed => summary.failed += 1,
                CheckStatus::Warning => summary.warnings += 1,
            }
        }
        summary
    }
}

/// The verifier's output for one execution batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub id: String,
    pub execution_id: String,
    pub status: VerificationStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub checks: Vec<VerificationCheck>,
    pub summary: VerificationSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(id: &str, status: CheckStatus) -> VerificationCheck {
        let check = VerificationCheck::new(id, CheckType::Security, id, "test");
        match status {
            CheckStatus::Passed => check.passed(json!(true), json!(true)),
            CheckStatus::Failed => check.failed(json!(true), json!(false)),
            CheckStatus::Warning => check.warning(json!(true), json!(false)),
        }
    }

    #[test]
    fn test_status_precedence_failed_over_warning() {
        let checks: Vec<_> = (0..9)
            .map(|i| check(&format!("c{}", i), CheckStatus::Passed))
            .chain([check("bad", CheckStatus::Failed), check("warn", CheckStatus::Warning)])
            .collect();
        assert_eq!(VerificationStatus::from_checks(&checks), VerificationStatus::Failed);
    }

    #[test]
    fn test_status_precedence_warning_over_passed() {
        let checks = vec![check("ok", CheckStatus::Passed), check("warn", CheckStatus::Warning)];
        assert_eq!(VerificationStatus::from_checks(&checks), VerificationStatus::Warning);
    }

    #[test]
    fn test_empty_checks_pass() {
        assert_eq!(VerificationStatus::from_checks(&[]), VerificationStatus::Passed);
    }

    #[test]
    fn test_summary_counts() {
        let checks = vec![
            check("a", CheckStatus::Passed),
            check("b", CheckStatus::Failed),
            check("c", CheckStatus::Warning),
            check("d", CheckStatus::Passed),
        ];
        let summary = VerificationSummary::from_checks(&checks);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.warnings, 1);
    }
}
