//! Verifier module
//!
//! A rule-based policy check engine: given the execution results of a plan
//! and the task context, it runs five check categories (security, compliance,
//! functionality, performance, cost) and aggregates them into a single
//! verdict. Aggregation precedence is failed > warning > passed.

mod compliance;
mod component;
mod cost;
mod functionality;
mod performance;
mod security;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::types::{
    ExecutionResult, TaskContext, VerificationCheck, VerificationResult, VerificationStatus,
    VerificationSummary,
};

/// The verifier - deterministic policy check engine
#[derive(Debug, Default)]
pub struct Verifier;

impl Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify a completed execution batch against the task context.
    ///
    /// The five categories run as independent units of work; their checks are
    /// aggregated in category order.
    pub async fn verify_execution(
        &self,
        execution_id: &str,
        results: &[ExecutionResult],
        context: &TaskContext,
    ) -> VerificationResult {
        let started_at = Utc::now();
        let (sec, comp, func, perf, cost) = tokio::join!(
            async { security::checks(context) },
            async { compliance::checks(context) },
            async { functionality::checks(results, context) },
            async { performance::checks(results, context) },
            async { cost::checks(context) },
        );

        let mut checks = sec;
        checks.extend(comp);
        checks.extend(func);
        checks.extend(perf);
        checks.extend(cost);

        let summary = VerificationSummary::from_checks(&checks);
        let status = VerificationStatus::from_checks(&checks);
        tracing::info!(
            execution_id = %execution_id,
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            warnings = summary.warnings,
            status = %status.as_str(),
            "verification completed"
        );

        VerificationResult {
            id: format!("verification_{}", Uuid::new_v4().simple()),
            execution_id: execution_id.to_string(),
            status,
            started_at,
            completed_at: Utc::now(),
            checks,
            summary,
        }
    }

    /// Validate a single component's configuration in isolation.
    ///
    /// Unknown component types produce no checks.
    pub fn verify_component(&self, component: &str, configuration: &Value) -> Vec<VerificationCheck> {
        component::checks(component, configuration)
    }
}

fn req_bool(context: &TaskContext, key: &str) -> bool {
    context
        .requirements
        .get(key)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn req_str<'a>(context: &'a TaskContext, key: &str) -> Option<&'a str> {
    context.requirements.get(key).and_then(Value::as_str)
}

fn req_number(context: &TaskContext, key: &str) -> Option<f64> {
    context.requirements.get(key).and_then(Value::as_f64)
}

fn req_array<'a>(context: &'a TaskContext, key: &str) -> Option<&'a Vec<Value>> {
    context.requirements.get(key).and_then(Value::as_array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckStatus, ExecutionArtifact, ExecutionStatus};
    use serde_json::json;
    use std::collections::HashMap;

    fn compliant_requirements() -> HashMap<String, Value> {
        let mut requirements = HashMap::new();
        requirements.insert("encryption_at_rest".to_string(), json!(true));
        requirements.insert("vpc_configured".to_string(), json!(true));
        requirements.insert("iam_role".to_string(), json!("deployer"));
        requirements.insert("iam_policy_actions".to_string(), json!(["ec2:CreateVpc"]));
        requirements.insert(
            "security_group_rules".to_string(),
            json!([{ "cidr": "10.0.0.0/16", "ports": "all" }]),
        );
        requirements.insert("public_access_block".to_string(), json!(true));
        requirements.insert(
            "tags".to_string(),
            json!({ "Environment": "production", "Project": "core", "ManagedBy": "provisio" }),
        );
        requirements.insert("automated_backups".to_string(), json!(true));
        requirements.insert("audit_logging".to_string(), json!(true));
        requirements.insert("lifecycle_rules".to_string(), json!([{ "expire_days": 90 }]));
        requirements
    }

    fn context(environment: &str, components: &[&str]) -> TaskContext {
        TaskContext::new(
            "aws",
            environment,
            "eu-west-1",
            components.iter().map(|c| c.to_string()).collect(),
        )
        .with_requirements(compliant_requirements())
    }

    fn success_result(step_id: &str, with_artifact: bool) -> ExecutionResult {
        let now = Utc::now();
        let mut outputs = HashMap::new();
        outputs.insert("validated".to_string(), json!(true));
        let artifacts = if with_artifact {
            vec![ExecutionArtifact::new(
                "terraform_config",
                "vpc.tf",
                "generated/vpc.tf",
                64,
                "0".repeat(64),
            )]
        } else {
            Vec::new()
        };
        ExecutionResult {
            id: format!("exec-{}", step_id),
            plan_id: "plan-1".to_string(),
            step_id: step_id.to_string(),
            status: ExecutionStatus::Success,
            started_at: now,
            completed_at: now,
            duration_ms: 1_200,
            outputs,
            artifacts,
            error: None,
            logs: Vec::new(),
        }
    }

    fn find<'a>(result: &'a VerificationResult, id: &str) -> Option<&'a VerificationCheck> {
        result.checks.iter().find(|c| c.id == id)
    }

    #[test]
    fn test_production_vpc_rds_stack_warns_only_on_reserved_instances() {
        tokio_test::block_on(async {
            let verifier = Verifier::new();
            let results = vec![success_result("s1", false), success_result("s2", true)];
            let ctx = context("production", &["vpc", "rds"]);

            let verification = verifier.verify_execution("exec-1", &results, &ctx).await;

            assert_eq!(verification.summary.failed, 0);
            let reserved = find(&verification, "cost_check_004").expect("cost_check_004 present");
            assert_eq!(reserved.status, CheckStatus::Warning);
            assert_eq!(verification.status, VerificationStatus::Warning);
            assert_eq!(verification.summary.total, verification.checks.len());
        });
    }

    #[test]
    fn test_s3_without_public_access_block_fails_verification() {
        tokio_test::block_on(async {
            let verifier = Verifier::new();
            let results = vec![success_result("s1", true)];
            let mut ctx = context("staging", &["s3"]);
            ctx.requirements
                .insert("public_access_block".to_string(), json!(false));

            let verification = verifier.verify_execution("exec-1", &results, &ctx).await;

            let check = find(&verification, "sec_check_005").expect("sec_check_005 present");
            assert_eq!(check.status, CheckStatus::Failed);
            assert_eq!(verification.status, VerificationStatus::Failed);
            assert!(verification.summary.failed >= 1);
        });
    }

    #[test]
    fn test_failed_step_fails_functionality_checks() {
        tokio_test::block_on(async {
            let verifier = Verifier::new();
            let mut failed = success_result("s1", false);
            failed.status = ExecutionStatus::Failure;
            let ctx = context("staging", &["vpc"]);

            let verification = verifier.verify_execution("exec-1", &[failed], &ctx).await;

            let check = find(&verification, "func_check_001").expect("func_check_001 present");
            assert_eq!(check.status, CheckStatus::Failed);
            assert_eq!(verification.status, VerificationStatus::Failed);
        });
    }

    #[test]
    fn test_missing_tag_is_case_sensitive() {
        tokio_test::block_on(async {
            let verifier = Verifier::new();
            let mut ctx = context("staging", &["vpc"]);
            ctx.requirements.insert(
                "tags".to_string(),
                json!({ "environment": "staging", "Project": "core", "ManagedBy": "provisio" }),
            );

            let verification = verifier
                .verify_execution("exec-1", &[success_result("s1", true)], &ctx)
                .await;

            let check = find(&verification, "comp_check_001").expect("comp_check_001 present");
            assert_eq!(check.status, CheckStatus::Failed);
        });
    }

    #[test]
    fn test_eks_provisioning_check_falls_back_to_not_applicable() {
        tokio_test::block_on(async {
            let verifier = Verifier::new();
            let ctx = context("staging", &["eks"]);

            let verification = verifier
                .verify_execution("exec-1", &[success_result("s1", true)], &ctx)
                .await;

            let check = find(&verification, "perf_check_002").expect("perf_check_002 present");
            assert_eq!(check.status, CheckStatus::Passed);
            assert_eq!(check.actual, json!("not_applicable"));
        });
    }

    #[test]
    fn test_undersized_production_instance_warns() {
        tokio_test::block_on(async {
            let verifier = Verifier::new();
            let mut ctx = context("production", &["vpc"]);
            ctx.requirements
                .insert("instance_type".to_string(), json!("t3.micro"));

            let verification = verifier
                .verify_execution("exec-1", &[success_result("s1", true)], &ctx)
                .await;

            let check = find(&verification, "perf_check_003").expect("perf_check_003 present");
            assert_eq!(check.status, CheckStatus::Warning);
        });
    }

    #[test]
    fn test_budget_overrun_warns_with_remediation() {
        tokio_test::block_on(async {
            let verifier = Verifier::new();
            let mut ctx = context("staging", &["vpc", "eks", "rds"]);
            ctx.requirements
                .insert("budget_limit".to_string(), json!(100));

            let verification = verifier
                .verify_execution("exec-1", &[success_result("s1", true)], &ctx)
                .await;

            // vpc 32 + eks 73 + rds 50 = 155 > 100
            let check = find(&verification, "cost_check_001").expect("cost_check_001 present");
            assert_eq!(check.status, CheckStatus::Warning);
            assert!(check.remediation.is_some());
        });
    }

    #[test]
    fn test_verify_component_unknown_type_returns_empty() {
        let verifier = Verifier::new();
        let checks = verifier.verify_component("unknown_type", &json!({}));
        assert!(checks.is_empty());
    }

    #[test]
    fn test_verify_component_vpc_cidr_regex() {
        let verifier = Verifier::new();

        let valid = verifier.verify_component("vpc", &json!({ "cidr_block": "10.0.0.0/16" }));
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].status, CheckStatus::Passed);

        let invalid = verifier.verify_component("vpc", &json!({ "cidr_block": "not-a-cidr" }));
        assert_eq!(invalid[0].status, CheckStatus::Failed);
    }

    #[test]
    fn test_verify_component_s3_flags() {
        let verifier = Verifier::new();
        let checks = verifier.verify_component(
            "s3",
            &json!({ "encryption": true, "public_access_block": false, "versioning": false }),
        );

        assert_eq!(checks.len(), 3);
        assert_eq!(checks[0].status, CheckStatus::Passed);
        assert_eq!(checks[1].status, CheckStatus::Failed);
        assert_eq!(checks[2].status, CheckStatus::Warning);
    }

    #[test]
    fn test_verify_component_rds_public_access() {
        let verifier = Verifier::new();
        let checks = verifier.verify_component(
            "rds",
            &json!({
                "storage_encrypted": true,
                "automated_backups": true,
                "publicly_accessible": true
            }),
        );

        let public = checks.iter().find(|c| c.id == "rds_config_003").expect("check");
        assert_eq!(public.status, CheckStatus::Failed);
    }
}
