//! Performance checks

use serde_json::{json, Value};

use super::req_str;
use crate::types::{CheckType, ExecutionResult, TaskContext, VerificationCheck};

/// Total execution budget before a warning is raised
const TOTAL_DURATION_THRESHOLD_MS: u64 = 3_600_000;

/// EKS provisioning budget
const EKS_PROVISION_THRESHOLD_MS: u64 = 900_000;

const UNDERSIZED_INSTANCE_TYPES: [&str; 2] = ["t3.micro", "t3.small"];

pub(super) fn checks(
    results: &[ExecutionResult],
    context: &TaskContext,
) -> Vec<VerificationCheck> {
    let mut checks = vec![total_duration(results)];
    if context.has_component("eks") {
        checks.push(eks_provisioning_time(results));
    }
    if context.environment == "production" {
        checks.push(instance_sizing(context));
    }
    checks
}

fn total_duration(results: &[ExecutionResult]) -> VerificationCheck {
    let total_ms: u64 = results.iter().map(|r| r.duration_ms).sum();
    let check = VerificationCheck::new(
        "perf_check_001",
        CheckType::Performance,
        "total_execution_duration",
        "Total execution time stays under one hour",
    );
    if total_ms <= TOTAL_DURATION_THRESHOLD_MS {
        check.passed(json!(TOTAL_DURATION_THRESHOLD_MS), json!(total_ms))
    } else {
        check
            .warning(json!(TOTAL_DURATION_THRESHOLD_MS), json!(total_ms))
            .with_remediation("Split the plan or provision long-running components separately")
    }
}

fn eks_provisioning_time(results: &[ExecutionResult]) -> VerificationCheck {
    let measured = results
        .iter()
        .find_map(|r| r.outputs.get("eks_provision_ms").and_then(Value::as_u64));
    let check = VerificationCheck::new(
        "perf_check_002",
        CheckType::Performance,
        "eks_provisioning_time",
        "EKS cluster provisioning stays under fifteen minutes",
    );
    match measured {
        Some(ms) if ms <= EKS_PROVISION_THRESHOLD_MS => {
            check.passed(json!(EKS_PROVISION_THRESHOLD_MS), json!(ms))
        }
        Some(ms) => check
            .warning(json!(EKS_PROVISION_THRESHOLD_MS), json!(ms))
            .with_remediation("Review EKS cluster sizing and add-on configuration"),
        None => check.passed(json!(EKS_PROVISION_THRESHOLD_MS), json!("not_applicable")),
    }
}

fn instance_sizing(context: &TaskContext) -> VerificationCheck {
    let mut declared: Vec<String> = Vec::new();
    if let Some(instance_type) = req_str(context, "instance_type") {
        declared.push(instance_type.to_string());
    }
    if let Some(types) = context
        .requirements
        .get("instance_types")
        .and_then(Value::as_array)
    {
        declared.extend(types.iter().filter_map(Value::as_str).map(str::to_string));
    }

    let undersized: Vec<&String> = declared
        .iter()
        .filter(|t| UNDERSIZED_INSTANCE_TYPES.contains(&t.as_str()))
        .collect();
    let check = VerificationCheck::new(
        "perf_check_003",
        CheckType::Performance,
        "instance_sizing",
        "Production instances are not undersized",
    );
    if undersized.is_empty() {
        let actual = if declared.is_empty() {
            json!("no instance types declared")
        } else {
            json!(declared)
        };
        check.passed(json!("adequately sized"), actual)
    } else {
        check
            .warning(json!("adequately sized"), json!(undersized))
            .with_remediation("Use at least t3.medium for production workloads")
    }
}
