//! Functionality checks

use serde_json::json;

use crate::types::{CheckType, ExecutionResult, TaskContext, VerificationCheck};

pub(super) fn checks(
    results: &[ExecutionResult],
    context: &TaskContext,
) -> Vec<VerificationCheck> {
    let failed_steps = results.iter().filter(|r| r.is_failure()).count();
    let mut checks = vec![
        all_steps_succeeded(results, failed_steps),
        artifacts_produced(results),
        outputs_produced(results),
    ];
    if context.has_component("vpc") {
        checks.push(reachability(
            "func_check_004",
            "vpc_connectivity",
            "VPC networking is reachable",
            failed_steps,
        ));
    }
    if context.has_component("eks") {
        checks.push(reachability(
            "func_check_005",
            "eks_cluster_active",
            "EKS cluster reports an active control plane",
            failed_steps,
        ));
    }
    if context.has_component("rds") {
        checks.push(reachability(
            "func_check_006",
            "rds_reachable",
            "RDS instance accepts connections",
            failed_steps,
        ));
    }
    checks
}

fn all_steps_succeeded(results: &[ExecutionResult], failed_steps: usize) -> VerificationCheck {
    let check = VerificationCheck::new(
        "func_check_001",
        CheckType::Functionality,
        "all_steps_succeeded",
        "Every execution step finished successfully",
    );
    if failed_steps == 0 {
        check.passed(json!(0), json!(0))
    } else {
        check.failed(json!(0), json!(failed_steps)).with_error(format!(
            "{} of {} step(s) failed",
            failed_steps,
            results.len()
        ))
    }
}

fn artifacts_produced(results: &[ExecutionResult]) -> VerificationCheck {
    let count: usize = results.iter().map(|r| r.artifacts.len()).sum();
    let check = VerificationCheck::new(
        "func_check_002",
        CheckType::Functionality,
        "artifacts_produced",
        "Execution produced at least one artifact",
    );
    if count > 0 {
        check.passed(json!(">= 1"), json!(count))
    } else {
        check.failed(json!(">= 1"), json!(0))
    }
}

fn outputs_produced(results: &[ExecutionResult]) -> VerificationCheck {
    let produced = results.iter().any(|r| !r.outputs.is_empty());
    let check = VerificationCheck::new(
        "func_check_003",
        CheckType::Functionality,
        "outputs_produced",
        "Execution produced at least one non-empty output",
    );
    if produced {
        check.passed(json!("present"), json!("present"))
    } else {
        check.warning(json!("present"), json!("absent"))
    }
}

fn reachability(
    id: &str,
    name: &str,
    description: &str,
    failed_steps: usize,
) -> VerificationCheck {
    let check = VerificationCheck::new(id, CheckType::Functionality, name, description);
    if failed_steps == 0 {
        check.passed(json!("reachable"), json!("reachable"))
    } else {
        check.failed(json!("reachable"), json!("unverified"))
    }
}
