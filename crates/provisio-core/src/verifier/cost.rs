//! Cost checks

use serde_json::json;

use super::{req_array, req_bool, req_number};
use crate::types::{CheckType, TaskContext, VerificationCheck};

/// Estimated monthly cost per component in USD
const COMPONENT_MONTHLY_COST: [(&str, f64); 4] =
    [("vpc", 32.0), ("eks", 73.0), ("rds", 50.0), ("s3", 5.0)];

const DEFAULT_BUDGET_LIMIT: f64 = 1_000.0;

pub(super) fn checks(context: &TaskContext) -> Vec<VerificationCheck> {
    let mut checks = vec![budget(context)];
    if context.has_component("s3") {
        checks.push(s3_lifecycle_policy(context));
    }
    if context.has_component("vpc") && context.environment != "production" {
        checks.push(single_nat_gateway(context));
    }
    if context.environment == "production" {
        checks.push(reserved_instances());
    }
    checks
}

fn monthly_estimate(context: &TaskContext) -> f64 {
    context
        .components
        .iter()
        .map(|component| {
            COMPONENT_MONTHLY_COST
                .iter()
                .find(|(name, _)| name == component)
                .map(|(_, cost)| *cost)
                .unwrap_or(0.0)
        })
        .sum()
}

fn budget(context: &TaskContext) -> VerificationCheck {
    let estimated = monthly_estimate(context);
    let limit = req_number(context, "budget_limit").unwrap_or(DEFAULT_BUDGET_LIMIT);
    let check = VerificationCheck::new(
        "cost_check_001",
        CheckType::Cost,
        "monthly_budget",
        "Estimated monthly cost stays within the budget limit",
    );
    if estimated <= limit {
        check.passed(json!(limit), json!(estimated))
    } else {
        check
            .warning(json!(limit), json!(estimated))
            .with_remediation("Reduce the component footprint or raise budget_limit")
    }
}

fn s3_lifecycle_policy(context: &TaskContext) -> VerificationCheck {
    let configured = req_array(context, "lifecycle_rules")
        .map(|rules| !rules.is_empty())
        .unwrap_or(false);
    let check = VerificationCheck::new(
        "cost_check_002",
        CheckType::Cost,
        "s3_lifecycle_policy",
        "S3 lifecycle policy keeps storage costs bounded",
    );
    if configured {
        check.passed(json!("configured"), json!("configured"))
    } else {
        check
            .warning(json!("configured"), json!("absent"))
            .with_remediation("Add lifecycle rules to transition or expire stale objects")
    }
}

fn single_nat_gateway(context: &TaskContext) -> VerificationCheck {
    let check = VerificationCheck::new(
        "cost_check_003",
        CheckType::Cost,
        "single_nat_gateway",
        "Non-production VPCs use a single NAT gateway",
    );
    if req_bool(context, "single_nat_gateway") {
        check.passed(json!(true), json!(true))
    } else {
        check
            .warning(json!(true), json!(false))
            .with_remediation("One NAT gateway is enough outside production")
    }
}

fn reserved_instances() -> VerificationCheck {
    // Always a warning in production, never passed.
    VerificationCheck::new(
        "cost_check_004",
        CheckType::Cost,
        "reserved_instances",
        "Reserved capacity evaluated for steady production workloads",
    )
    .warning(json!("reserved capacity evaluated"), json!("on-demand pricing"))
    .with_remediation("Consider reserved instances or savings plans for production workloads")
}
