//! Compliance checks

use serde_json::{json, Value};

use super::{req_array, req_bool};
use crate::types::{CheckType, TaskContext, VerificationCheck};

/// Tag keys every stack must carry, matched case-sensitively
const REQUIRED_TAGS: [&str; 3] = ["Environment", "Project", "ManagedBy"];

pub(super) fn checks(context: &TaskContext) -> Vec<VerificationCheck> {
    let mut checks = vec![required_tags(context)];
    if context.has_component("rds") {
        checks.push(rds_backups(context));
    }
    checks.push(audit_logging(context));
    if context.has_component("s3") {
        checks.push(s3_lifecycle(context));
    }
    checks
}

fn required_tags(context: &TaskContext) -> VerificationCheck {
    let tags = context.requirements.get("tags").and_then(Value::as_object);
    let missing: Vec<&str> = REQUIRED_TAGS
        .iter()
        .filter(|key| tags.map(|t| !t.contains_key(**key)).unwrap_or(true))
        .copied()
        .collect();
    let check = VerificationCheck::new(
        "comp_check_001",
        CheckType::Compliance,
        "required_tags",
        "Environment, Project, and ManagedBy tags are present",
    );
    if missing.is_empty() {
        check.passed(json!(REQUIRED_TAGS), json!(REQUIRED_TAGS))
    } else {
        check
            .failed(json!(REQUIRED_TAGS), json!({ "missing": missing }))
            .with_remediation("Add the missing tags to the stack configuration")
    }
}

fn rds_backups(context: &TaskContext) -> VerificationCheck {
    let check = VerificationCheck::new(
        "comp_check_002",
        CheckType::Compliance,
        "rds_automated_backups",
        "RDS instances enable automated backups",
    );
    if req_bool(context, "automated_backups") {
        check.passed(json!(true), json!(true))
    } else {
        check
            .failed(json!(true), json!(false))
            .with_remediation("Enable automated backups with a retention period")
    }
}

fn audit_logging(context: &TaskContext) -> VerificationCheck {
    let check = VerificationCheck::new(
        "comp_check_003",
        CheckType::Compliance,
        "audit_logging",
        "Audit logging is enabled",
    );
    if req_bool(context, "audit_logging") {
        check.passed(json!(true), json!(true))
    } else {
        check
            .failed(json!(true), json!(false))
            .with_remediation("Enable audit logging for the account")
    }
}

fn s3_lifecycle(context: &TaskContext) -> VerificationCheck {
    let configured = req_array(context, "lifecycle_rules")
        .map(|rules| !rules.is_empty())
        .unwrap_or(false);
    let check = VerificationCheck::new(
        "comp_check_004",
        CheckType::Compliance,
        "s3_lifecycle_rules",
        "S3 buckets define lifecycle or retention rules",
    );
    if configured {
        check.passed(json!("configured"), json!("configured"))
    } else {
        check
            .warning(json!("configured"), json!("absent"))
            .with_remediation("Define lifecycle rules covering retention requirements")
    }
}
