//! Security checks

use serde_json::{json, Value};

use super::{req_array, req_bool, req_str};
use crate::types::{CheckType, TaskContext, VerificationCheck};

pub(super) fn checks(context: &TaskContext) -> Vec<VerificationCheck> {
    let mut checks = vec![
        encryption_at_rest(context),
        network_isolation(context),
        iam_least_privilege(context),
    ];
    if context.has_component("eks") || context.has_component("rds") {
        checks.push(security_group_rules(context));
    }
    if context.has_component("s3") {
        checks.push(s3_public_access_block(context));
    }
    checks
}

fn encryption_at_rest(context: &TaskContext) -> VerificationCheck {
    let check = VerificationCheck::new(
        "sec_check_001",
        CheckType::Security,
        "encryption_at_rest",
        "Data stores encrypt data at rest",
    );
    if req_bool(context, "encryption_at_rest") {
        check.passed(json!(true), json!(true))
    } else {
        check
            .failed(json!(true), json!(false))
            .with_remediation("Enable encryption at rest for all data stores")
    }
}

fn network_isolation(context: &TaskContext) -> VerificationCheck {
    let isolated = req_bool(context, "vpc_configured") || req_bool(context, "private_subnets");
    let check = VerificationCheck::new(
        "sec_check_002",
        CheckType::Security,
        "network_isolation",
        "Workloads run inside a VPC or private subnets",
    );
    if isolated {
        check.passed(json!("isolated"), json!("isolated"))
    } else {
        check
            .warning(json!("isolated"), json!("exposed"))
            .with_remediation("Place workloads in a VPC or private subnets")
    }
}

fn iam_least_privilege(context: &TaskContext) -> VerificationCheck {
    let role_present = req_str(context, "iam_role").is_some();
    let wildcard = req_array(context, "iam_policy_actions")
        .map(|actions| actions.iter().any(|a| a == &Value::String("*".to_string())))
        .unwrap_or(false);
    let check = VerificationCheck::new(
        "sec_check_003",
        CheckType::Security,
        "iam_least_privilege",
        "An IAM role is defined and grants no wildcard action",
    );
    if role_present && !wildcard {
        check.passed(
            json!("role without wildcard actions"),
            json!("role without wildcard actions"),
        )
    } else {
        let actual = if !role_present {
            "no role defined"
        } else {
            "wildcard action granted"
        };
        check
            .failed(json!("role without wildcard actions"), json!(actual))
            .with_remediation("Define a dedicated IAM role and remove '*' actions from its policy")
    }
}

fn security_group_rules(context: &TaskContext) -> VerificationCheck {
    let open_rules = req_array(context, "security_group_rules")
        .map(|rules| {
            rules
                .iter()
                .filter(|rule| {
                    rule.get("cidr").and_then(Value::as_str) == Some("0.0.0.0/0")
                        && rule.get("ports").and_then(Value::as_str) == Some("all")
                })
                .count()
        })
        .unwrap_or(0);
    let check = VerificationCheck::new(
        "sec_check_004",
        CheckType::Security,
        "security_group_rules",
        "No security group rule allows 0.0.0.0/0 on all ports",
    );
    if open_rules == 0 {
        check.passed(json!(0), json!(0))
    } else {
        check
            .failed(json!(0), json!(open_rules))
            .with_remediation("Restrict 0.0.0.0/0 ingress to specific ports")
    }
}

fn s3_public_access_block(context: &TaskContext) -> VerificationCheck {
    let check = VerificationCheck::new(
        "sec_check_005",
        CheckType::Security,
        "s3_public_access_block",
        "S3 buckets enable the public access block",
    );
    if req_bool(context, "public_access_block") {
        check.passed(json!(true), json!(true))
    } else {
        check
            .failed(json!(true), json!(false))
            .with_remediation("Enable the S3 public access block")
    }
}
