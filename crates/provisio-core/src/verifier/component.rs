//! Per-component configuration checks
//!
//! A narrower entry point than full execution verification: validates a
//! single component's configuration in isolation. Unknown component types
//! produce no checks.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::types::{CheckType, VerificationCheck};

static CIDR_RE: OnceLock<Regex> = OnceLock::new();

fn cidr_regex() -> &'static Regex {
    CIDR_RE.get_or_init(|| {
        Regex::new(r"^\d{1,3}(\.\d{1,3}){3}/\d{1,2}$").expect("static CIDR pattern compiles")
    })
}

pub(super) fn checks(component: &str, configuration: &Value) -> Vec<VerificationCheck> {
    match component {
        "vpc" => vpc_checks(configuration),
        "eks" => eks_checks(configuration),
        "rds" => rds_checks(configuration),
        "s3" => s3_checks(configuration),
        other => {
            tracing::debug!(component = other, "no configuration checks for component");
            Vec::new()
        }
    }
}

fn vpc_checks(configuration: &Value) -> Vec<VerificationCheck> {
    let cidr = configuration
        .get("cidr_block")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let check = VerificationCheck::new(
        "vpc_config_001",
        CheckType::Security,
        "vpc_cidr_format",
        "VPC CIDR block is well-formed",
    );
    let check = if cidr_regex().is_match(cidr) {
        check.passed(json!("a.b.c.d/len"), json!(cidr))
    } else {
        check
            .failed(json!("a.b.c.d/len"), json!(cidr))
            .with_remediation("Use CIDR notation such as 10.0.0.0/16")
    };
    vec![check]
}

fn eks_checks(configuration: &Value) -> Vec<VerificationCheck> {
    let secrets = flag_check(
        configuration,
        "secrets_encryption",
        VerificationCheck::new(
            "eks_config_001",
            CheckType::Security,
            "eks_secrets_encryption",
            "EKS cluster encrypts Kubernetes secrets",
        ),
        FlagSeverity::Failed,
    );
    let endpoint = flag_check(
        configuration,
        "endpoint_private_access",
        VerificationCheck::new(
            "eks_config_002",
            CheckType::Security,
            "eks_private_endpoint",
            "EKS API endpoint allows private access",
        ),
        FlagSeverity::Warning,
    );
    vec![secrets, endpoint]
}

fn rds_checks(configuration: &Value) -> Vec<VerificationCheck> {
    let encrypted = flag_check(
        configuration,
        "storage_encrypted",
        VerificationCheck::new(
            "rds_config_001",
            CheckType::Security,
            "rds_storage_encrypted",
            "RDS storage is encrypted",
        ),
        FlagSeverity::Failed,
    );
    let backups = flag_check(
        configuration,
        "automated_backups",
        VerificationCheck::new(
            "rds_config_002",
            CheckType::Compliance,
            "rds_automated_backups",
            "RDS automated backups are enabled",
        ),
        FlagSeverity::Failed,
    );

    let publicly_accessible = configuration
        .get("publicly_accessible")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let public = VerificationCheck::new(
        "rds_config_003",
        CheckType::Security,
        "rds_not_public",
        "RDS instance is not publicly accessible",
    );
    let public = if publicly_accessible {
        public
            .failed(json!(false), json!(true))
            .with_remediation("Disable public accessibility and route through the VPC")
    } else {
        public.passed(json!(false), json!(false))
    };

    vec![encrypted, backups, public]
}

fn s3_checks(configuration: &Value) -> Vec<VerificationCheck> {
    vec![
        flag_check(
            configuration,
            "encryption",
            VerificationCheck::new(
                "s3_config_001",
                CheckType::Security,
                "s3_encryption",
                "S3 bucket encrypts objects",
            ),
            FlagSeverity::Failed,
        ),
        flag_check(
            configuration,
            "public_access_block",
            VerificationCheck::new(
                "s3_config_002",
                CheckType::Security,
                "s3_public_access_block",
                "S3 bucket enables the public access block",
            ),
            FlagSeverity::Failed,
        ),
        flag_check(
            configuration,
            "versioning",
            VerificationCheck::new(
                "s3_config_003",
                CheckType::Compliance,
                "s3_versioning",
                "S3 bucket enables versioning",
            ),
            FlagSeverity::Warning,
        ),
    ]
}

enum FlagSeverity {
    Failed,
    Warning,
}

fn flag_check(
    configuration: &Value,
    key: &str,
    check: VerificationCheck,
    severity: FlagSeverity,
) -> VerificationCheck {
    let enabled = configuration.get(key).and_then(Value::as_bool).unwrap_or(false);
    if enabled {
        check.passed(json!(true), json!(true))
    } else {
        match severity {
            FlagSeverity::Failed => check.failed(json!(true), json!(false)),
            FlagSeverity::Warning => check.warning(json!(true), json!(false)),
        }
    }
}
