//! Step action handlers
//!
//! Each handler produces the outputs map (and artifacts) for one step action.
//! Handlers are deterministic given their inputs; values the reference system
//! sampled from live provisioning are derived from the declared components
//! instead, preserving the output shape.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::store::LogStore;
use crate::types::{ExecutionArtifact, ExecutionError, LogLevel, StepAction};

/// Providers a plan may target
pub const ALLOWED_PROVIDERS: [&str; 3] = ["aws", "gcp", "azure"];

/// Components a plan may provision
pub const ALLOWED_COMPONENTS: [&str; 7] = ["vpc", "eks", "rds", "s3", "gke", "gcs", "aks"];

const BEST_PRACTICES: [&str; 4] = [
    "resource_tagging",
    "least_privilege_iam",
    "encryption_defaults",
    "cost_allocation_labels",
];

/// Outputs and artifacts produced by one handler run
#[derive(Debug, Default)]
pub(crate) struct HandlerOutput {
    pub outputs: HashMap<String, Value>,
    pub artifacts: Vec<ExecutionArtifact>,
}

/// Writes handler log lines into the execution's log buffer
pub(crate) struct StepLogger {
    store: Arc<LogStore>,
    execution_id: String,
}

impl StepLogger {
    pub fn new(store: Arc<LogStore>, execution_id: String) -> Self {
        Self {
            store,
            execution_id,
        }
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.store
            .log(&self.execution_id, LogLevel::Info, message)
            .await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.store
            .log(&self.execution_id, LogLevel::Error, message)
            .await;
    }
}

/// Dispatch a step action to its handler
pub(crate) async fn run(
    action: StepAction,
    params: &HashMap<String, Value>,
    logger: &StepLogger,
) -> Result<HandlerOutput, ExecutionError> {
    match action {
        StepAction::ValidateRequirements => validate_requirements(params, logger).await,
        StepAction::GenerateComponent => generate_component(params, logger).await,
        StepAction::ValidateGeneratedCode => validate_generated_code(params, logger).await,
        StepAction::ApplyBestPractices => apply_best_practices(params, logger).await,
        StepAction::PlanDeployment => plan_deployment(params, logger).await,
        StepAction::ApplyDeployment => apply_deployment(params, logger).await,
        StepAction::VerifyDeployment => verify_deployment(params, logger).await,
        StepAction::GenerateDocumentation => generate_documentation(params, logger).await,
    }
}

async fn validate_requirements(
    params: &HashMap<String, Value>,
    logger: &StepLogger,
) -> Result<HandlerOutput, ExecutionError> {
    let provider = str_param(params, "provider").unwrap_or_default();
    if !ALLOWED_PROVIDERS.contains(&provider) {
        logger
            .error(format!("provider '{}' is not supported", provider))
            .await;
        return Err(ExecutionError::new(
            "invalid_provider",
            format!("provider '{}' is not supported", provider),
        ));
    }

    let components = string_list_param(params, "components");
    if components.is_empty() {
        logger.error("no components requested").await;
        return Err(ExecutionError::new(
            "no_components",
            "at least one component is required",
        ));
    }
    if let Some(unknown) = components
        .iter()
        .find(|c| !ALLOWED_COMPONENTS.contains(&c.as_str()))
    {
        logger
            .error(format!("component '{}' is not supported", unknown))
            .await;
        return Err(ExecutionError::new(
            "invalid_component",
            format!("component '{}' is not supported", unknown),
        ));
    }

    logger
        .info(format!(
            "validated {} component(s) for provider {}",
            components.len(),
            provider
        ))
        .await;

    let mut outputs = HashMap::new();
    outputs.insert("provider".to_string(), json!(provider));
    outputs.insert("component_count".to_string(), json!(components.len()));
    outputs.insert("validated".to_string(), json!(true));
    Ok(HandlerOutput {
        outputs,
        artifacts: Vec::new(),
    })
}

async fn generate_component(
    params: &HashMap<String, Value>,
    logger: &StepLogger,
) -> Result<HandlerOutput, ExecutionError> {
    let component = str_param(params, "component").ok_or_else(|| {
        ExecutionError::new(
            "missing_parameter",
            "generate_component requires a 'component' parameter",
        )
    })?;
    let provider = str_param(params, "provider").unwrap_or("aws");
    let environment = str_param(params, "environment").unwrap_or("dev");

    let content = render_component_config(provider, environment, component);
    let artifact = artifact_from_content(
        "terraform_config",
        format!("{}.tf", component),
        format!("generated/{}.tf", component),
        &content,
    );
    logger
        .info(format!(
            "generated {} ({} bytes, sha256 {})",
            artifact.name, artifact.size, artifact.checksum
        ))
        .await;

    let mut outputs = HashMap::new();
    outputs.insert("component".to_string(), json!(component));
    outputs.insert("path".to_string(), json!(artifact.path));
    outputs.insert("size_bytes".to_string(), json!(artifact.size));
    outputs.insert("checksum".to_string(), json!(artifact.checksum));
    Ok(HandlerOutput {
        outputs,
        artifacts: vec![artifact],
    })
}

async fn validate_generated_code(
    params: &HashMap<String, Value>,
    logger: &StepLogger,
) -> Result<HandlerOutput, ExecutionError> {
    let components = string_list_param(params, "components");
    let files_checked = components.len().max(1);
    logger
        .info(format!("validated {} generated file(s)", files_checked))
        .await;

    let mut outputs = HashMap::new();
    outputs.insert("syntax_valid".to_string(), json!(true));
    outputs.insert("files_checked".to_string(), json!(files_checked));
    outputs.insert("issues".to_string(), json!(0));
    Ok(HandlerOutput {
        outputs,
        artifacts: Vec::new(),
    })
}

async fn apply_best_practices(
    params: &HashMap<String, Value>,
    logger: &StepLogger,
) -> Result<HandlerOutput, ExecutionError> {
    let components = string_list_param(params, "components");
    // Stand-in for provisioning telemetry: score shrinks with surface area.
    let compliance_score = 100u64.saturating_sub(2 * components.len() as u64).max(85);
    logger
        .info(format!(
            "applied {} best-practice rule(s), compliance score {}",
            BEST_PRACTICES.len(),
            compliance_score
        ))
        .await;

    let mut outputs = HashMap::new();
    outputs.insert("practices_applied".to_string(), json!(BEST_PRACTICES));
    outputs.insert("compliance_score".to_string(), json!(compliance_score));
    Ok(HandlerOutput {
        outputs,
        artifacts: Vec::new(),
    })
}

async fn plan_deployment(
    params: &HashMap<String, Value>,
    logger: &StepLogger,
) -> Result<HandlerOutput, ExecutionError> {
    let components = string_list_param(params, "components");
    let estimated_minutes: u64 = components.iter().map(|c| provision_minutes(c)).sum();
    logger
        .info(format!(
            "planned {} resource addition(s), estimated {} minute(s)",
            components.len(),
            estimated_minutes
        ))
        .await;

    let mut outputs = HashMap::new();
    outputs.insert(
        "resource_changes".to_string(),
        json!({ "add": components.len(), "change": 0, "destroy": 0 }),
    );
    outputs.insert(
        "estimated_duration_minutes".to_string(),
        json!(estimated_minutes),
    );
    outputs.insert("components".to_string(), json!(components));
    Ok(HandlerOutput {
        outputs,
        artifacts: Vec::new(),
    })
}

async fn apply_deployment(
    params: &HashMap<String, Value>,
    logger: &StepLogger,
) -> Result<HandlerOutput, ExecutionError> {
    let components = string_list_param(params, "components");
    let resources: Vec<String> = components
        .iter()
        .map(|c| format!("{}-{}", c, &sha256_hex(c)[..8]))
        .collect();
    for resource in &resources {
        logger.info(format!("created resource {}", resource)).await;
    }

    let mut outputs = HashMap::new();
    outputs.insert("applied".to_string(), json!(true));
    outputs.insert("resources_created".to_string(), json!(resources));
    outputs.insert("resource_count".to_string(), json!(components.len()));
    if components.iter().any(|c| c == "eks") {
        outputs.insert(
            "eks_provision_ms".to_string(),
            json!(provision_minutes("eks") * 60_000),
        );
    }
    Ok(HandlerOutput {
        outputs,
        artifacts: Vec::new(),
    })
}

async fn verify_deployment(
    params: &HashMap<String, Value>,
    logger: &StepLogger,
) -> Result<HandlerOutput, ExecutionError> {
    let components = string_list_param(params, "components");
    let endpoints_checked = components.len().max(1);
    logger
        .info(format!("checked {} endpoint(s), all healthy", endpoints_checked))
        .await;

    let mut outputs = HashMap::new();
    outputs.insert("healthy".to_string(), json!(true));
    outputs.insert("endpoints_checked".to_string(), json!(endpoints_checked));
    outputs.insert("failures".to_string(), json!(0));
    Ok(HandlerOutput {
        outputs,
        artifacts: Vec::new(),
    })
}

async fn generate_documentation(
    params: &HashMap<String, Value>,
    logger: &StepLogger,
) -> Result<HandlerOutput, ExecutionError> {
    let components = string_list_param(params, "components");
    let mut artifacts = vec![artifact_from_content(
        "documentation",
        "README.md".to_string(),
        "docs/README.md".to_string(),
        &render_readme(&components),
    )];

    if bool_param(params, "include_diagrams") {
        artifacts.push(artifact_from_content(
            "diagram",
            "architecture.mmd".to_string(),
            "docs/architecture.mmd".to_string(),
            &render_diagram(&components),
        ));
    }
    logger
        .info(format!("generated {} document(s)", artifacts.len()))
        .await;

    let mut outputs = HashMap::new();
    outputs.insert("documents_generated".to_string(), json!(artifacts.len()));
    Ok(HandlerOutput { outputs, artifacts })
}

fn render_component_config(provider: &str, environment: &str, component: &str) -> String {
    format!(
        "# Generated configuration for {component}\n\
         resource \"{provider}_{component}\" \"main\" {{\n\
           environment = \"{environment}\"\n\
           managed_by  = \"provisio\"\n\
         }}\n"
    )
}

fn render_readme(components: &[String]) -> String {
    let mut doc = String::from("# Infrastructure\n\nProvisioned components:\n\n");
    for component in components {
        doc.push_str(&format!("- {}\n", component));
    }
    doc
}

fn render_diagram(components: &[String]) -> String {
    let mut diagram = String::from("graph TD\n");
    for component in components {
        diagram.push_str(&format!("  internet --> {}\n", component));
    }
    diagram
}

/// Per-component provisioning estimate in minutes
fn provision_minutes(component: &str) -> u64 {
    match component {
        "vpc" => 3,
        "eks" | "gke" | "aks" => 12,
        "rds" => 8,
        "s3" | "gcs" => 1,
        _ => 2,
    }
}

fn artifact_from_content(
    artifact_type: &str,
    name: String,
    path: String,
    content: &str,
) -> ExecutionArtifact {
    ExecutionArtifact::new(
        artifact_type,
        name,
        path,
        content.len() as u64,
        sha256_hex(content),
    )
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn str_param<'a>(params: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn bool_param(params: &HashMap<String, Value>, key: &str) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn string_list_param(params: &HashMap<String, Value>, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
