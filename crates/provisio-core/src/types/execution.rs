//! Execution record types
//!
//! One ExecutionResult is produced per attempted step; it is immutable once
//! returned by the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Outcome of a single step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failure => "failure",
        }
    }
}

/// Structured step error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub stack_trace: Option<String>,
}

impl ExecutionError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            stack_trace: None,
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// A timestamped, leveled message scoped to one execution id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl ExecutionLog {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// A named, checksummed output of a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionArtifact {
    pub id: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub name: String,
    pub path: String,
    pub size: u64,
    /// sha256 hex digest over the artifact content
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl ExecutionArtifact {
    pub fn new(
        artifact_type: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
        size: u64,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("artifact_{}", uuid::Uuid::new_v4().simple()),
            artifact_type: artifact_type.into(),
            name: name.into(),
            path: path.into(),
            size,
            checksum: checksum.into(),
            created_at: Utc::now(),
        }
    }
}

/// The record produced by running one plan step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Execution id; also keys this run's entries in the log store
    pub id: String,
    pub plan_id: String,
    pub step_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
    #[serde(default)]
    pub artifacts: Vec<ExecutionArtifact>,
    #[serde(default)]
    pub error: Option<ExecutionError>,
    #[serde(default)]
    pub logs: Vec<ExecutionLog>,
}

impl ExecutionResult {
    pub fn is_failure(&self) -> bool {
        self.status == ExecutionStatus::Failure
    }
}
