//! LogStore - per-execution-id append-only log buffer
//!
//! Owned by the executor for the lifetime of the process. Execution ids are
//! never shared between steps, so entries for one id are only ever appended
//! by one step at a time.

use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::types::{ExecutionLog, LogLevel};

/// Process-wide execution log buffer keyed by execution id
#[derive(Debug, Default)]
pub struct LogStore {
    entries: RwLock<HashMap<String, Vec<ExecutionLog>>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a log line for an execution
    pub async fn log(&self, execution_id: &str, level: LogLevel, message: impl Into<String>) {
        let mut entries = self.entries.write().await;
        entries
            .entry(execution_id.to_string())
            .or_default()
            .push(ExecutionLog::new(level, message));
    }

    /// Snapshot the log lines recorded for an execution, oldest first
    pub async fn logs(&self, execution_id: &str) -> Vec<ExecutionLog> {
        let entries = self.entries.read().await;
        entries.get(execution_id).cloned().unwrap_or_default()
    }

    /// Number of executions with recorded logs
    pub async fn execution_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_are_scoped_by_execution_id() {
        tokio_test::block_on(async {
            let store = LogStore::new();
            store.log("exec-1", LogLevel::Info, "first").await;
            store.log("exec-1", LogLevel::Warn, "second").await;
            store.log("exec-2", LogLevel::Error, "other").await;

            let logs = store.logs("exec-1").await;
            assert_eq!(logs.len(), 2);
            assert_eq!(logs[0].message, "first");
            assert_eq!(logs[1].level, LogLevel::Warn);

            assert_eq!(store.logs("exec-2").await.len(), 1);
            assert!(store.logs("missing").await.is_empty());
            assert_eq!(store.execution_count().await, 2);
        });
    }
}
