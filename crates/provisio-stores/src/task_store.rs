//! TaskStore in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use provisio_core::store::{StoreError, TaskStore};
use provisio_core::types::Task;

/// In-memory task store for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn load(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        let tasks = self
            .tasks
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(tasks.get(task_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        let tasks = self
            .tasks
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut all: Vec<Task> = tasks.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisio_core::types::{TaskContext, TaskRequest, TaskType};

    fn task() -> Task {
        Task::new(TaskRequest::new(
            TaskType::Deploy,
            "user-1",
            TaskContext::new("aws", "staging", "eu-west-1", vec!["vpc".to_string()]),
        ))
    }

    #[test]
    fn test_save_load_and_list() {
        tokio_test::block_on(async {
            let store = InMemoryTaskStore::new();
            let a = task();
            let b = task();
            store.save(&a).await.expect("save a");
            store.save(&b).await.expect("save b");

            let loaded = store.load(&a.id).await.expect("load").expect("present");
            assert_eq!(loaded.id, a.id);
            assert!(store.load("missing").await.expect("load").is_none());
            assert_eq!(store.list().await.expect("list").len(), 2);
        });
    }
}
