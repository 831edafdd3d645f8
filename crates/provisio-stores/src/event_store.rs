//! EventStore in-memory implementation.
//!
//! A ring buffer capped at the most recent 1000 events across all tasks;
//! the oldest event is dropped once the cap is exceeded.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::RwLock;

use provisio_core::store::{EventStore, StoreError};
use provisio_core::types::{AgentEvent, EVENT_LOG_CAPACITY};

/// In-memory capped event store.
#[derive(Debug)]
pub struct InMemoryEventStore {
    events: RwLock<VecDeque<AgentEvent>>,
    capacity: usize,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: AgentEvent) -> Result<(), StoreError> {
        let mut events = self
            .events
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }

    async fn events_for_task(&self, task_id: &str) -> Result<Vec<AgentEvent>, StoreError> {
        let events = self
            .events
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(events
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<AgentEvent>, StoreError> {
        let events = self
            .events
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(events.iter().rev().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisio_core::types::AgentEventType;

    fn event(task_id: &str, n: usize) -> AgentEvent {
        AgentEvent::new(task_id, AgentEventType::StepCompleted)
            .with_data(serde_json::json!({ "n": n }))
    }

    #[test]
    fn test_ring_buffer_drops_oldest_beyond_capacity() {
        tokio_test::block_on(async {
            let store = InMemoryEventStore::new();
            for n in 0..=EVENT_LOG_CAPACITY {
                store.append(event("task-1", n)).await.expect("append");
            }

            let all = store.all().await.expect("all");
            assert_eq!(all.len(), EVENT_LOG_CAPACITY);
            // Newest first: the last appended event leads, event 0 is gone.
            assert_eq!(all[0].data["n"], serde_json::json!(EVENT_LOG_CAPACITY));
            assert_eq!(
                all.last().map(|e| e.data["n"].clone()),
                Some(serde_json::json!(1))
            );
        });
    }

    #[test]
    fn test_events_for_task_filters_and_keeps_order() {
        tokio_test::block_on(async {
            let store = InMemoryEventStore::new();
            store.append(event("task-1", 0)).await.expect("append");
            store.append(event("task-2", 1)).await.expect("append");
            store.append(event("task-1", 2)).await.expect("append");

            let events = store.events_for_task("task-1").await.expect("query");
            assert_eq!(events.len(), 2);
            // Oldest first for a single task's trail.
            assert_eq!(events[0].data["n"], serde_json::json!(0));
            assert_eq!(events[1].data["n"], serde_json::json!(2));
        });
    }
}
