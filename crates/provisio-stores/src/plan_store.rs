//! PlanStore in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use provisio_core::store::{PlanStore, StoreError};
use provisio_core::types::Plan;

/// In-memory plan store for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<String, Plan>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn save(&self, plan: &Plan) -> Result<(), StoreError> {
        let mut plans = self
            .plans
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        plans.insert(plan.id.clone(), plan.clone());
        Ok(())
    }

    async fn load(&self, plan_id: &str) -> Result<Option<Plan>, StoreError> {
        let plans = self
            .plans
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(plans.get(plan_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisio_core::types::{PlanStep, StepAction, StepStatus};

    #[test]
    fn test_saved_step_statuses_survive_reload() {
        tokio_test::block_on(async {
            let store = InMemoryPlanStore::new();
            let mut plan = Plan::new(vec![PlanStep::new("s1", StepAction::PlanDeployment)]);
            plan.steps[0].start();
            plan.steps[0].finish(StepStatus::Completed);
            store.save(&plan).await.expect("save");

            let loaded = store.load(&plan.id).await.expect("load").expect("present");
            assert_eq!(loaded.steps[0].status, StepStatus::Completed);
            assert!(loaded.steps[0].completed_at.is_some());
        });
    }
}
