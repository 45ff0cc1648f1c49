//! TaskProducer - inserts fresh tasks with generated ids.

use std::sync::Arc;

use rand::Rng;
use tracing::{info, warn};

use crate::domain::{NewTask, StoreError, TaskRecord};
use crate::ports::{IdGenerator, TaskStore};

/// Fresh ids tried before giving up on a colliding insert.
pub const MAX_ID_ATTEMPTS: u32 = 3;

pub struct TaskProducer {
    store: Arc<dyn TaskStore>,
    ids: Arc<dyn IdGenerator>,
}

impl TaskProducer {
    pub fn new(store: Arc<dyn TaskStore>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, ids }
    }

    /// Insert one task. A collision is answered with a new id, never by
    /// retrying the same one.
    pub async fn produce(&self, payload: serde_json::Value) -> Result<TaskRecord, StoreError> {
        let mut attempt = 1;
        loop {
            let task_id = self.ids.generate_task_id();
            match self.store.insert(NewTask::new(task_id, payload.clone())).await {
                Err(StoreError::Collision(id)) if attempt < MAX_ID_ATTEMPTS => {
                    warn!(task_id = %id, attempt, "task id collision, generating a new id");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Insert `count` tasks with fake payloads.
    pub async fn produce_burst(&self, count: usize) -> Result<Vec<TaskRecord>, StoreError> {
        let mut produced = Vec::with_capacity(count);
        for seq in 0..count {
            let weight: u32 = rand::thread_rng().gen_range(1..=100);
            let payload = serde_json::json!({
                "kind": "fake",
                "seq": seq,
                "weight": weight,
            });
            produced.push(self.produce(payload).await?);
        }
        info!(count, "produced task burst");
        Ok(produced)
    }
}
