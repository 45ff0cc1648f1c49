//! BatchSelector - the next page of work, newest first.
//!
//! LIFO comes entirely from the store's `(status, created_at)` index; nothing
//! is reordered here. Selection therefore costs O(page_limit) however large
//! the backlog grows. Old PENDING tasks at the tail may never be selected
//! while fresh work keeps arriving: expiry is what bounds them.

use std::sync::Arc;

use crate::domain::{StoreError, TaskRecord, TaskStatus};
use crate::ports::TaskStore;

pub struct BatchSelector {
    store: Arc<dyn TaskStore>,
    page_limit: usize,
}

impl BatchSelector {
    pub fn new(store: Arc<dyn TaskStore>, page_limit: usize) -> Self {
        Self {
            store,
            page_limit: page_limit.max(1),
        }
    }

    pub fn page_limit(&self) -> usize {
        self.page_limit
    }

    /// Up to `page_limit` PENDING records, `created_at` descending.
    pub async fn next_batch(&self) -> Result<Vec<TaskRecord>, StoreError> {
        self.store
            .query_newest_first(TaskStatus::Pending, self.page_limit)
            .await
    }

    /// Is there any PENDING work left?
    pub async fn has_pending(&self) -> Result<bool, StoreError> {
        Ok(!self
            .store
            .query_newest_first(TaskStatus::Pending, 1)
            .await?
            .is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewTask;
    use crate::impls::InMemoryTaskStore;
    use crate::ports::ManualClock;
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::time::Duration;

    #[tokio::test]
    async fn pages_are_bounded_and_newest_first() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new(
            Arc::new(clock.clone()),
            Duration::from_secs(3600),
        ));
        for i in 1..=12 {
            store
                .insert(NewTask::new(format!("t{i}"), serde_json::json!({})))
                .await
                .unwrap();
            clock.advance(TimeDelta::milliseconds(1));
        }

        let selector = BatchSelector::new(store, 10);
        let batch = selector.next_batch().await.unwrap();

        let ids: Vec<&str> = batch.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t12", "t11", "t10", "t9", "t8", "t7", "t6", "t5", "t4", "t3"]);
        assert!(selector.has_pending().await.unwrap());
    }

    #[tokio::test]
    async fn empty_store_has_no_pending_work() {
        let clock = ManualClock::new(Utc::now());
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new(
            Arc::new(clock),
            Duration::from_secs(3600),
        ));
        let selector = BatchSelector::new(store, 0);

        assert_eq!(selector.page_limit(), 1);
        assert!(selector.next_batch().await.unwrap().is_empty());
        assert!(!selector.has_pending().await.unwrap());
    }
}
