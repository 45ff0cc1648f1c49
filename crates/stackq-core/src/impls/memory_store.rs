//! In-memory task store.
//!
//! # 実装詳細
//! - `records`: primary table keyed by `TaskId` (single source of truth).
//! - `by_status`: secondary index, one ordered set of `(created_at, task_id)`
//!   per status. Newest-first selection walks one partition backwards and
//!   stops after `limit` hits, so its cost does not depend on backlog size.
//! - `by_expiry`: `(expires_at, task_id)` ordered set for the TTL sweep.
//! - One `tokio::sync::Mutex` makes every operation atomic; it is released
//!   before anything is published on the change feed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{
    ChangeEvent, ChangeKind, NewTask, StoreError, TaskId, TaskRecord, TaskStatus, TriggerSignal,
};
use crate::observability::QueueCounts;
use crate::ports::{Clock, Rejection, SignalTransport, TaskStore, Transition};

type IndexKey = (DateTime<Utc>, TaskId);

#[derive(Default)]
struct StoreState {
    records: HashMap<TaskId, TaskRecord>,
    by_status: BTreeMap<TaskStatus, BTreeSet<IndexKey>>,
    by_expiry: BTreeSet<IndexKey>,
}

impl StoreState {
    fn index(&mut self, record: &TaskRecord) {
        self.by_status
            .entry(record.status)
            .or_default()
            .insert((record.created_at, record.task_id.clone()));
    }

    fn unindex(&mut self, record: &TaskRecord) {
        if let Some(partition) = self.by_status.get_mut(&record.status) {
            partition.remove(&(record.created_at, record.task_id.clone()));
        }
    }

    fn put(&mut self, record: TaskRecord) {
        self.index(&record);
        self.by_expiry
            .insert((record.expires_at, record.task_id.clone()));
        self.records.insert(record.task_id.clone(), record);
    }

    fn remove(&mut self, task_id: &TaskId) -> Option<TaskRecord> {
        let record = self.records.remove(task_id)?;
        self.unindex(&record);
        self.by_expiry
            .remove(&(record.expires_at, record.task_id.clone()));
        Some(record)
    }

    /// Walk one status partition, skipping (and dropping) expired rows.
    fn scan(
        &mut self,
        status: TaskStatus,
        limit: usize,
        newest_first: bool,
        now: DateTime<Utc>,
        removed: &mut Vec<ChangeEvent>,
    ) -> Vec<TaskRecord> {
        let mut hits = Vec::with_capacity(limit.min(64));
        let mut expired = Vec::new();

        if let Some(partition) = self.by_status.get(&status) {
            let keys: Box<dyn Iterator<Item = &IndexKey>> = if newest_first {
                Box::new(partition.iter().rev())
            } else {
                Box::new(partition.iter())
            };
            for (_, task_id) in keys {
                if hits.len() >= limit {
                    break;
                }
                let Some(record) = self.records.get(task_id) else {
                    continue;
                };
                if record.is_expired(now) {
                    expired.push(task_id.clone());
                    continue;
                }
                hits.push(record.clone());
            }
        }

        for task_id in expired {
            if self.remove(&task_id).is_some() {
                removed.push(ChangeEvent::new(ChangeKind::Remove, task_id));
            }
        }
        hits
    }
}

/// In-memory [`TaskStore`] with TTL semantics and an optional change feed.
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
    horizon: TimeDelta,
    change_feed: Option<Arc<dyn SignalTransport>>,
}

impl InMemoryTaskStore {
    pub fn new(clock: Arc<dyn Clock>, expiry_horizon: std::time::Duration) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock,
            horizon: TimeDelta::from_std(expiry_horizon).unwrap_or(TimeDelta::MAX),
            change_feed: None,
        }
    }

    /// Publish insert/modify/remove records on `transport`.
    pub fn with_change_feed(mut self, transport: Arc<dyn SignalTransport>) -> Self {
        self.change_feed = Some(transport);
        self
    }

    async fn publish(&self, events: Vec<ChangeEvent>) {
        if events.is_empty() {
            return;
        }
        let Some(feed) = &self.change_feed else {
            return;
        };
        if let Err(err) = feed.publish(TriggerSignal::StoreChange { events }).await {
            warn!(error = %err, "failed to publish store change feed");
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: NewTask) -> Result<TaskRecord, StoreError> {
        let now = self.clock.now();
        let mut events = Vec::new();
        let record = {
            let mut state = self.state.lock().await;
            if let Some(existing) = state.records.get(&task.task_id) {
                if !existing.is_expired(now) {
                    return Err(StoreError::Collision(task.task_id));
                }
                // An expired row still occupying the id counts as deleted.
                state.remove(&task.task_id);
                events.push(ChangeEvent::new(ChangeKind::Remove, task.task_id.clone()));
            }
            let record = TaskRecord::new(task, now, self.horizon);
            state.put(record.clone());
            record
        };

        debug!(task_id = %record.task_id, "task inserted");
        events.push(ChangeEvent::new(ChangeKind::Insert, record.task_id.clone()));
        self.publish(events).await;
        Ok(record)
    }

    async fn transition(
        &self,
        task_id: &TaskId,
        from: TaskStatus,
        to: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::IllegalTransition { from, to });
        }

        let expiry_now = self.clock.now();
        let (result, event) = {
            let mut state = self.state.lock().await;
            let current = state
                .records
                .get(task_id)
                .map(|r| (r.status, r.is_expired(expiry_now)));

            match current {
                None => (Transition::Rejected(Rejection::Missing), None),
                Some((_, true)) => {
                    state.remove(task_id);
                    (
                        Transition::Rejected(Rejection::Missing),
                        Some(ChangeEvent::new(ChangeKind::Remove, task_id.clone())),
                    )
                }
                Some((actual, false)) if actual != from => (
                    Transition::Rejected(Rejection::StatusMismatch { actual }),
                    None,
                ),
                Some(_) => match state.remove(task_id) {
                    Some(mut record) => {
                        record.set_status(to, now);
                        state.put(record.clone());
                        (
                            Transition::Applied(record),
                            Some(ChangeEvent::new(ChangeKind::Modify, task_id.clone())),
                        )
                    }
                    None => (Transition::Rejected(Rejection::Missing), None),
                },
            }
        };

        self.publish(event.into_iter().collect()).await;
        Ok(result)
    }

    async fn query_newest_first(
        &self,
        status: TaskStatus,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let now = self.clock.now();
        let mut removed = Vec::new();
        let hits = {
            let mut state = self.state.lock().await;
            state.scan(status, limit, true, now, &mut removed)
        };
        self.publish(removed).await;
        Ok(hits)
    }

    async fn query_oldest_first(
        &self,
        status: TaskStatus,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let now = self.clock.now();
        let mut removed = Vec::new();
        let hits = {
            let mut state = self.state.lock().await;
            state.scan(status, limit, false, now, &mut removed)
        };
        self.publish(removed).await;
        Ok(hits)
    }

    async fn get(&self, task_id: &TaskId) -> Result<Option<TaskRecord>, StoreError> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        Ok(state
            .records
            .get(task_id)
            .filter(|r| !r.is_expired(now))
            .cloned())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let removed: Vec<ChangeEvent> = {
            let mut state = self.state.lock().await;
            let due: Vec<TaskId> = state
                .by_expiry
                .iter()
                .take_while(|(expires_at, _)| *expires_at <= now)
                .map(|(_, task_id)| task_id.clone())
                .collect();
            due.into_iter()
                .filter_map(|task_id| {
                    state
                        .remove(&task_id)
                        .map(|_| ChangeEvent::new(ChangeKind::Remove, task_id))
                })
                .collect()
        };

        let purged = removed.len();
        self.publish(removed).await;
        Ok(purged)
    }

    async fn counts_by_status(&self) -> Result<QueueCounts, StoreError> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        let mut counts = QueueCounts::default();
        for record in state.records.values().filter(|r| !r.is_expired(now)) {
            counts.record(record.status);
        }
        Ok(counts)
    }
}
