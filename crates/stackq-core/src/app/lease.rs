//! Lease protocol: read nothing, write conditionally.
//!
//! Ownership of a task is established by exactly one successful
//! PENDING -> TAKEN transition. Whoever holds the [`Lease`] must conclude it
//! with TAKEN -> outcome. Both steps are single conditional writes; a failed
//! condition means someone else (or expiry) got there first and the caller
//! simply moves on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{RunOutcome, StoreError, TaskId, TaskRecord, TaskStatus};
use crate::ports::{TaskStore, Transition};

/// Exclusive ownership of one TAKEN task.
///
/// Not `Clone`: `conclude` consumes it, so a lease is concluded at most once.
pub struct Lease {
    store: Arc<dyn TaskStore>,
    record: TaskRecord,
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

/// Try to take `task_id`.
///
/// - `Ok(Some(lease))`: the caller now owns the task.
/// - `Ok(None)`: lost the race, already disposed of, or expired. Skip it.
/// - `Err(_)`: the store failed.
pub async fn acquire(
    store: &Arc<dyn TaskStore>,
    task_id: &TaskId,
    now: DateTime<Utc>,
) -> Result<Option<Lease>, StoreError> {
    match store
        .transition(task_id, TaskStatus::Pending, TaskStatus::Taken, now)
        .await?
    {
        Transition::Applied(record) => Ok(Some(Lease {
            store: Arc::clone(store),
            record,
        })),
        Transition::Rejected(reason) => {
            debug!(%task_id, ?reason, "lease not acquired");
            Ok(None)
        }
    }
}

impl Lease {
    /// The record as it was stored when the lease was taken.
    pub fn record(&self) -> &TaskRecord {
        &self.record
    }

    pub fn task_id(&self) -> &TaskId {
        &self.record.task_id
    }

    /// Move the task TAKEN -> `outcome`. A rejection (the record changed or
    /// expired meanwhile) is returned, not raised.
    pub async fn conclude(
        self,
        outcome: RunOutcome,
        now: DateTime<Utc>,
    ) -> Result<Transition, StoreError> {
        self.store
            .transition(
                &self.record.task_id,
                TaskStatus::Taken,
                outcome.target_status(),
                now,
            )
            .await
    }
}
