//! TaskStore port - the source of truth for task records.
//!
//! # 設計原則
//! - Every mutation is a single conditional write (compare-and-swap on
//!   `status`). Nobody does read-modify-write outside the store.
//! - A failed condition is a normal answer ([`Transition::Rejected`]), not an
//!   error. `Err` means the store itself is broken.
//! - Records past `expires_at` behave as if they were deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{NewTask, StoreError, TaskId, TaskRecord, TaskStatus};
use crate::observability::QueueCounts;

/// Why a conditional transition did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The record exists but is not in the expected origin status.
    StatusMismatch { actual: TaskStatus },

    /// The record is gone (expired, purged, or never existed).
    Missing,
}

/// Result of a conditional transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The write happened; carries the record as stored afterwards.
    Applied(TaskRecord),

    Rejected(Rejection),
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a PENDING record. Fails with [`StoreError::Collision`] if the id
    /// exists.
    async fn insert(&self, task: NewTask) -> Result<TaskRecord, StoreError>;

    /// Atomically set `status = to, updated_at = now` iff `status == from`.
    async fn transition(
        &self,
        task_id: &TaskId,
        from: TaskStatus,
        to: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition, StoreError>;

    /// Up to `limit` live records with `status`, `created_at` descending.
    ///
    /// Ordering of records with equal `created_at` is unspecified.
    async fn query_newest_first(
        &self,
        status: TaskStatus,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError>;

    /// Up to `limit` live records with `status`, `created_at` ascending.
    async fn query_oldest_first(
        &self,
        status: TaskStatus,
        limit: usize,
    ) -> Result<Vec<TaskRecord>, StoreError>;

    /// Point read. Never use it to decide a write.
    async fn get(&self, task_id: &TaskId) -> Result<Option<TaskRecord>, StoreError>;

    /// Remove every record with `expires_at <= now`. Returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn counts_by_status(&self) -> Result<QueueCounts, StoreError>;
}
