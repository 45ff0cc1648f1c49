//! Task record: the persisted entity.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::{TaskId, TaskStatus};

/// What a producer hands to the store. The store fills in status and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub task_id: TaskId,
    pub payload: serde_json::Value,
}

impl NewTask {
    pub fn new(task_id: impl Into<TaskId>, payload: serde_json::Value) -> Self {
        Self {
            task_id: task_id.into(),
            payload,
        }
    }
}

/// A task as stored.
///
/// Design:
/// - `created_at` is written once and defines LIFO priority. A requeued task
///   keeps it, so it ranks below anything created after it.
/// - Only `status` and `updated_at` change after creation.
/// - `expires_at` is fixed at creation (`created_at + horizon`).
///
/// Serialized layout: `{taskId, status, createdAt, updatedAt, expiresAt,
/// payload}` with timestamps as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub status: TaskStatus,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,

    /// Opaque to the queue.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TaskRecord {
    /// Create a PENDING record at `now`.
    pub fn new(task: NewTask, now: DateTime<Utc>, horizon: TimeDelta) -> Self {
        let expires_at = now
            .checked_add_signed(horizon)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            task_id: task.task_id,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at,
            payload: task.payload,
        }
    }

    /// Has the expiry horizon been reached?
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Apply a status change. Callers check the origin status first.
    pub(crate) fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn new_record_is_pending_with_expiry() {
        let record = TaskRecord::new(
            NewTask::new("t1", serde_json::json!({"n": 1})),
            at(1_000),
            TimeDelta::hours(1),
        );

        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.expires_at, at(1_000 + 3_600_000));
        assert!(!record.is_expired(at(1_000 + 3_599_999)));
        assert!(record.is_expired(at(1_000 + 3_600_000)));
    }

    #[test]
    fn status_change_keeps_created_at() {
        let mut record =
            TaskRecord::new(NewTask::new("t1", serde_json::Value::Null), at(10), TimeDelta::hours(1));
        record.set_status(TaskStatus::Taken, at(20));

        assert_eq!(record.status, TaskStatus::Taken);
        assert_eq!(record.created_at, at(10));
        assert_eq!(record.updated_at, at(20));
    }

    #[test]
    fn serialized_layout_uses_epoch_millis() {
        let record = TaskRecord::new(
            NewTask::new("t1", serde_json::json!({"kind": "demo"})),
            at(1_700_000_000_123),
            TimeDelta::milliseconds(1_000),
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["taskId"], "t1");
        assert_eq!(value["status"], "PENDING");
        assert_eq!(value["createdAt"], 1_700_000_000_123_i64);
        assert_eq!(value["updatedAt"], 1_700_000_000_123_i64);
        assert_eq!(value["expiresAt"], 1_700_000_001_123_i64);
        assert_eq!(value["payload"]["kind"], "demo");
    }
}
