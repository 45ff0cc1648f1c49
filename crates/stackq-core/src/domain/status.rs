//! Task state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status.
///
/// State transitions:
/// - Pending -> Taken (lease acquisition)
/// - Taken -> Success
/// - Taken -> Failure
/// - Taken -> Pending (requeue, keeps the original created_at priority)
///
/// Any state may additionally disappear through expiry.
///
/// The derived `Ord` is only used to key the status-partitioned index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Eligible for selection.
    Pending,

    /// Leased to exactly one worker.
    Taken,

    /// Work completed.
    Success,

    /// Work failed permanently.
    Failure,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Taken,
        TaskStatus::Success,
        TaskStatus::Failure,
    ];

    /// SUCCESS and FAILURE accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }

    /// Is this task eligible for selection?
    pub fn is_runnable(self) -> bool {
        matches!(self, TaskStatus::Pending)
    }

    /// Is `self -> next` an edge of the state machine?
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Taken)
                | (TaskStatus::Taken, TaskStatus::Success)
                | (TaskStatus::Taken, TaskStatus::Failure)
                | (TaskStatus::Taken, TaskStatus::Pending)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Taken => "TAKEN",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
