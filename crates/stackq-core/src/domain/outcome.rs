//! Task runner outcomes.

use serde::{Deserialize, Serialize};

use super::TaskStatus;

/// What the task runner reports for one attempt.
///
/// - `SUCCESS`: work completed.
/// - `FAILURE`: work failed permanently.
/// - `PENDING`: retry later (e.g. the downstream rejected the call because it
///   is saturated). The task goes back to the queue at its original priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    Success,
    Failure,
    Pending,
}

impl RunOutcome {
    /// Status a TAKEN task moves to when the attempt concludes.
    pub fn target_status(self) -> TaskStatus {
        match self {
            RunOutcome::Success => TaskStatus::Success,
            RunOutcome::Failure => TaskStatus::Failure,
            RunOutcome::Pending => TaskStatus::Pending,
        }
    }
}

impl From<RunOutcome> for TaskStatus {
    fn from(outcome: RunOutcome) -> Self {
        outcome.target_status()
    }
}
