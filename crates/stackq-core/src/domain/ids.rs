//! Task identifiers.
//!
//! A `TaskId` is an opaque string: the queue never parses it, it only
//! compares and hashes it. Generated ids are ULID based (`task-<ulid>`), see
//! [`crate::ports::UlidGenerator`].

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of a task record (primary key of the store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Display prefix used for generated ids.
    pub const PREFIX: &'static str = "task-";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Build an id from a ULID (`task-01J...`).
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(format!("{}{}", Self::PREFIX, ulid))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
